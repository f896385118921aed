use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Columns of the canonical donor table, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    AccountId,
    City,
    State,
    BfpoNo,
    Postcode,
    Country,
    TotalGiftsAllTime,
    LastGiftDate,
    GiftsPast18Months,
}

pub const CANONICAL_COLUMNS: [Column; 9] = [
    Column::AccountId,
    Column::City,
    Column::State,
    Column::BfpoNo,
    Column::Postcode,
    Column::Country,
    Column::TotalGiftsAllTime,
    Column::LastGiftDate,
    Column::GiftsPast18Months,
];

/// Legacy header spellings that feed a canonical column.
pub const COLUMN_ALIASES: &[(&str, Column)] = &[("Total Gifts Amount", Column::TotalGiftsAllTime)];

impl Column {
    pub fn header(&self) -> &'static str {
        match self {
            Self::AccountId => "Account ID",
            Self::City => "City",
            Self::State => "State",
            Self::BfpoNo => "BFPO No",
            Self::Postcode => "Postcode",
            Self::Country => "Country",
            Self::TotalGiftsAllTime => "Total Gifts (All Time)",
            Self::LastGiftDate => "Last Gift Date",
            Self::GiftsPast18Months => "Number of Gifts Past 18 Months",
        }
    }
}

/// One raw roster row as it arrives from a file or the store. Values are
/// untouched text; blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DonorRecord {
    pub account_id: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub bfpo_no: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
    pub total_gifts: Option<String>,
    pub last_gift_date: Option<String>,
    pub gifts_past_18_months: Option<String>,
}

impl DonorRecord {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Self::default()
        }
    }

    pub fn get(&self, column: Column) -> Option<&str> {
        match column {
            Column::AccountId => Some(self.account_id.as_str()),
            Column::City => self.city.as_deref(),
            Column::State => self.state.as_deref(),
            Column::BfpoNo => self.bfpo_no.as_deref(),
            Column::Postcode => self.postcode.as_deref(),
            Column::Country => self.country.as_deref(),
            Column::TotalGiftsAllTime => self.total_gifts.as_deref(),
            Column::LastGiftDate => self.last_gift_date.as_deref(),
            Column::GiftsPast18Months => self.gifts_past_18_months.as_deref(),
        }
    }

    /// Setting `AccountId` to `None` clears it to an empty key.
    pub fn set(&mut self, column: Column, value: Option<String>) {
        match column {
            Column::AccountId => self.account_id = value.unwrap_or_default(),
            Column::City => self.city = value,
            Column::State => self.state = value,
            Column::BfpoNo => self.bfpo_no = value,
            Column::Postcode => self.postcode = value,
            Column::Country => self.country = value,
            Column::TotalGiftsAllTime => self.total_gifts = value,
            Column::LastGiftDate => self.last_gift_date = value,
            Column::GiftsPast18Months => self.gifts_past_18_months = value,
        }
    }

    #[cfg(test)]
    pub fn with(mut self, column: Column, value: &str) -> Self {
        self.set(column, Some(value.to_string()));
        self
    }
}

/// Giving tier derived from the lifetime total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Under20,
    Plus20,
    Plus50,
    Plus250,
}

pub const ALL_CATEGORIES: [Category; 4] = [
    Category::Under20,
    Category::Plus20,
    Category::Plus50,
    Category::Plus250,
];

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Under20 => "under 20",
            Self::Plus20 => "20+",
            Self::Plus50 => "50+",
            Self::Plus250 => "250+",
        }
    }
}

/// A cleaned roster row with typed values, ready for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Donor {
    pub account_id: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub bfpo_no: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
    pub total_gifts: Decimal,
    pub last_gift_date: Option<NaiveDate>,
    pub gifts_past_18_months: u32,
    pub category: Category,
}
