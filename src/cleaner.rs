use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{DonorError, Result};
use crate::models::{Category, Donor, DonorRecord};

// Two-digit years are tried before four-digit ones; `%Y` would read "24" as year 24.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

/// Parse a lifetime total such as `$1,234.56`. The leading currency symbol and
/// thousands separators are dropped; what remains must be a non-negative
/// decimal.
pub fn parse_currency(account_id: &str, raw: &str) -> Result<Decimal> {
    let malformed = || DonorError::MalformedCurrency {
        account_id: account_id.to_string(),
        value: raw.to_string(),
    };
    let trimmed = raw.trim();
    let s = trimmed.strip_prefix('$').unwrap_or(trimmed).replace(',', "");
    let amount = Decimal::from_str(s.trim()).map_err(|_| malformed())?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(malformed());
    }
    Ok(amount)
}

/// Parse a gift count. Accepts `3` and spreadsheet-style `3.0`.
pub fn parse_count(account_id: &str, raw: &str) -> Result<u32> {
    let malformed = || DonorError::MalformedNumber {
        account_id: account_id.to_string(),
        value: raw.to_string(),
    };
    let s = raw.trim();
    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }
    let d = Decimal::from_str(s).map_err(|_| malformed())?;
    if !d.fract().is_zero() || d.is_sign_negative() {
        return Err(malformed());
    }
    d.to_u32().ok_or_else(malformed)
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let s = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(DonorError::MalformedDate {
        value: raw.to_string(),
    })
}

/// Tiers are checked from the lowest band up so each higher band overrides.
pub fn categorize(total: Decimal) -> Category {
    let mut category = Category::Under20;
    if total >= Decimal::from(20) {
        category = Category::Plus20;
    }
    if total >= Decimal::from(50) {
        category = Category::Plus50;
    }
    if total >= Decimal::from(250) {
        category = Category::Plus250;
    }
    category
}

// ---------------------------------------------------------------------------
// clean
// ---------------------------------------------------------------------------

/// Convert raw rows into typed donors. Currency and count errors are fatal;
/// unreadable dates become unknown dates.
pub fn clean(records: &[DonorRecord]) -> Result<Vec<Donor>> {
    let mut donors = Vec::with_capacity(records.len());
    let mut unknown_dates = 0usize;

    for rec in records {
        let total_gifts = match rec.total_gifts.as_deref() {
            Some(raw) => parse_currency(&rec.account_id, raw)?,
            None => Decimal::ZERO,
        };
        let gifts_past_18_months = match rec.gifts_past_18_months.as_deref() {
            Some(raw) => parse_count(&rec.account_id, raw)?,
            None => 0,
        };
        let last_gift_date = match rec.last_gift_date.as_deref() {
            Some(raw) => match parse_date(raw) {
                Ok(d) => Some(d),
                Err(e) => {
                    log::debug!("account {}: {e}", rec.account_id);
                    unknown_dates += 1;
                    None
                }
            },
            None => None,
        };

        donors.push(Donor {
            account_id: rec.account_id.clone(),
            city: rec.city.clone(),
            state: rec.state.clone(),
            bfpo_no: rec.bfpo_no.clone(),
            postcode: rec.postcode.clone(),
            country: rec.country.clone(),
            total_gifts,
            last_gift_date,
            gifts_past_18_months,
            category: categorize(total_gifts),
        });
    }

    if unknown_dates > 0 {
        log::warn!("{unknown_dates} row(s) have an unreadable Last Gift Date and are treated as unknown");
    }
    Ok(donors)
}

#[cfg(test)]
impl Donor {
    /// Render back to raw text in canonical form; `clean` of the result
    /// yields the same donor.
    pub fn to_record(&self) -> DonorRecord {
        DonorRecord {
            account_id: self.account_id.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            bfpo_no: self.bfpo_no.clone(),
            postcode: self.postcode.clone(),
            country: self.country.clone(),
            total_gifts: Some(self.total_gifts.to_string()),
            last_gift_date: self.last_gift_date.map(|d| d.format("%Y-%m-%d").to_string()),
            gifts_past_18_months: Some(self.gifts_past_18_months.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("1", "$1,234.56").unwrap(), dec("1234.56"));
        assert_eq!(parse_currency("1", "$0.00").unwrap(), Decimal::ZERO);
        assert_eq!(parse_currency("1", "  15  ").unwrap(), dec("15"));
        assert_eq!(parse_currency("1", "$1,000,000").unwrap(), dec("1000000"));
    }

    #[test]
    fn test_parse_currency_rejects_garbage() {
        let err = parse_currency("A-7", "N/A").unwrap_err();
        match err {
            DonorError::MalformedCurrency { account_id, value } => {
                assert_eq!(account_id, "A-7");
                assert_eq!(value, "N/A");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_currency("1", "$").is_err());
        assert!(parse_currency("1", "-$5.00").is_err());
        assert!(parse_currency("1", "-5.00").is_err());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("1", "3").unwrap(), 3);
        assert_eq!(parse_count("1", " 0 ").unwrap(), 0);
        assert_eq!(parse_count("1", "2.0").unwrap(), 2);
        assert!(matches!(
            parse_count("1", "2.5"),
            Err(DonorError::MalformedNumber { .. })
        ));
        assert!(parse_count("1", "many").is_err());
        assert!(parse_count("1", "-1").is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_date("2024-03-09").unwrap(), expected);
        assert_eq!(parse_date("03/09/2024").unwrap(), expected);
        assert_eq!(parse_date("3/9/24").unwrap(), expected);
        assert_eq!(parse_date("2024-03-09 00:00:00").unwrap(), expected);
        assert!(matches!(
            parse_date("sometime last spring"),
            Err(DonorError::MalformedDate { .. })
        ));
        assert!(parse_date("02/30/2024").is_err());
    }

    #[test]
    fn test_category_boundaries() {
        assert_eq!(categorize(dec("19.99")), Category::Under20);
        assert_eq!(categorize(dec("20")), Category::Plus20);
        assert_eq!(categorize(dec("49.99")), Category::Plus20);
        assert_eq!(categorize(dec("50")), Category::Plus50);
        assert_eq!(categorize(dec("249.99")), Category::Plus50);
        assert_eq!(categorize(dec("250")), Category::Plus250);
        assert_eq!(categorize(Decimal::ZERO).label(), "under 20");
        assert_eq!(categorize(dec("250.00")).label(), "250+");
    }

    #[test]
    fn test_clean_converts_fields() {
        let rec = DonorRecord::new("42")
            .with(Column::City, "Reno")
            .with(Column::TotalGiftsAllTime, "$1,234.56")
            .with(Column::LastGiftDate, "2023-11-05")
            .with(Column::GiftsPast18Months, "4");
        let donors = clean(&[rec]).unwrap();
        assert_eq!(donors.len(), 1);
        let d = &donors[0];
        assert_eq!(d.total_gifts, dec("1234.56"));
        assert_eq!(d.gifts_past_18_months, 4);
        assert_eq!(d.last_gift_date, NaiveDate::from_ymd_opt(2023, 11, 5));
        assert_eq!(d.category, Category::Plus250);
        assert_eq!(d.city.as_deref(), Some("Reno"));
    }

    #[test]
    fn test_clean_defaults_absent_values() {
        let donors = clean(&[DonorRecord::new("7")]).unwrap();
        assert_eq!(donors[0].total_gifts, Decimal::ZERO);
        assert_eq!(donors[0].gifts_past_18_months, 0);
        assert_eq!(donors[0].last_gift_date, None);
        assert_eq!(donors[0].category, Category::Under20);
    }

    #[test]
    fn test_clean_bad_date_is_not_fatal() {
        let rec = DonorRecord::new("7").with(Column::LastGiftDate, "not a date");
        let donors = clean(&[rec]).unwrap();
        assert_eq!(donors[0].last_gift_date, None);
    }

    #[test]
    fn test_clean_propagates_malformed_currency() {
        let recs = vec![
            DonorRecord::new("1").with(Column::TotalGiftsAllTime, "$10.00"),
            DonorRecord::new("2").with(Column::TotalGiftsAllTime, "N/A"),
        ];
        assert!(matches!(clean(&recs), Err(DonorError::MalformedCurrency { .. })));
    }

    #[test]
    fn test_clean_is_idempotent() {
        let recs = vec![
            DonorRecord::new("1")
                .with(Column::TotalGiftsAllTime, "$1,250.50")
                .with(Column::LastGiftDate, "01/15/2024")
                .with(Column::GiftsPast18Months, "2.0"),
            DonorRecord::new("2")
                .with(Column::Country, "Canada")
                .with(Column::LastGiftDate, "garbage"),
        ];
        let once = clean(&recs).unwrap();
        let again: Vec<DonorRecord> = once.iter().map(Donor::to_record).collect();
        let twice = clean(&again).unwrap();
        assert_eq!(once, twice);
    }
}
