use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Datelike;
use rust_decimal::Decimal;

use crate::error::{DonorError, Result};
use crate::fmt::{money, round_cents};
use crate::models::{Category, Donor, ALL_CATEGORIES};
use crate::reconciler::title_case;

/// Province and territory codes left out of the by-state rollup.
pub const CANADIAN_PROVINCES: &[&str] = &[
    "AB", "BC", "MB", "NB", "NL", "NT", "NS", "NU", "ON", "PE", "QC", "SK", "YT",
];

pub const MONTH_ABBR: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn distinct_donors<'a>(donors: impl IntoIterator<Item = &'a Donor>) -> usize {
    donors
        .into_iter()
        .map(|d| d.account_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

fn total_of<'a>(donors: impl IntoIterator<Item = &'a Donor>) -> Decimal {
    donors.into_iter().map(|d| d.total_gifts).sum()
}

fn gifts_of<'a>(donors: impl IntoIterator<Item = &'a Donor>) -> u64 {
    donors
        .into_iter()
        .map(|d| u64::from(d.gifts_past_18_months))
        .sum()
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len() as u64)
}

fn median(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / Decimal::TWO
    } else {
        sorted[mid]
    }
}

/// Most frequent value; among equally frequent values the smallest wins.
fn mode(values: &[Decimal]) -> Decimal {
    let mut counts: BTreeMap<Decimal, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(*v).or_default() += 1;
    }
    let mut best: Option<(Decimal, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map_or(Decimal::ZERO, |(v, _)| v)
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// State code as later merges store it; `None` when blank.
fn state_key(donor: &Donor) -> Option<String> {
    donor
        .state
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
}

fn city_key(donor: &Donor) -> Option<String> {
    donor
        .city
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(title_case)
}

// ---------------------------------------------------------------------------
// Summary statistics
// ---------------------------------------------------------------------------

/// Values are rounded to cents.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub donors: usize,
    pub total: Decimal,
    pub average: Decimal,
    pub median: Decimal,
    pub mode: Decimal,
    pub gifts_past_18_months: u64,
}

pub struct ActiveStats {
    pub summary: SummaryStats,
    pub average_gifts_past_18_months: Decimal,
}

fn summarize(donors: &[&Donor]) -> SummaryStats {
    let totals: Vec<Decimal> = donors.iter().map(|d| d.total_gifts).collect();
    SummaryStats {
        donors: distinct_donors(donors.iter().copied()),
        total: round_cents(totals.iter().sum()),
        average: round_cents(mean(&totals)),
        median: round_cents(median(&totals)),
        mode: round_cents(mode(&totals)),
        gifts_past_18_months: gifts_of(donors.iter().copied()),
    }
}

pub fn basic_stats(donors: &[Donor]) -> SummaryStats {
    let all: Vec<&Donor> = donors.iter().collect();
    summarize(&all)
}

/// Donors with at least one gift in the past 18 months.
pub fn active_donors(donors: &[Donor]) -> ActiveStats {
    let active: Vec<&Donor> = donors.iter().filter(|d| d.gifts_past_18_months > 0).collect();
    let counts: Vec<Decimal> = active
        .iter()
        .map(|d| Decimal::from(d.gifts_past_18_months))
        .collect();
    ActiveStats {
        summary: summarize(&active),
        average_gifts_past_18_months: round_cents(mean(&counts)),
    }
}

/// Donors with no recorded gift in the past 18 months; an absent count is zero.
pub fn inactive_donors(donors: &[Donor]) -> SummaryStats {
    let inactive: Vec<&Donor> = donors.iter().filter(|d| d.gifts_past_18_months == 0).collect();
    summarize(&inactive)
}

// ---------------------------------------------------------------------------
// Rankings
// ---------------------------------------------------------------------------

pub struct RankedDonor {
    pub account_id: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub total: Decimal,
    pub last_gift_date: Option<chrono::NaiveDate>,
    pub gifts_past_18_months: u32,
}

impl From<&Donor> for RankedDonor {
    fn from(d: &Donor) -> Self {
        Self {
            account_id: d.account_id.clone(),
            city: d.city.clone(),
            state: d.state.clone(),
            total: d.total_gifts,
            last_gift_date: d.last_gift_date,
            gifts_past_18_months: d.gifts_past_18_months,
        }
    }
}

/// Largest lifetime totals first; ties by Account ID.
pub fn top_donors(donors: &[Donor], n: usize) -> Vec<RankedDonor> {
    let mut sorted: Vec<&Donor> = donors.iter().collect();
    sorted.sort_by(|a, b| {
        b.total_gifts
            .cmp(&a.total_gifts)
            .then_with(|| a.account_id.cmp(&b.account_id))
    });
    sorted.into_iter().take(n).map(RankedDonor::from).collect()
}

/// Most gifts in the past 18 months first; ties by total, then Account ID.
pub fn frequent_donors(donors: &[Donor], n: usize) -> Vec<RankedDonor> {
    let mut sorted: Vec<&Donor> = donors.iter().collect();
    sorted.sort_by(|a, b| {
        b.gifts_past_18_months
            .cmp(&a.gifts_past_18_months)
            .then_with(|| b.total_gifts.cmp(&a.total_gifts))
            .then_with(|| a.account_id.cmp(&b.account_id))
    });
    sorted.into_iter().take(n).map(RankedDonor::from).collect()
}

// ---------------------------------------------------------------------------
// Location rollups
// ---------------------------------------------------------------------------

pub struct StateStats {
    pub state: String,
    pub cities: usize,
    pub donors: usize,
    pub total: Decimal,
    pub gifts_past_18_months: u64,
}

pub fn stats_by_state(donors: &[Donor]) -> Vec<StateStats> {
    let mut groups: HashMap<String, Vec<&Donor>> = HashMap::new();
    for d in donors {
        if let Some(state) = state_key(d) {
            groups.entry(state).or_default().push(d);
        }
    }

    let mut res: Vec<StateStats> = groups
        .into_iter()
        .filter(|(state, _)| !CANADIAN_PROVINCES.contains(&state.as_str()))
        .map(|(state, members)| StateStats {
            state,
            cities: members
                .iter()
                .filter_map(|d| city_key(d))
                .collect::<HashSet<_>>()
                .len(),
            donors: distinct_donors(members.iter().copied()),
            total: total_of(members.iter().copied()),
            gifts_past_18_months: gifts_of(members.iter().copied()),
        })
        .collect();

    res.sort_by(|a, b| {
        b.donors
            .cmp(&a.donors)
            .then_with(|| b.total.cmp(&a.total))
            .then_with(|| a.state.cmp(&b.state))
    });
    res
}

pub struct CityStats {
    pub city: String,
    pub state: String,
    pub donors: usize,
    pub total: Decimal,
    pub gifts_past_18_months: u64,
}

pub fn stats_by_city(donors: &[Donor]) -> Vec<CityStats> {
    let mut groups: HashMap<(String, String), Vec<&Donor>> = HashMap::new();
    for d in donors {
        if let (Some(city), Some(state)) = (city_key(d), state_key(d)) {
            groups.entry((city, state)).or_default().push(d);
        }
    }

    let mut res: Vec<CityStats> = groups
        .into_iter()
        .map(|((city, state), members)| CityStats {
            city,
            state,
            donors: distinct_donors(members.iter().copied()),
            total: total_of(members.iter().copied()),
            gifts_past_18_months: gifts_of(members.iter().copied()),
        })
        .collect();

    res.sort_by(|a, b| {
        b.donors
            .cmp(&a.donors)
            .then_with(|| b.total.cmp(&a.total))
            .then_with(|| a.city.cmp(&b.city))
            .then_with(|| a.state.cmp(&b.state))
    });
    res
}

pub struct LocationBucket {
    pub label: &'static str,
    pub donors: usize,
    pub total: Decimal,
    pub gifts_past_18_months: u64,
}

/// Two rows: donors with only a country, and donors with no location at all.
pub fn stats_no_location(donors: &[Donor]) -> Vec<LocationBucket> {
    let unplaced = |d: &&Donor| is_blank(&d.city) && is_blank(&d.state);
    let country_only: Vec<&Donor> = donors
        .iter()
        .filter(unplaced)
        .filter(|d| !is_blank(&d.country))
        .collect();
    let nowhere: Vec<&Donor> = donors
        .iter()
        .filter(unplaced)
        .filter(|d| is_blank(&d.country))
        .collect();

    [("Country Only", country_only), ("No Location", nowhere)]
        .into_iter()
        .map(|(label, members)| LocationBucket {
            label,
            donors: distinct_donors(members.iter().copied()),
            total: round_cents(total_of(members.iter().copied())),
            gifts_past_18_months: gifts_of(members.iter().copied()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Time rollups (by last gift date)
// ---------------------------------------------------------------------------

pub struct YearCount {
    pub year: i32,
    pub donors: usize,
}

pub fn stats_by_year(donors: &[Donor]) -> Vec<YearCount> {
    let mut years: BTreeMap<i32, HashSet<&str>> = BTreeMap::new();
    for d in donors {
        if let Some(date) = d.last_gift_date {
            years.entry(date.year()).or_default().insert(d.account_id.as_str());
        }
    }
    years
        .into_iter()
        .map(|(year, ids)| YearCount {
            year,
            donors: ids.len(),
        })
        .collect()
}

pub struct MonthCount {
    pub month: &'static str,
    pub donors: usize,
}

/// Always twelve rows, January first, pooled across years.
pub fn stats_by_month(donors: &[Donor]) -> Vec<MonthCount> {
    let mut months: [HashSet<&str>; 12] = Default::default();
    for d in donors {
        if let Some(date) = d.last_gift_date {
            months[date.month0() as usize].insert(d.account_id.as_str());
        }
    }
    MONTH_ABBR
        .iter()
        .zip(months.iter())
        .map(|(month, ids)| MonthCount {
            month: *month,
            donors: ids.len(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Category rollup
// ---------------------------------------------------------------------------

pub struct CategoryStats {
    pub category: Category,
    pub donors: usize,
    pub total: Decimal,
}

/// One row per tier, lowest tier first.
pub fn stats_by_category(donors: &[Donor]) -> Vec<CategoryStats> {
    ALL_CATEGORIES
        .iter()
        .map(|cat| {
            let members: Vec<&Donor> = donors.iter().filter(|d| d.category == *cat).collect();
            CategoryStats {
                category: *cat,
                donors: distinct_donors(members.iter().copied()),
                total: total_of(members.iter().copied()),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Named reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReportKind {
    Basic,
    Active,
    Inactive,
    Top,
    Frequent,
    States,
    Cities,
    NoLocation,
    Years,
    Months,
    Categories,
}

pub const ALL_REPORTS: &[ReportKind] = &[
    ReportKind::Basic,
    ReportKind::Active,
    ReportKind::Inactive,
    ReportKind::Top,
    ReportKind::Frequent,
    ReportKind::States,
    ReportKind::Cities,
    ReportKind::NoLocation,
    ReportKind::Years,
    ReportKind::Months,
    ReportKind::Categories,
];

impl ReportKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Top => "top",
            Self::Frequent => "frequent",
            Self::States => "states",
            Self::Cities => "cities",
            Self::NoLocation => "no-location",
            Self::Years => "years",
            Self::Months => "months",
            Self::Categories => "categories",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic => "Basic Statistics",
            Self::Active => "Active Donors",
            Self::Inactive => "Inactive Donors",
            Self::Top => "Top Donors",
            Self::Frequent => "Frequent Donors",
            Self::States => "Statistics by State",
            Self::Cities => "Statistics by City",
            Self::NoLocation => "Donors Without a City or State",
            Self::Years => "Donors by Year of Last Gift",
            Self::Months => "Donors by Month of Last Gift",
            Self::Categories => "Donors by Giving Category",
        }
    }
}

pub fn get_by_key(key: &str) -> Result<ReportKind> {
    ALL_REPORTS
        .iter()
        .find(|r| r.key() == key)
        .copied()
        .ok_or_else(|| DonorError::UnknownReport(key.to_string()))
}

/// A finished report as display strings, ready for a table or CSV.
pub struct ReportTable {
    pub title: &'static str,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

const STATS_HEADERS: [&str; 5] = [
    "Total Donation Amount",
    "Average Total Donation",
    "Median Total Donation",
    "Modal Total Donation",
    "Gifts in Past 18 Months",
];

const RANKED_HEADERS: [&str; 6] = [
    "Account ID",
    "City",
    "State",
    "Total Gifts (All Time)",
    "Last Gift Date",
    "Number of Gifts Past 18 Months",
];

fn stats_row(s: &SummaryStats) -> Vec<String> {
    vec![
        s.donors.to_string(),
        money(s.total),
        money(s.average),
        money(s.median),
        money(s.mode),
        s.gifts_past_18_months.to_string(),
    ]
}

fn ranked_rows(rows: Vec<RankedDonor>) -> Vec<Vec<String>> {
    rows.into_iter()
        .map(|r| {
            vec![
                r.account_id,
                r.city.unwrap_or_default(),
                r.state.unwrap_or_default(),
                money(r.total),
                r.last_gift_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                r.gifts_past_18_months.to_string(),
            ]
        })
        .collect()
}

fn with_lead(lead: &'static str, rest: &[&'static str]) -> Vec<&'static str> {
    let mut headers = vec![lead];
    headers.extend_from_slice(rest);
    headers
}

/// Run the named reducer over cleaned donors. `limit` applies to rankings.
pub fn build_report(kind: ReportKind, donors: &[Donor], limit: usize) -> ReportTable {
    let (headers, rows) = match kind {
        ReportKind::Basic => (
            with_lead("Donors", &STATS_HEADERS),
            vec![stats_row(&basic_stats(donors))],
        ),
        ReportKind::Active => {
            let stats = active_donors(donors);
            let mut row = stats_row(&stats.summary);
            row.push(stats.average_gifts_past_18_months.to_string());
            let mut headers = with_lead("Active Donors", &STATS_HEADERS);
            headers.push("Average Gifts Past 18 Months");
            (headers, vec![row])
        }
        ReportKind::Inactive => (
            with_lead("Inactive Donors", &STATS_HEADERS),
            vec![stats_row(&inactive_donors(donors))],
        ),
        ReportKind::Top => (RANKED_HEADERS.to_vec(), ranked_rows(top_donors(donors, limit))),
        ReportKind::Frequent => (
            RANKED_HEADERS.to_vec(),
            ranked_rows(frequent_donors(donors, limit)),
        ),
        ReportKind::States => (
            vec![
                "State",
                "Cities",
                "Donors",
                "Total Gifts (All Time)",
                "Number of Gifts Past 18 Months",
            ],
            stats_by_state(donors)
                .into_iter()
                .map(|s| {
                    vec![
                        s.state,
                        s.cities.to_string(),
                        s.donors.to_string(),
                        money(s.total),
                        s.gifts_past_18_months.to_string(),
                    ]
                })
                .collect(),
        ),
        ReportKind::Cities => (
            vec![
                "City",
                "State",
                "Donors",
                "Total Gifts (All Time)",
                "Number of Gifts Past 18 Months",
            ],
            stats_by_city(donors)
                .into_iter()
                .map(|c| {
                    vec![
                        c.city,
                        c.state,
                        c.donors.to_string(),
                        money(c.total),
                        c.gifts_past_18_months.to_string(),
                    ]
                })
                .collect(),
        ),
        ReportKind::NoLocation => (
            vec![
                "Location",
                "Donors",
                "Total Gifts (All Time)",
                "Number of Gifts Past 18 Months",
            ],
            stats_no_location(donors)
                .into_iter()
                .map(|b| {
                    vec![
                        b.label.to_string(),
                        b.donors.to_string(),
                        money(b.total),
                        b.gifts_past_18_months.to_string(),
                    ]
                })
                .collect(),
        ),
        ReportKind::Years => (
            vec!["Year", "Donors"],
            stats_by_year(donors)
                .into_iter()
                .map(|y| vec![y.year.to_string(), y.donors.to_string()])
                .collect(),
        ),
        ReportKind::Months => (
            vec!["Month", "Donors"],
            stats_by_month(donors)
                .into_iter()
                .map(|m| vec![m.month.to_string(), m.donors.to_string()])
                .collect(),
        ),
        ReportKind::Categories => (
            vec!["Category", "Donors", "Total Gifts (All Time)"],
            stats_by_category(donors)
                .into_iter()
                .map(|c| {
                    vec![
                        c.category.label().to_string(),
                        c.donors.to_string(),
                        money(c.total),
                    ]
                })
                .collect(),
        ),
    };

    ReportTable {
        title: kind.name(),
        headers,
        rows,
    }
}
