use std::collections::{HashMap, HashSet};

use crate::models::DonorRecord;

/// How the identity keys of the two inputs split up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyPartition {
    pub shared: usize,
    pub base_only: usize,
    pub incoming_only: usize,
}

impl KeyPartition {
    pub fn total(&self) -> usize {
        self.shared + self.base_only + self.incoming_only
    }
}

/// Rows dropped from each input because an earlier row had the same key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateCounts {
    pub base: usize,
    pub incoming: usize,
}

impl DuplicateCounts {
    pub fn total(&self) -> usize {
        self.base + self.incoming
    }
}

pub struct Reconciliation {
    pub merged: Vec<DonorRecord>,
    pub delta: Vec<DonorRecord>,
    pub partition: KeyPartition,
    pub duplicates: DuplicateCounts,
}

/// Outer-join `base` and `incoming` on Account ID.
///
/// Per field, a non-empty incoming value replaces the base value. Merged rows
/// keep base order, followed by incoming-only rows in incoming order. `delta`
/// holds the incoming-only rows exactly as supplied. Within one input the
/// first row for a key wins.
pub fn reconcile(base: &[DonorRecord], incoming: &[DonorRecord]) -> Reconciliation {
    let (base, base_dups) = first_per_key(base);
    let (incoming, incoming_dups) = first_per_key(incoming);
    let duplicates = DuplicateCounts {
        base: base_dups,
        incoming: incoming_dups,
    };
    if duplicates.total() > 0 {
        log::warn!(
            "Ignoring {} duplicate row(s) in the existing data and {} in the new data (first occurrence kept)",
            duplicates.base,
            duplicates.incoming
        );
    }

    if base.is_empty() {
        let rows: Vec<DonorRecord> = incoming.into_iter().cloned().collect();
        let partition = KeyPartition {
            incoming_only: rows.len(),
            ..KeyPartition::default()
        };
        log::info!("No existing data; taking {} new rows as-is", rows.len());
        return Reconciliation {
            merged: rows.clone(),
            delta: rows,
            partition,
            duplicates,
        };
    }

    let base_keys: HashSet<&str> = base.iter().map(|&r| r.account_id.as_str()).collect();
    let incoming_by_key: HashMap<&str, &DonorRecord> = incoming
        .iter()
        .map(|&r| (r.account_id.as_str(), r))
        .collect();

    let mut partition = KeyPartition::default();
    let mut merged = Vec::with_capacity(base.len() + incoming.len());
    let mut delta = Vec::new();

    for old in &base {
        let row = match incoming_by_key.get(old.account_id.as_str()) {
            Some(new) => {
                partition.shared += 1;
                coalesce(new, old)
            }
            None => {
                partition.base_only += 1;
                (*old).clone()
            }
        };
        merged.push(normalize_case(row));
    }

    for new in &incoming {
        if base_keys.contains(new.account_id.as_str()) {
            continue;
        }
        partition.incoming_only += 1;
        delta.push((*new).clone());
        merged.push(normalize_case((*new).clone()));
    }

    log::info!(
        "Merging {} shared rows, {} rows unique to old dataset, and {} rows unique to new dataset",
        partition.shared,
        partition.base_only,
        partition.incoming_only
    );

    Reconciliation {
        merged,
        delta,
        partition,
        duplicates,
    }
}

fn first_per_key(rows: &[DonorRecord]) -> (Vec<&DonorRecord>, usize) {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());
    let mut dropped = 0;
    for row in rows {
        if seen.insert(row.account_id.as_str()) {
            kept.push(row);
        } else {
            dropped += 1;
        }
    }
    (kept, dropped)
}

fn prefer_newer(newer: &Option<String>, older: &Option<String>) -> Option<String> {
    newer.clone().or_else(|| older.clone())
}

fn coalesce(new: &DonorRecord, old: &DonorRecord) -> DonorRecord {
    DonorRecord {
        account_id: new.account_id.clone(),
        city: prefer_newer(&new.city, &old.city),
        state: prefer_newer(&new.state, &old.state),
        bfpo_no: prefer_newer(&new.bfpo_no, &old.bfpo_no),
        postcode: prefer_newer(&new.postcode, &old.postcode),
        country: prefer_newer(&new.country, &old.country),
        total_gifts: prefer_newer(&new.total_gifts, &old.total_gifts),
        last_gift_date: prefer_newer(&new.last_gift_date, &old.last_gift_date),
        gifts_past_18_months: prefer_newer(&new.gifts_past_18_months, &old.gifts_past_18_months),
    }
}

/// Cities and countries in title case, state codes in upper case.
fn normalize_case(mut row: DonorRecord) -> DonorRecord {
    row.city = row.city.map(|s| title_case(&s));
    row.state = row.state.map(|s| s.to_uppercase());
    row.country = row.country.map(|s| title_case(&s));
    row
}

/// Upper-case the first letter of every word, lower-case the rest. A word
/// starts after any non-alphabetic character, so "o'neill" becomes "O'Neill".
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
