use std::io::{Read, Write};
use std::path::Path;

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::cleaner::clean;
use crate::db::{self, MergeEntry};
use crate::error::{DonorError, Result};
use crate::models::{Column, DonorRecord, CANONICAL_COLUMNS, COLUMN_ALIASES};
use crate::reconciler::{reconcile, DuplicateCounts, KeyPartition};

// ---------------------------------------------------------------------------
// Header matching
// ---------------------------------------------------------------------------

/// "Account ID", "AccountID" and "account_id" all reduce to "accountid".
fn header_key(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Position of each canonical column in the file header. A canonical header
/// beats an alias for the same column; the first match wins.
fn resolve_columns(headers: &csv::StringRecord) -> [Option<usize>; 9] {
    let keys: Vec<String> = headers.iter().map(header_key).collect();
    let mut positions = [None; 9];
    for (slot, column) in CANONICAL_COLUMNS.iter().enumerate() {
        let wanted = header_key(column.header());
        positions[slot] = keys.iter().position(|k| *k == wanted).or_else(|| {
            COLUMN_ALIASES
                .iter()
                .filter(|(_, target)| target == column)
                .find_map(|(alias, _)| {
                    let alias_key = header_key(alias);
                    keys.iter().position(|k| *k == alias_key)
                })
        });
    }
    positions
}

// ---------------------------------------------------------------------------
// Reading and writing delimited text
// ---------------------------------------------------------------------------

/// Read a roster table with a header row. Unknown columns are dropped and
/// blank cells become `None`. `source` names the input in error messages.
pub fn read_table<R: Read>(reader: R, source: &str) -> Result<Vec<DonorRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let positions = resolve_columns(&headers);
    if positions[0].is_none() {
        return Err(DonorError::MissingIdentityColumn(source.to_string()));
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let mut row = DonorRecord::default();
        for (column, pos) in CANONICAL_COLUMNS.iter().zip(positions.iter()) {
            let value = pos
                .and_then(|i| record.get(i))
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            row.set(*column, value);
        }
        if row.account_id.is_empty() {
            return Err(DonorError::BlankIdentityKey {
                source_name: source.to_string(),
                line: record.position().map_or(0, |p| p.line()),
            });
        }
        rows.push(row);
    }
    log::debug!("read {} rows from {source}", rows.len());
    Ok(rows)
}

pub fn read_table_file(path: &Path) -> Result<Vec<DonorRecord>> {
    let file = std::fs::File::open(path)?;
    read_table(std::io::BufReader::new(file), &path.display().to_string())
}

/// Write the canonical columns, in canonical order, under their display
/// headers.
pub fn write_table<W: Write>(writer: W, records: &[DonorRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CANONICAL_COLUMNS.iter().map(Column::header))?;
    for rec in records {
        wtr.write_record(CANONICAL_COLUMNS.iter().map(|c| rec.get(*c).unwrap_or("")))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_table_file(path: &Path, records: &[DonorRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    write_table(std::io::BufWriter::new(file), records)
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// merge_file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Refuse inputs that repeat an Account ID.
    pub strict: bool,
    /// Compute everything but leave the store untouched.
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub merged: Vec<DonorRecord>,
    pub delta: Vec<DonorRecord>,
    pub partition: KeyPartition,
    pub duplicates: DuplicateCounts,
    /// The same file bytes were merged before. It is merged again anyway so
    /// its values win over anything uploaded since.
    pub previously_merged: bool,
    pub committed: bool,
}

/// Merge an uploaded roster into the canonical table.
///
/// The stored table is replaced only after the merged result passes `clean`;
/// any failure before the commit leaves it as it was.
pub fn merge_file(conn: &Connection, file_path: &Path, options: MergeOptions) -> Result<MergeOutcome> {
    let incoming = read_table_file(file_path)?;

    let checksum = compute_checksum(file_path)?;
    let previously_merged = db::checksum_seen(conn, &checksum)?;
    if previously_merged {
        log::warn!(
            "{} was merged before (checksum {checksum}); merging it again",
            file_path.display()
        );
    }

    let base = db::load_donors(conn)?;
    let result = reconcile(&base, &incoming);

    if options.strict && result.duplicates.total() > 0 {
        return Err(DonorError::DuplicateIdentityKey {
            count: result.duplicates.total(),
        });
    }

    // Validate before writing: a merged table that cannot be cleaned is
    // never persisted.
    clean(&result.merged)?;

    let committed = !options.dry_run;
    if committed {
        let entry = MergeEntry {
            filename: file_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string(),
            merged_at: None,
            checksum: Some(checksum),
            shared_rows: result.partition.shared as i64,
            base_only_rows: result.partition.base_only as i64,
            incoming_only_rows: result.partition.incoming_only as i64,
            merged_rows: result.merged.len() as i64,
            delta_rows: result.delta.len() as i64,
        };
        db::commit_merge(conn, &result.merged, &entry)?;
    }

    Ok(MergeOutcome {
        merged: result.merged,
        delta: result.delta,
        partition: result.partition,
        duplicates: result.duplicates,
        previously_merged,
        committed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db, load_donors};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn write_csv(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_header_key() {
        assert_eq!(header_key("Account ID"), "accountid");
        assert_eq!(header_key("AccountID"), "accountid");
        assert_eq!(header_key("\u{feff}account_id"), "accountid");
        assert_eq!(header_key("Total Gifts (All Time)"), "totalgiftsalltime");
    }

    #[test]
    fn test_read_table_maps_columns_and_blanks() {
        let csv = "\
Account ID,City,State,Notes,Total Gifts (All Time),Number of Gifts Past 18 Months
101,Reno,NV,ignored,\"$1,234.56\",3
102,,,,$5.00,
";
        let rows = read_table(csv.as_bytes(), "test").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].account_id, "101");
        assert_eq!(rows[0].total_gifts.as_deref(), Some("$1,234.56"));
        assert_eq!(rows[0].gifts_past_18_months.as_deref(), Some("3"));
        assert_eq!(rows[1].city, None);
        assert_eq!(rows[1].gifts_past_18_months, None);
        assert_eq!(rows[1].country, None);
    }

    #[test]
    fn test_read_table_accepts_legacy_total_header() {
        let csv = "AccountID,Total Gifts Amount\n7,$20.00\n";
        let rows = read_table(csv.as_bytes(), "legacy").unwrap();
        assert_eq!(rows[0].total_gifts.as_deref(), Some("$20.00"));
    }

    #[test]
    fn test_canonical_header_beats_alias() {
        let csv = "Account ID,Total Gifts Amount,Total Gifts (All Time)\n7,$1.00,$2.00\n";
        let rows = read_table(csv.as_bytes(), "both").unwrap();
        assert_eq!(rows[0].total_gifts.as_deref(), Some("$2.00"));
    }

    #[test]
    fn test_read_table_requires_identity_column() {
        let csv = "City,State\nReno,NV\n";
        let err = read_table(csv.as_bytes(), "upload.csv").unwrap_err();
        assert!(matches!(err, DonorError::MissingIdentityColumn(ref s) if s == "upload.csv"));
    }

    #[test]
    fn test_read_table_rejects_blank_identity() {
        let csv = "Account ID,City\n1,Reno\n,Ely\n";
        let err = read_table(csv.as_bytes(), "upload.csv").unwrap_err();
        assert!(matches!(err, DonorError::BlankIdentityKey { line: 3, .. }));
    }

    #[test]
    fn test_write_table_uses_canonical_order() {
        let rows = vec![DonorRecord {
            account_id: "1".to_string(),
            city: Some("Reno".to_string()),
            total_gifts: Some("$5.00".to_string()),
            ..DonorRecord::default()
        }];
        let mut out = Vec::new();
        write_table(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Account ID,City,State,BFPO No,Postcode,Country,Total Gifts (All Time),Last Gift Date,Number of Gifts Past 18 Months"
        );
        assert_eq!(lines.next().unwrap(), "1,Reno,,,,,$5.00,,");
        assert_eq!(read_table(text.as_bytes(), "roundtrip").unwrap(), rows);
    }

    #[test]
    fn test_merge_file_bootstrap_then_update() {
        let (dir, conn) = test_db();
        let first = write_csv(
            dir.path(),
            "first.csv",
            "Account ID,City,Total Gifts (All Time),Number of Gifts Past 18 Months\n1,,$10.00,0\n",
        );
        let out = merge_file(&conn, &first, MergeOptions::default()).unwrap();
        assert!(out.committed);
        assert_eq!(out.partition.incoming_only, 1);
        assert_eq!(load_donors(&conn).unwrap().len(), 1);

        let second = write_csv(
            dir.path(),
            "second.csv",
            "Account ID,City,Total Gifts (All Time),Number of Gifts Past 18 Months\n1,Reno,$15.00,2\n2,Ely,$5.00,1\n",
        );
        let out = merge_file(&conn, &second, MergeOptions::default()).unwrap();
        assert_eq!(
            out.partition,
            KeyPartition {
                shared: 1,
                base_only: 0,
                incoming_only: 1,
            }
        );
        assert_eq!(out.delta.len(), 1);
        assert_eq!(out.delta[0].account_id, "2");

        let stored = load_donors(&conn).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].city.as_deref(), Some("Reno"));
        assert_eq!(stored[0].total_gifts.as_deref(), Some("$15.00"));
        assert_eq!(db::merge_history(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_merge_file_reapplies_previously_merged_file() {
        let (dir, conn) = test_db();
        let reno = write_csv(dir.path(), "a.csv", "Account ID,City\n1,Reno\n");
        let ely = write_csv(dir.path(), "b.csv", "Account ID,City\n1,Ely\n");

        let r1 = merge_file(&conn, &reno, MergeOptions::default()).unwrap();
        assert!(!r1.previously_merged);
        merge_file(&conn, &ely, MergeOptions::default()).unwrap();
        assert_eq!(load_donors(&conn).unwrap()[0].city.as_deref(), Some("Ely"));

        let r3 = merge_file(&conn, &reno, MergeOptions::default()).unwrap();
        assert!(r3.previously_merged);
        assert!(r3.committed);
        assert_eq!(load_donors(&conn).unwrap()[0].city.as_deref(), Some("Reno"));
        assert_eq!(db::merge_history(&conn).unwrap().len(), 3);
    }

    #[test]
    fn test_merge_file_failure_leaves_store_untouched() {
        let (dir, conn) = test_db();
        let good = write_csv(dir.path(), "good.csv", "Account ID,Total Gifts (All Time)\n1,$10.00\n");
        merge_file(&conn, &good, MergeOptions::default()).unwrap();
        let before = load_donors(&conn).unwrap();

        let bad = write_csv(dir.path(), "bad.csv", "Account ID,Total Gifts (All Time)\n1,N/A\n2,$3.00\n");
        let err = merge_file(&conn, &bad, MergeOptions::default()).unwrap_err();
        assert!(matches!(err, DonorError::MalformedCurrency { .. }));
        assert_eq!(load_donors(&conn).unwrap(), before);

        let headless = write_csv(dir.path(), "headless.csv", "City\nReno\n");
        assert!(matches!(
            merge_file(&conn, &headless, MergeOptions::default()),
            Err(DonorError::MissingIdentityColumn(_))
        ));
        assert_eq!(load_donors(&conn).unwrap(), before);
    }

    #[test]
    fn test_merge_file_strict_rejects_duplicates() {
        let (dir, conn) = test_db();
        let path = write_csv(dir.path(), "dups.csv", "Account ID,City\n1,Reno\n1,Ely\n");
        let strict = MergeOptions {
            strict: true,
            dry_run: false,
        };
        let err = merge_file(&conn, &path, strict).unwrap_err();
        assert!(matches!(err, DonorError::DuplicateIdentityKey { count: 1 }));

        let out = merge_file(&conn, &path, MergeOptions::default()).unwrap();
        assert_eq!(out.duplicates.incoming, 1);
        assert_eq!(load_donors(&conn).unwrap()[0].city.as_deref(), Some("Reno"));
    }

    #[test]
    fn test_merge_file_dry_run_does_not_write() {
        let (dir, conn) = test_db();
        let path = write_csv(dir.path(), "roster.csv", "Account ID\n1\n2\n");
        let out = merge_file(
            &conn,
            &path,
            MergeOptions {
                strict: false,
                dry_run: true,
            },
        )
        .unwrap();
        assert!(!out.committed);
        assert_eq!(out.merged.len(), 2);
        assert!(load_donors(&conn).unwrap().is_empty());
        assert!(db::merge_history(&conn).unwrap().is_empty());
    }
}
