use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::models::DonorRecord;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS donors (
    position INTEGER PRIMARY KEY,
    account_id TEXT NOT NULL UNIQUE,
    city TEXT,
    state TEXT,
    bfpo_no TEXT,
    postcode TEXT,
    country TEXT,
    total_gifts TEXT,
    last_gift_date TEXT,
    gifts_past_18_months TEXT
);

CREATE TABLE IF NOT EXISTS merges (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    merged_at TEXT DEFAULT (datetime('now')),
    checksum TEXT,
    shared_rows INTEGER NOT NULL,
    base_only_rows INTEGER NOT NULL,
    incoming_only_rows INTEGER NOT NULL,
    merged_rows INTEGER NOT NULL,
    delta_rows INTEGER NOT NULL
);
";

/// One committed merge, as kept in the `merges` history table.
#[derive(Debug, Clone, Default)]
pub struct MergeEntry {
    pub filename: String,
    pub merged_at: Option<String>,
    pub checksum: Option<String>,
    pub shared_rows: i64,
    pub base_only_rows: i64,
    pub incoming_only_rows: i64,
    pub merged_rows: i64,
    pub delta_rows: i64,
}

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Read the whole canonical table in stored order.
pub fn load_donors(conn: &Connection) -> Result<Vec<DonorRecord>> {
    let mut stmt = conn.prepare(
        "SELECT account_id, city, state, bfpo_no, postcode, country, \
         total_gifts, last_gift_date, gifts_past_18_months \
         FROM donors ORDER BY position",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(DonorRecord {
                account_id: row.get(0)?,
                city: row.get(1)?,
                state: row.get(2)?,
                bfpo_no: row.get(3)?,
                postcode: row.get(4)?,
                country: row.get(5)?,
                total_gifts: row.get(6)?,
                last_gift_date: row.get(7)?,
                gifts_past_18_months: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn donor_count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM donors", [], |r| r.get(0))?)
}

pub fn checksum_seen(conn: &Connection, checksum: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM merges WHERE checksum = ?1")?;
    Ok(stmt.exists([checksum])?)
}

/// Replace the canonical table with `donors` and log the merge, all in one
/// transaction. On error nothing is written.
pub fn commit_merge(conn: &Connection, donors: &[DonorRecord], entry: &MergeEntry) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM donors", [])?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO donors (position, account_id, city, state, bfpo_no, postcode, country, \
             total_gifts, last_gift_date, gifts_past_18_months) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for (i, d) in donors.iter().enumerate() {
            insert.execute(rusqlite::params![
                i as i64,
                d.account_id,
                d.city,
                d.state,
                d.bfpo_no,
                d.postcode,
                d.country,
                d.total_gifts,
                d.last_gift_date,
                d.gifts_past_18_months,
            ])?;
        }
    }
    tx.execute(
        "INSERT INTO merges (filename, checksum, shared_rows, base_only_rows, incoming_only_rows, merged_rows, delta_rows) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            entry.filename,
            entry.checksum,
            entry.shared_rows,
            entry.base_only_rows,
            entry.incoming_only_rows,
            entry.merged_rows,
            entry.delta_rows,
        ],
    )?;
    tx.commit()?;
    Ok(())
}

pub fn merge_history(conn: &Connection) -> Result<Vec<MergeEntry>> {
    let mut stmt = conn.prepare(
        "SELECT filename, merged_at, checksum, shared_rows, base_only_rows, incoming_only_rows, \
         merged_rows, delta_rows FROM merges ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(MergeEntry {
                filename: row.get(0)?,
                merged_at: row.get(1)?,
                checksum: row.get(2)?,
                shared_rows: row.get(3)?,
                base_only_rows: row.get(4)?,
                incoming_only_rows: row.get(5)?,
                merged_rows: row.get(6)?,
                delta_rows: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn entry(name: &str, checksum: &str) -> MergeEntry {
        MergeEntry {
            filename: name.to_string(),
            checksum: Some(checksum.to_string()),
            ..MergeEntry::default()
        }
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["donors", "merges"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_commit_merge_replaces_table_and_keeps_order() {
        let (_dir, conn) = test_db();
        let first = vec![
            DonorRecord::new("1").with(Column::City, "Reno"),
            DonorRecord::new("2"),
        ];
        commit_merge(&conn, &first, &entry("a.csv", "aaa")).unwrap();
        assert_eq!(load_donors(&conn).unwrap(), first);

        let second = vec![
            DonorRecord::new("9").with(Column::TotalGiftsAllTime, "$1.00"),
            DonorRecord::new("1").with(Column::City, "Ely"),
        ];
        commit_merge(&conn, &second, &entry("b.csv", "bbb")).unwrap();
        assert_eq!(load_donors(&conn).unwrap(), second);
        assert_eq!(donor_count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_failed_commit_leaves_table_untouched() {
        let (_dir, conn) = test_db();
        let original = vec![DonorRecord::new("1")];
        commit_merge(&conn, &original, &entry("a.csv", "aaa")).unwrap();

        // account_id is UNIQUE, so the second insert fails mid-transaction
        let bad = vec![DonorRecord::new("5"), DonorRecord::new("5")];
        assert!(commit_merge(&conn, &bad, &entry("b.csv", "bbb")).is_err());
        assert_eq!(load_donors(&conn).unwrap(), original);
        assert_eq!(merge_history(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_history_and_checksums() {
        let (_dir, conn) = test_db();
        assert!(!checksum_seen(&conn, "aaa").unwrap());
        let mut e = entry("a.csv", "aaa");
        e.incoming_only_rows = 3;
        e.merged_rows = 3;
        e.delta_rows = 3;
        commit_merge(&conn, &[], &e).unwrap();
        assert!(checksum_seen(&conn, "aaa").unwrap());
        let history = merge_history(&conn).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].filename, "a.csv");
        assert_eq!(history[0].incoming_only_rows, 3);
        assert!(history[0].merged_at.is_some());
    }
}
