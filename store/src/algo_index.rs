//! The persistent, sqlite-backed algo index (C4).
//!
//! Accelerates "the Nth prior header of the same algo" lookups the retarget
//! engine needs. It is an accelerator, not a source of truth — the header
//! file is authoritative for the linear main chain; this index can always be
//! rebuilt by replaying the file (see [`AlgoIndex::rebuild_from`]).
//!
//! The reference wallet stores `algo` and `height` as text columns. That is
//! an open question flagged in the design notes; this implementation
//! resolves it in favor of native `INTEGER` columns, which preserve the same
//! ordering and uniqueness semantics without the footgun of lexicographic
//! string comparison on numbers.

use std::sync::Mutex;

use myriad_core::{Error, Header, Result, HEADER_SIZE};
use rusqlite::{params, Connection};

/// A single-connection, mutex-guarded handle onto `headers.db`.
///
/// The retarget engine may be invoked from inside chain verification on the
/// single sync-worker task, so a simple `Mutex` is sufficient; this type
/// does not attempt to support multiple concurrent writers.
pub struct AlgoIndex {
    conn: Mutex<Connection>,
}

impl AlgoIndex {
    /// Opens (and initializes, if new) the index at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory index, useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS headers (
                header_bytes BLOB NOT NULL,
                algo INTEGER NOT NULL,
                height INTEGER NOT NULL UNIQUE
            )",
            [],
        )
        .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Inserts or replaces the row at `(algo, height)`.
    pub fn insert_or_replace(&self, algo: u32, height: u64, raw_header: &[u8; HEADER_SIZE]) -> Result<()> {
        let conn = self.conn.lock().expect("algo index mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO headers (header_bytes, algo, height) VALUES (?1, ?2, ?3)",
            params![raw_header.as_slice(), algo, height as i64],
        )
        .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Number of rows for `algo` with `height < below_height`.
    pub fn count(&self, algo: u32, below_height: u64) -> Result<u64> {
        let conn = self.conn.lock().expect("algo index mutex poisoned");
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM headers WHERE algo = ?1 AND height < ?2",
                params![algo, below_height as i64],
                |row| row.get(0),
            )
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        Ok(n as u64)
    }

    /// The most recent `n` rows for `algo` with `height < below_height`,
    /// ordered descending by height. The retarget engine uses the *oldest*
    /// (last) element of this set.
    pub fn last_n_below(&self, algo: u32, below_height: u64, n: u32) -> Result<Vec<[u8; HEADER_SIZE]>> {
        let conn = self.conn.lock().expect("algo index mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT header_bytes FROM headers WHERE algo = ?1 AND height < ?2
                 ORDER BY height DESC LIMIT ?3",
            )
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        let rows = stmt
            .query_map(params![algo, below_height as i64, n], |row| {
                let bytes: Vec<u8> = row.get(0)?;
                Ok(bytes)
            })
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            let bytes = row.map_err(|e| Error::IndexUnavailable(e.to_string()))?;
            let arr: [u8; HEADER_SIZE] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| Error::IndexUnavailable("corrupt row width".into()))?;
            out.push(arr);
        }
        Ok(out)
    }

    /// Rebuilds the index from scratch by replaying every header in
    /// `headers`, in ascending height order. Used to recover from a missing
    /// or corrupt `headers.db` on startup, per the hybrid-storage design:
    /// the flat file stays authoritative and the index is always
    /// reconstructible from it.
    pub fn rebuild_from<'a>(&self, headers: impl Iterator<Item = (u64, &'a Header)>) -> Result<()> {
        for (height, header) in headers {
            let algo = header.version;
            self.insert_or_replace(algo, height, &header.to_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(height: u32) -> [u8; HEADER_SIZE] {
        let mut b = [0u8; HEADER_SIZE];
        b[0..4].copy_from_slice(&2u32.to_le_bytes());
        b[68..72].copy_from_slice(&height.to_le_bytes());
        b
    }

    #[test]
    fn insert_and_count() {
        let idx = AlgoIndex::open_in_memory().unwrap();
        for h in 0..15 {
            idx.insert_or_replace(2, h, &raw(h as u32)).unwrap();
        }
        assert_eq!(idx.count(2, 15).unwrap(), 15);
        assert_eq!(idx.count(2, 10).unwrap(), 10);
        assert_eq!(idx.count(514, 15).unwrap(), 0);
    }

    #[test]
    fn last_n_below_orders_descending_and_oldest_is_last() {
        let idx = AlgoIndex::open_in_memory().unwrap();
        for h in 0..20 {
            idx.insert_or_replace(2, h, &raw(h as u32)).unwrap();
        }
        let last10 = idx.last_n_below(2, 20, 10).unwrap();
        assert_eq!(last10.len(), 10);
        // descending: first entry is height 19, last is height 10 (the "10th prior").
        let first_height = u32::from_le_bytes(last10[0][68..72].try_into().unwrap());
        let oldest_height = u32::from_le_bytes(last10[9][68..72].try_into().unwrap());
        assert_eq!(first_height, 19);
        assert_eq!(oldest_height, 10);
    }

    #[test]
    fn insert_or_replace_overwrites_existing_height() {
        let idx = AlgoIndex::open_in_memory().unwrap();
        idx.insert_or_replace(2, 5, &raw(5)).unwrap();
        idx.insert_or_replace(514, 5, &raw(99)).unwrap();
        assert_eq!(idx.count(2, 6).unwrap(), 0);
        assert_eq!(idx.count(514, 6).unwrap(), 1);
    }
}
