use std::fs;
use std::path::Path;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;
use crate::shelf::ShelfError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS records (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    );
";

/// Opens an existing shelf table without write access.
pub(crate) fn open_readonly(path: &Path) -> Result<Connection, ShelfError> {
    if !path.is_file() {
        return Err(ShelfError::Missing(path.to_path_buf()));
    }
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?)
}

/// The raw JSON value stored under `key`.
pub(crate) fn read_value(conn: &Connection, key: &str) -> Result<Option<String>, ShelfError> {
    Ok(conn
        .query_row("SELECT value FROM records WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?)
}

/// Every non-summary key, in insertion order.
pub(crate) fn read_keys(conn: &Connection) -> Result<Vec<String>, ShelfError> {
    let mut stmt = conn.prepare("SELECT key FROM records WHERE key <> '' ORDER BY rowid")?;
    let keys = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(keys)
}

/// Creates (or replaces) a shelf table and fills it with records.
///
/// Values are stored as JSON text. The empty key holds the table summary.
pub struct ShelfWriter {
    conn: Connection,
}

impl ShelfWriter {
    /// Creates a fresh table at `path`, removing any previous file.
    pub fn create(path: &Path) -> Result<Self, ShelfError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if path.exists() {
            fs::remove_file(path)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ShelfError> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO records (key, value) VALUES (?1, ?2)",
            params![key, json],
        )?;
        Ok(())
    }

    /// Writes all records in one transaction.
    pub fn put_all<'a, T, I>(&mut self, records: I) -> Result<usize, ShelfError>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = (&'a str, &'a T)>,
    {
        let tx = self.conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare("INSERT OR REPLACE INTO records (key, value) VALUES (?1, ?2)")?;
            for (key, value) in records {
                stmt.execute(params![key, serde_json::to_string(value)?])?;
                count += 1;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn finish(self) -> Result<(), ShelfError> {
        self.conn.close().map_err(|(_, e)| ShelfError::Database(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shelves/info/volumes/ABC_1xxx/ABC_1001_info.shelf");

        let mut writer = ShelfWriter::create(&path).unwrap();
        writer.put("", &serde_json::json!({"bytes": 10})).unwrap();
        let rows: BTreeMap<String, u32> = [("b".to_string(), 2), ("a".to_string(), 1)].into_iter().collect();
        assert_eq!(writer.put_all(rows.iter().map(|(k, v)| (k.as_str(), v))).unwrap(), 2);
        writer.finish().unwrap();

        let conn = open_readonly(&path).unwrap();
        assert_eq!(read_value(&conn, "a").unwrap().as_deref(), Some("1"));
        assert_eq!(read_value(&conn, "").unwrap().as_deref(), Some(r#"{"bytes":10}"#));
        assert!(read_value(&conn, "zzz").unwrap().is_none());
        assert_eq!(read_keys(&conn).unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_missing_table() {
        let dir = tempdir().unwrap();
        let err = open_readonly(&dir.path().join("nope.shelf")).unwrap_err();
        assert!(matches!(err, ShelfError::Missing(_)));
    }
}
