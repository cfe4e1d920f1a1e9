// src/db.rs
use crate::history::LogStore;
use crate::profile::Profile;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const PROFILE_KEY: &str = "profile";
pub const LOGS_KEY: &str = "logs";
pub const COMPLETED_KEY_PREFIX: &str = "completed_";

const DB_FILE_NAME: &str = "coach.sqlite";
const APP_DATA_DIR: &str = "gym-coach";

// Custom Error type for DB operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database connection failed")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing database file")]
    Io(#[from] std::io::Error),
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database write failed: {0}")]
    WriteFailed(rusqlite::Error),
    #[error("Failed to encode value for key '{key}': {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
}

/// Key holding the completion set for `date`.
pub fn completed_key(date: NaiveDate) -> String {
    format!("{COMPLETED_KEY_PREFIX}{}", date.format("%Y-%m-%d"))
}

/// Gets the path to the SQLite database file within the app's data directory.
/// Creates the directory if it doesn't exist.
pub fn get_db_path() -> Result<PathBuf, Error> {
    let data_dir = dirs::data_dir().ok_or(Error::DataDir)?;
    let app_dir = data_dir.join(APP_DATA_DIR);
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

/// Opens a connection to the SQLite database.
pub fn open_db<P: AsRef<Path>>(path: P) -> Result<Connection, Error> {
    Connection::open(path).map_err(Error::Connection)
}

/// Creates the key-value table if it doesn't exist.
pub fn init(conn: &Connection) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL -- JSON encoded
        )",
        [],
    )
    .map_err(Error::Connection)?;
    Ok(())
}

pub fn get_raw(conn: &Connection, key: &str) -> Result<Option<String>, Error> {
    conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
        row.get(0)
    })
    .optional()
    .map_err(Error::QueryFailed)
}

pub fn put_raw(conn: &Connection, key: &str, value: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .map_err(Error::WriteFailed)?;
    Ok(())
}

pub fn put_json<T: Serialize + ?Sized>(
    conn: &Connection,
    key: &str,
    value: &T,
) -> Result<(), Error> {
    let encoded = serde_json::to_string(value).map_err(|source| Error::Encode {
        key: key.to_string(),
        source,
    })?;
    put_raw(conn, key, &encoded)
}

pub fn delete_key(conn: &Connection, key: &str) -> Result<u64, Error> {
    let rows = conn
        .execute("DELETE FROM kv WHERE key = ?1", params![key])
        .map_err(Error::WriteFailed)?;
    Ok(rows as u64)
}

pub fn keys_with_prefix(conn: &Connection, prefix: &str) -> Result<Vec<String>, Error> {
    let mut stmt = conn
        .prepare("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")
        .map_err(Error::QueryFailed)?;
    let keys = stmt
        .query_map(params![prefix], |row| row.get::<_, String>(0))
        .map_err(Error::QueryFailed)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::QueryFailed)?;
    Ok(keys)
}

/// Wipes every stored key.
pub fn clear_all(conn: &Connection) -> Result<u64, Error> {
    let rows = conn
        .execute("DELETE FROM kv", [])
        .map_err(Error::WriteFailed)?;
    Ok(rows as u64)
}

/// Reads a key as JSON. Missing keys, read failures and malformed JSON all
/// come back as `None`; the caller substitutes its default.
pub fn read_json(conn: &Connection, key: &str) -> Option<Value> {
    let raw = match get_raw(conn, key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "Failed to read stored value, using default");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, error = %e, "Stored value is not valid JSON, using default");
            None
        }
    }
}

pub fn load_profile(conn: &Connection) -> Profile {
    read_json(conn, PROFILE_KEY)
        .map(|v| Profile::from_value(&v))
        .unwrap_or_default()
}

pub fn load_logs(conn: &Connection) -> LogStore {
    read_json(conn, LOGS_KEY)
        .map(|v| LogStore::from_value(&v))
        .unwrap_or_default()
}

/// Completion set for `date`; non-string elements are skipped.
pub fn load_completed(conn: &Connection, date: NaiveDate) -> Vec<String> {
    read_json(conn, &completed_key(date))
        .and_then(|v| match v {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        })
        .unwrap_or_default()
}

pub fn save_profile(conn: &Connection, profile: &Profile) -> Result<(), Error> {
    put_json(conn, PROFILE_KEY, profile)
}

pub fn save_logs(conn: &Connection, logs: &LogStore) -> Result<(), Error> {
    put_json(conn, LOGS_KEY, logs.entries())
}

pub fn save_completed(
    conn: &Connection,
    date: NaiveDate,
    completed: &[String],
) -> Result<(), Error> {
    put_json(conn, &completed_key(date), completed)
}

/// Deletes completion sets stored for any date other than `keep`.
pub fn prune_completed(conn: &Connection, keep: NaiveDate) -> Result<u64, Error> {
    let keep_key = completed_key(keep);
    let mut removed = 0;
    for key in keys_with_prefix(conn, COMPLETED_KEY_PREFIX)? {
        if key != keep_key {
            removed += delete_key(conn, &key)?;
        }
    }
    Ok(removed)
}
