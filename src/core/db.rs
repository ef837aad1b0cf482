//! SQLite-backed store handle and schema lifecycle.
//!
//! A store is either fully initialized (all four tables plus the key row) or
//! fully absent. `create` and `drop_tables` each run in one transaction so a
//! crash never leaves a half-built schema behind.

use crate::core::error::{Result, VaultError};
use crate::core::keystore::KeyStore;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};

const TABLES: &[&str] = &["service", "service_key", "account", "encryption"];

const SCHEMA: &str = "
    CREATE TABLE service (
        service_name    TEXT PRIMARY KEY,
        shorthand_name  TEXT UNIQUE,
        created_at      TEXT NOT NULL
    );

    CREATE TABLE service_key (
        lookup_key      TEXT PRIMARY KEY,
        service_name    TEXT NOT NULL
            REFERENCES service(service_name) DEFERRABLE INITIALLY DEFERRED
    );

    CREATE INDEX idx_service_key_owner ON service_key(service_name);

    CREATE TABLE account (
        account_name    TEXT NOT NULL,
        account_pw      BLOB NOT NULL,
        service_name    TEXT NOT NULL
            REFERENCES service(service_name) DEFERRABLE INITIALLY DEFERRED,
        created_at      TEXT NOT NULL,
        UNIQUE (account_name, service_name)
    );

    CREATE INDEX idx_account_service ON account(service_name);

    CREATE TABLE encryption (
        key             BLOB NOT NULL
    );
";

/// Explicit handle to one store. Every component receives it (or a
/// transaction borrowed from it); nothing holds a global connection.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open the store file, creating an empty database if it does not exist.
    /// The schema is not created here; see [`Store::create`].
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure(conn, Some(path.to_path_buf()))
    }

    /// Open an existing store file without write access.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::configure(conn, Some(path.to_path_buf()))
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn, None)
    }

    fn configure(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, path })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Location of the database file (`None` for in-memory stores).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Begin a write transaction. Dropping it without `commit` rolls back.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    pub fn is_initialized(&self) -> Result<bool> {
        is_initialized(&self.conn)
    }

    pub fn require_initialized(&self) -> Result<()> {
        if self.is_initialized()? {
            Ok(())
        } else {
            Err(VaultError::NotInitialized)
        }
    }

    /// `Uninitialized -> Initialized`: create the tables and generate the key.
    pub fn create(&mut self) -> Result<()> {
        if self.is_initialized()? {
            return Err(VaultError::AlreadyInitialized);
        }
        let tx = self.transaction()?;
        create_schema(&tx)?;
        KeyStore::initialize(&tx)?;
        tx.commit()?;
        tracing::info!(path = ?self.path, "store created");
        Ok(())
    }

    /// `Initialized -> Uninitialized`: drop every table, key included.
    pub fn drop_tables(&mut self) -> Result<()> {
        if !self.is_initialized()? {
            return Err(VaultError::NotInitialized);
        }
        let tx = self.transaction()?;
        tx.execute_batch(
            "
            DROP TABLE account;
            DROP TABLE service_key;
            DROP TABLE service;
            DROP TABLE encryption;
            ",
        )?;
        tx.commit()?;
        tracing::warn!(path = ?self.path, "store dropped");
        Ok(())
    }
}

pub(crate) fn is_initialized(conn: &Connection) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    for table in TABLES {
        let count: i64 = stmt.query_row([table], |row| row.get(0))?;
        if count == 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Create the store tables (no key row).
pub(crate) fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    tracing::debug!("store schema created");
    Ok(())
}

pub(crate) fn timestamp_now() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_store_is_uninitialized() {
        let store = Store::open_in_memory().unwrap();
        assert!(!store.is_initialized().unwrap());
        assert!(matches!(
            store.require_initialized(),
            Err(VaultError::NotInitialized)
        ));
    }

    #[test]
    fn test_create_initializes_all_tables() {
        let mut store = Store::open_in_memory().unwrap();
        store.create().unwrap();
        assert!(store.is_initialized().unwrap());

        let keys: i64 = store
            .conn()
            .query_row("SELECT count(*) FROM encryption", [], |row| row.get(0))
            .unwrap();
        assert_eq!(keys, 1, "exactly one key row per store");
    }

    #[test]
    fn test_create_twice_fails() {
        let mut store = Store::open_in_memory().unwrap();
        store.create().unwrap();
        assert!(matches!(
            store.create(),
            Err(VaultError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_drop_returns_to_uninitialized() {
        let mut store = Store::open_in_memory().unwrap();
        store.create().unwrap();
        store.drop_tables().unwrap();
        assert!(!store.is_initialized().unwrap());
        assert!(matches!(
            store.drop_tables(),
            Err(VaultError::NotInitialized)
        ));
    }

    #[test]
    fn test_create_after_drop_generates_new_key() {
        let mut store = Store::open_in_memory().unwrap();
        store.create().unwrap();
        let first = KeyStore::load(store.conn()).unwrap().fingerprint();
        store.drop_tables().unwrap();
        store.create().unwrap();
        let second = KeyStore::load(store.conn()).unwrap().fingerprint();
        assert_ne!(first, second);
    }

    #[test]
    fn test_store_persists_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");
        {
            let mut store = Store::open(&path).unwrap();
            store.create().unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert!(store.is_initialized().unwrap());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn test_read_only_store_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");
        Store::open(&path).unwrap().create().unwrap();

        let mut store = Store::open_read_only(&path).unwrap();
        assert!(store.is_initialized().unwrap());
        assert!(store.drop_tables().is_err());
    }

    #[test]
    fn test_parse_timestamp_roundtrip() {
        let now = timestamp_now();
        assert!(parse_timestamp(Some(now)).is_some());
        assert!(parse_timestamp(Some("yesterday".into())).is_none());
        assert!(parse_timestamp(None).is_none());
    }
}
