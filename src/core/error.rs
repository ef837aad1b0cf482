//! Typed errors returned by the store, registry, ledger and engine.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("store is not initialized (run: pw create CONFIRM)")]
    NotInitialized,

    #[error("store is already initialized")]
    AlreadyInitialized,

    #[error("name or shorthand '{0}' is already in use")]
    Conflict(String),

    #[error("account '{username}' already exists for service '{service}'")]
    DuplicateAccount { username: String, service: String },

    #[error("service '{0}' does not exist")]
    ServiceNotFound(String),

    #[error("service '{0}' has no accounts")]
    NoAccounts(String),

    /// Several accounts match and no selector was supplied.
    #[error("service '{service}' has {} accounts; choose one", candidates.len())]
    AmbiguousChoice {
        service: String,
        candidates: Vec<String>,
    },

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("cannot decrypt password: {0}")]
    Decryption(String),

    #[error("cannot encrypt password: {0}")]
    Encryption(String),

    #[error("encryption key is missing or malformed")]
    CorruptKey,

    #[error("no backup found at {}", .0.display())]
    BackupNotFound(PathBuf),

    #[error("{} is not an initialized store", .0.display())]
    InvalidBackup(PathBuf),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;
