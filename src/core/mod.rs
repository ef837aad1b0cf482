//! Core business logic: the store, its components and the engine.
//!
//! `keystore`, `registry` and `ledger` operate on a borrowed connection or
//! transaction; `engine` owns the [`db::Store`] and composes them.

pub mod backup;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod file_lock;
pub mod keystore;
pub mod ledger;
pub mod paths;
pub mod registry;

pub use error::{Result, VaultError};
