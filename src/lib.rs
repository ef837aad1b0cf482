//! Local single-user password vault.
//!
//! Services (with an optional shorthand) own accounts; each account's
//! password is encrypted at rest with a key kept in the store itself.
//! Everything lives in one SQLite file under the store root.
//!
//! ## Modules
//! - `cli`: Command-line handlers
//! - `core`: Store, key store, service registry, account ledger, engine, backups
//! - `models`: Data structures
//! - `util`: Clipboard and file-system helpers

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod util;
