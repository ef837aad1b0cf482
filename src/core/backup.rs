//! Whole-store snapshots: backup to a directory, restore from a file.
//!
//! A backup is a complete store of its own (same schema, same key, same
//! rows) and opens with [`Store::open`] like the live one.

use crate::constants::BACKUP_FILE_NAME;
use crate::core::db::{self, Store};
use crate::core::error::{Result, VaultError};
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};

/// Row counts copied by a backup or restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopySummary {
    pub services: usize,
    pub accounts: usize,
}

/// Location of the backup file inside `dir`.
pub fn backup_path(dir: &Path) -> PathBuf {
    dir.join(BACKUP_FILE_NAME)
}

/// Write a snapshot of `store` to `dir/store_backup.db`, replacing any
/// previous backup there. The file only appears once it is complete.
pub fn create_backup(store: &Store, dir: &Path) -> Result<(PathBuf, CopySummary)> {
    store.require_initialized()?;
    fs::create_dir_all(dir)?;
    let target = backup_path(dir);

    let tmp = tempfile::Builder::new()
        .prefix(".backup-")
        .suffix(".db.tmp")
        .tempfile_in(dir)?;

    let summary = {
        let mut dst = Connection::open(tmp.path())?;
        let tx = dst.transaction()?;
        db::create_schema(&tx)?;
        let summary = copy_rows(store.conn(), &tx)?;
        tx.commit()?;
        summary
    };

    tmp.persist(&target).map_err(|e| VaultError::Io(e.error))?;
    tracing::info!(
        path = %target.display(),
        services = summary.services,
        accounts = summary.accounts,
        "backup written"
    );
    Ok((target, summary))
}

/// Replace the contents of `store` with the backup at `source`.
/// The live store may be uninitialized; it is initialized from the backup.
pub fn restore(store: &mut Store, source: &Path) -> Result<CopySummary> {
    if !source.is_file() {
        return Err(VaultError::BackupNotFound(source.to_path_buf()));
    }
    let src = Store::open_read_only(source)?;
    if !matches!(src.is_initialized(), Ok(true)) {
        return Err(VaultError::InvalidBackup(source.to_path_buf()));
    }

    let was_initialized = store.is_initialized()?;
    let tx = store.transaction()?;
    if was_initialized {
        tx.execute_batch(
            "
            DELETE FROM account;
            DELETE FROM service_key;
            DELETE FROM service;
            DELETE FROM encryption;
            ",
        )?;
    } else {
        db::create_schema(&tx)?;
    }
    let summary = copy_rows(src.conn(), &tx)?;
    tx.commit()?;

    tracing::info!(
        source = %source.display(),
        services = summary.services,
        accounts = summary.accounts,
        "store restored"
    );
    Ok(summary)
}

/// Delete the backup file in `dir`.
pub fn remove_backup(dir: &Path) -> Result<PathBuf> {
    let target = backup_path(dir);
    match fs::remove_file(&target) {
        Ok(()) => {
            tracing::info!(path = %target.display(), "backup removed");
            Ok(target)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(VaultError::BackupNotFound(target)),
        Err(e) => Err(e.into()),
    }
}

/// Copy every row of every store table from `src` into the empty tables of `dst`.
fn copy_rows(src: &Connection, dst: &Connection) -> Result<CopySummary> {
    let mut services = 0;
    {
        let mut read = src.prepare(
            "SELECT service_name, shorthand_name, created_at FROM service ORDER BY rowid",
        )?;
        let mut write = dst.prepare(
            "INSERT INTO service (service_name, shorthand_name, created_at) VALUES (?1, ?2, ?3)",
        )?;
        let mut rows = read.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let shorthand: Option<String> = row.get(1)?;
            let created_at: String = row.get(2)?;
            write.execute(params![name, shorthand, created_at])?;
            services += 1;
        }
    }

    {
        let mut read = src.prepare("SELECT lookup_key, service_name FROM service_key")?;
        let mut write =
            dst.prepare("INSERT INTO service_key (lookup_key, service_name) VALUES (?1, ?2)")?;
        let mut rows = read.query([])?;
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let owner: String = row.get(1)?;
            write.execute(params![key, owner])?;
        }
    }

    let mut accounts = 0;
    {
        let mut read = src.prepare(
            "SELECT account_name, account_pw, service_name, created_at FROM account ORDER BY rowid",
        )?;
        let mut write = dst.prepare(
            "INSERT INTO account (account_name, account_pw, service_name, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut rows = read.query([])?;
        while let Some(row) = rows.next()? {
            let username: String = row.get(0)?;
            let sealed: Vec<u8> = row.get(1)?;
            let service: String = row.get(2)?;
            let created_at: String = row.get(3)?;
            write.execute(params![username, sealed, service, created_at])?;
            accounts += 1;
        }
    }

    {
        let mut read = src.prepare("SELECT key FROM encryption")?;
        let mut write = dst.prepare("INSERT INTO encryption (key) VALUES (?1)")?;
        let mut rows = read.query([])?;
        while let Some(row) = rows.next()? {
            let key: zeroize::Zeroizing<Vec<u8>> = zeroize::Zeroizing::new(row.get(0)?);
            write.execute(params![&key[..]])?;
        }
    }

    Ok(CopySummary { services, accounts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::CredentialEngine;
    use crate::core::keystore::KeyStore;
    use tempfile::TempDir;

    fn populated_engine(dir: &Path) -> CredentialEngine {
        let mut store = Store::open(&dir.join("store.db")).unwrap();
        store.create().unwrap();
        let mut engine = CredentialEngine::new(store);
        engine.define_service("github", Some("gh")).unwrap();
        engine.define_service("email", None).unwrap();
        engine.add_account("gh", "alice", "secret1").unwrap();
        engine.add_account("gh", "bob", "secret2").unwrap();
        engine
    }

    #[test]
    fn test_backup_is_equivalent_store() {
        let live = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let engine = populated_engine(live.path());

        let (path, summary) = create_backup(engine.store(), out.path()).unwrap();
        assert_eq!(path, out.path().join(BACKUP_FILE_NAME));
        assert_eq!(summary, CopySummary { services: 2, accounts: 2 });

        let copy = CredentialEngine::new(Store::open(&path).unwrap());
        assert_eq!(
            KeyStore::load(copy.store().conn()).unwrap().fingerprint(),
            KeyStore::load(engine.store().conn()).unwrap().fingerprint()
        );
        assert_eq!(copy.get_password("github", Some(2)).unwrap().password.as_str(), "secret2");
        assert_eq!(
            copy.list_services(false, true).unwrap(),
            engine.list_services(false, true).unwrap()
        );
    }

    #[test]
    fn test_backup_overwrites_previous() {
        let live = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut engine = populated_engine(live.path());
        create_backup(engine.store(), out.path()).unwrap();

        engine.define_service("zulip", None).unwrap();
        let (_, summary) = create_backup(engine.store(), out.path()).unwrap();
        assert_eq!(summary.services, 3);

        let leftovers: Vec<_> = fs::read_dir(out.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != BACKUP_FILE_NAME)
            .collect();
        assert!(leftovers.is_empty(), "temp files must not remain");
    }

    #[test]
    fn test_backup_requires_initialized_store() {
        let out = TempDir::new().unwrap();
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            create_backup(&store, out.path()),
            Err(VaultError::NotInitialized)
        ));
        assert!(!backup_path(out.path()).exists());
    }

    #[test]
    fn test_restore_into_empty_store() {
        let live = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let engine = populated_engine(live.path());
        let (path, _) = create_backup(engine.store(), out.path()).unwrap();

        let mut fresh = Store::open_in_memory().unwrap();
        let summary = restore(&mut fresh, &path).unwrap();
        assert_eq!(summary.accounts, 2);

        let restored = CredentialEngine::new(fresh);
        assert_eq!(restored.get_password("gh", Some(1)).unwrap().password.as_str(), "secret1");
    }

    #[test]
    fn test_restore_replaces_live_contents() {
        let live = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut engine = populated_engine(live.path());
        let (path, _) = create_backup(engine.store(), out.path()).unwrap();

        engine.remove_service("github").unwrap();
        engine.define_service("zulip", None).unwrap();

        restore(engine.store_mut(), &path).unwrap();
        let names: Vec<_> = engine
            .list_services(true, false)
            .unwrap()
            .into_iter()
            .map(|r| r.service)
            .collect();
        assert_eq!(names, vec!["email", "github"]);
    }

    #[test]
    fn test_restore_rejects_missing_and_uninitialized_sources() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open_in_memory().unwrap();

        assert!(matches!(
            restore(&mut store, &dir.path().join("missing.db")),
            Err(VaultError::BackupNotFound(_))
        ));

        let empty = dir.path().join("empty.db");
        Store::open(&empty)
            .unwrap()
            .conn()
            .execute_batch("CREATE TABLE unrelated (x INTEGER);")
            .unwrap();
        assert!(matches!(
            restore(&mut store, &empty),
            Err(VaultError::InvalidBackup(_))
        ));

        let garbage = dir.path().join("garbage.db");
        fs::write(&garbage, b"definitely not sqlite, just some bytes to fill a header").unwrap();
        assert!(matches!(
            restore(&mut store, &garbage),
            Err(VaultError::InvalidBackup(_)) | Err(VaultError::Database(_))
        ));
        assert!(!store.is_initialized().unwrap());
    }

    #[test]
    fn test_remove_backup() {
        let live = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let engine = populated_engine(live.path());
        create_backup(engine.store(), out.path()).unwrap();

        remove_backup(out.path()).unwrap();
        assert!(!backup_path(out.path()).exists());
        assert!(matches!(
            remove_backup(out.path()),
            Err(VaultError::BackupNotFound(_))
        ));
    }
}
