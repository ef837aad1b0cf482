//! Credential engine: the operations the CLI calls, one per invocation.
//!
//! Every mutation runs in a single transaction on the owned [`Store`]; an
//! error drops the transaction and nothing is written. The engine never
//! prompts. When several accounts match and no selector was given it returns
//! [`VaultError::AmbiguousChoice`] with the candidates so the caller can ask
//! and retry.

use crate::core::db::Store;
use crate::core::error::{Result, VaultError};
use crate::core::keystore::KeyStore;
use crate::core::{ledger, registry};
use crate::models::account::{Account, AccountRef, RetrievedPassword};
use crate::models::service::{ListingRow, Service};
use rusqlite::Connection;

/// Parse a 1-based account selector typed by the user.
pub fn parse_selector(input: &str) -> Result<usize> {
    match input.trim().parse::<usize>() {
        Ok(0) => Err(VaultError::InvalidSelection("selection starts at 1".into())),
        Ok(n) => Ok(n),
        Err(_) => Err(VaultError::InvalidSelection(format!(
            "'{}' is not a number",
            input.trim()
        ))),
    }
}

pub struct CredentialEngine {
    store: Store,
}

impl CredentialEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    fn resolve_service(conn: &Connection, token: &str) -> Result<Service> {
        registry::resolve(conn, token)?
            .ok_or_else(|| VaultError::ServiceNotFound(token.to_string()))
    }

    pub fn define_service(&mut self, name: &str, shorthand: Option<&str>) -> Result<Service> {
        self.store.require_initialized()?;
        let tx = self.store.transaction()?;
        let service = registry::define(&tx, name, shorthand)?;
        tx.commit()?;
        tracing::info!(service = %service.name, shorthand = ?service.shorthand, "service defined");
        Ok(service)
    }

    pub fn add_account(
        &mut self,
        service_token: &str,
        username: &str,
        password: &str,
    ) -> Result<AccountRef> {
        self.store.require_initialized()?;
        let tx = self.store.transaction()?;
        let service = Self::resolve_service(&tx, service_token)?;
        if ledger::exists(&tx, username, &service.name)? {
            return Err(VaultError::DuplicateAccount {
                username: username.to_string(),
                service: service.name,
            });
        }
        let sealed = KeyStore::load(&tx)?.encrypt(password.as_bytes())?;
        ledger::add(&tx, username, &sealed, &service.name)?;
        let index = ledger::list_for_service(&tx, &service.name)?.len();
        tx.commit()?;

        tracing::info!(service = %service.name, "account added");
        Ok(AccountRef {
            service: service.name,
            username: username.to_string(),
            index,
        })
    }

    /// Pick one account of a service.
    ///
    /// One account is returned directly; with several, `selector` (1-based)
    /// is required. A selector is range-checked whenever it is given.
    pub fn select_account(&self, service_token: &str, selector: Option<usize>) -> Result<AccountRef> {
        self.store.require_initialized()?;
        let (service, account, index) =
            Self::pick(self.store.conn(), service_token, selector)?;
        Ok(AccountRef {
            service: service.name,
            username: account.username,
            index,
        })
    }

    fn pick(
        conn: &Connection,
        service_token: &str,
        selector: Option<usize>,
    ) -> Result<(Service, Account, usize)> {
        let service = Self::resolve_service(conn, service_token)?;
        let mut accounts = ledger::list_for_service(conn, &service.name)?;

        let index = match (accounts.len(), selector) {
            (0, _) => return Err(VaultError::NoAccounts(service.name)),
            (1, None) => 1,
            (_, None) => {
                return Err(VaultError::AmbiguousChoice {
                    service: service.name,
                    candidates: accounts.into_iter().map(|a| a.username).collect(),
                })
            }
            (len, Some(n)) if n == 0 || n > len => {
                return Err(VaultError::InvalidSelection(format!(
                    "{} is out of range (1-{})",
                    n, len
                )))
            }
            (_, Some(n)) => n,
        };

        let account = accounts.swap_remove(index - 1);
        Ok((service, account, index))
    }

    pub fn get_password(
        &self,
        service_token: &str,
        selector: Option<usize>,
    ) -> Result<RetrievedPassword> {
        self.store.require_initialized()?;
        let conn = self.store.conn();
        let (service, account, index) = Self::pick(conn, service_token, selector)?;
        let password = KeyStore::load(conn)?.decrypt_string(&account.encrypted_password)?;

        tracing::debug!(service = %service.name, index, "password retrieved");
        Ok(RetrievedPassword {
            account: AccountRef {
                service: service.name,
                username: account.username,
                index,
            },
            password,
        })
    }

    /// Replace username and password of the selected account. The password is
    /// always re-encrypted, even when unchanged.
    pub fn update_account(
        &mut self,
        service_token: &str,
        selector: Option<usize>,
        new_username: &str,
        new_password: &str,
    ) -> Result<AccountRef> {
        self.store.require_initialized()?;
        let tx = self.store.transaction()?;
        let (service, account, index) = Self::pick(&tx, service_token, selector)?;

        if new_username != account.username && ledger::exists(&tx, new_username, &service.name)? {
            return Err(VaultError::DuplicateAccount {
                username: new_username.to_string(),
                service: service.name,
            });
        }
        let sealed = KeyStore::load(&tx)?.encrypt(new_password.as_bytes())?;
        ledger::update(&tx, &service.name, &account.username, new_username, &sealed)?;
        tx.commit()?;

        tracing::info!(service = %service.name, index, "account updated");
        Ok(AccountRef {
            service: service.name,
            username: new_username.to_string(),
            index,
        })
    }

    /// Rename a service and set its shorthand (`None` or empty clears it).
    pub fn update_service(
        &mut self,
        token: &str,
        new_name: &str,
        new_shorthand: Option<&str>,
    ) -> Result<Service> {
        self.store.require_initialized()?;
        let tx = self.store.transaction()?;
        let current = Self::resolve_service(&tx, token)?;
        let updated = registry::rename(&tx, &current.name, new_name, new_shorthand)?;
        tx.commit()?;

        tracing::info!(from = %current.name, to = %updated.name, "service updated");
        Ok(updated)
    }

    /// Delete a service and all of its accounts. Returns the account count.
    pub fn remove_service(&mut self, token: &str) -> Result<usize> {
        self.store.require_initialized()?;
        let tx = self.store.transaction()?;
        let service = Self::resolve_service(&tx, token)?;
        let removed = ledger::remove_all_for_service(&tx, &service.name)?;
        registry::delete(&tx, &service.name)?;
        tx.commit()?;

        tracing::info!(service = %service.name, accounts = removed, "service removed");
        Ok(removed)
    }

    pub fn remove_account(
        &mut self,
        service_token: &str,
        selector: Option<usize>,
    ) -> Result<AccountRef> {
        self.store.require_initialized()?;
        let tx = self.store.transaction()?;
        let (service, account, index) = Self::pick(&tx, service_token, selector)?;
        ledger::remove(&tx, &service.name, &account.username)?;
        tx.commit()?;

        tracing::info!(service = %service.name, index, "account removed");
        Ok(AccountRef {
            service: service.name,
            username: account.username,
            index,
        })
    }

    /// Read-only listing. With `include_account_usernames` there is one row
    /// per (service, account) and services without accounts are left out.
    pub fn list_services(
        &self,
        sort_alphabetically: bool,
        include_account_usernames: bool,
    ) -> Result<Vec<ListingRow>> {
        self.store.require_initialized()?;
        let conn = self.store.conn();
        if include_account_usernames {
            return ledger::list_with_services(conn, sort_alphabetically);
        }
        Ok(registry::list(conn, sort_alphabetically)?
            .into_iter()
            .map(|s| ListingRow {
                service: s.name,
                shorthand: s.shorthand,
                username: None,
                created_at: s.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> CredentialEngine {
        let mut store = Store::open_in_memory().unwrap();
        store.create().unwrap();
        CredentialEngine::new(store)
    }

    #[test]
    fn test_parse_selector() {
        assert_eq!(parse_selector(" 2 ").unwrap(), 2);
        assert!(matches!(parse_selector("0"), Err(VaultError::InvalidSelection(_))));
        assert!(matches!(parse_selector("two"), Err(VaultError::InvalidSelection(_))));
        assert!(matches!(parse_selector("-1"), Err(VaultError::InvalidSelection(_))));
    }

    #[test]
    fn test_operations_require_initialized_store() {
        let mut engine = CredentialEngine::new(Store::open_in_memory().unwrap());
        assert!(matches!(
            engine.define_service("github", None),
            Err(VaultError::NotInitialized)
        ));
        assert!(matches!(
            engine.get_password("github", None),
            Err(VaultError::NotInitialized)
        ));
        assert!(matches!(
            engine.list_services(false, false),
            Err(VaultError::NotInitialized)
        ));
    }

    #[test]
    fn test_github_scenario() {
        let mut engine = engine();
        engine.define_service("github", Some("gh")).unwrap();
        engine.add_account("gh", "alice", "secret1").unwrap();

        let got = engine.get_password("github", Some(1)).unwrap();
        assert_eq!(got.password.as_str(), "secret1");
        assert_eq!(got.account.username, "alice");

        assert!(matches!(
            engine.add_account("github", "alice", "secret2"),
            Err(VaultError::DuplicateAccount { .. })
        ));
        let bob = engine.add_account("github", "bob", "secret2").unwrap();
        assert_eq!(bob.index, 2);

        match engine.get_password("gh", None) {
            Err(VaultError::AmbiguousChoice { service, candidates }) => {
                assert_eq!(service, "github");
                assert_eq!(candidates, vec!["alice", "bob"]);
            }
            other => panic!("expected AmbiguousChoice, got {:?}", other),
        }
        assert!(matches!(
            engine.get_password("gh", Some(3)),
            Err(VaultError::InvalidSelection(_))
        ));
        assert_eq!(engine.get_password("gh", Some(2)).unwrap().password.as_str(), "secret2");
    }

    #[test]
    fn test_get_without_accounts() {
        let mut engine = engine();
        engine.define_service("github", None).unwrap();
        assert!(matches!(
            engine.get_password("github", None),
            Err(VaultError::NoAccounts(_))
        ));
        assert!(matches!(
            engine.get_password("nope", None),
            Err(VaultError::ServiceNotFound(_))
        ));
    }

    #[test]
    fn test_single_account_rejects_out_of_range_selector() {
        let mut engine = engine();
        engine.define_service("github", None).unwrap();
        engine.add_account("github", "alice", "pw").unwrap();
        assert!(engine.get_password("github", None).is_ok());
        assert!(matches!(
            engine.get_password("github", Some(2)),
            Err(VaultError::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_passwords_are_encrypted_at_rest() {
        let mut engine = engine();
        engine.define_service("github", None).unwrap();
        engine.add_account("github", "alice", "hunter2").unwrap();

        let stored: Vec<u8> = engine
            .store()
            .conn()
            .query_row("SELECT account_pw FROM account", [], |row| row.get(0))
            .unwrap();
        assert!(!stored.windows(7).any(|w| w == b"hunter2"));
    }

    #[test]
    fn test_corrupted_password_does_not_break_listing() {
        let mut engine = engine();
        engine.define_service("github", None).unwrap();
        engine.add_account("github", "alice", "pw").unwrap();
        engine
            .store()
            .conn()
            .execute("UPDATE account SET account_pw = x'00'", [])
            .unwrap();

        assert!(matches!(
            engine.get_password("github", None),
            Err(VaultError::Decryption(_))
        ));
        assert_eq!(engine.list_services(false, true).unwrap().len(), 1);
    }

    #[test]
    fn test_update_account() {
        let mut engine = engine();
        engine.define_service("github", None).unwrap();
        engine.add_account("github", "alice", "one").unwrap();
        engine.add_account("github", "bob", "two").unwrap();

        assert!(matches!(
            engine.update_account("github", None, "x", "y"),
            Err(VaultError::AmbiguousChoice { .. })
        ));
        assert!(matches!(
            engine.update_account("github", Some(1), "bob", "y"),
            Err(VaultError::DuplicateAccount { .. })
        ));

        let updated = engine.update_account("github", Some(1), "alice2", "three").unwrap();
        assert_eq!(updated.index, 1);
        let got = engine.get_password("github", Some(1)).unwrap();
        assert_eq!(got.account.username, "alice2");
        assert_eq!(got.password.as_str(), "three");
        assert_eq!(engine.get_password("github", Some(2)).unwrap().password.as_str(), "two");
    }

    #[test]
    fn test_update_account_same_username_reencrypts() {
        let mut engine = engine();
        engine.define_service("github", None).unwrap();
        engine.add_account("github", "alice", "same").unwrap();
        let read = |e: &CredentialEngine| -> Vec<u8> {
            e.store()
                .conn()
                .query_row("SELECT account_pw FROM account", [], |row| row.get(0))
                .unwrap()
        };
        let before = read(&engine);
        engine.update_account("github", None, "alice", "same").unwrap();
        assert_ne!(before, read(&engine));
        assert_eq!(engine.get_password("github", None).unwrap().password.as_str(), "same");
    }

    #[test]
    fn test_update_service_clears_shorthand_and_moves_accounts() {
        let mut engine = engine();
        engine.define_service("github", Some("gh")).unwrap();
        engine.add_account("gh", "alice", "a").unwrap();
        engine.add_account("gh", "bob", "b").unwrap();

        let updated = engine.update_service("gh", "octocat", Some("")).unwrap();
        assert_eq!(updated.name, "octocat");
        assert!(updated.shorthand.is_none());

        assert!(registry::resolve(engine.store().conn(), "gh").unwrap().is_none());
        assert!(ledger::list_for_service(engine.store().conn(), "github")
            .unwrap()
            .is_empty());
        assert_eq!(
            engine.get_password("octocat", Some(2)).unwrap().password.as_str(),
            "b"
        );
    }

    #[test]
    fn test_update_service_conflict_is_noop() {
        let mut engine = engine();
        engine.define_service("github", Some("gh")).unwrap();
        engine.define_service("gitlab", Some("gl")).unwrap();
        engine.add_account("github", "alice", "a").unwrap();

        assert!(matches!(
            engine.update_service("github", "gl", None),
            Err(VaultError::Conflict(_))
        ));
        let rows = engine.list_services(true, false).unwrap();
        assert_eq!(rows[0].service, "github");
        assert_eq!(rows[0].shorthand.as_deref(), Some("gh"));
        assert_eq!(rows[1].shorthand.as_deref(), Some("gl"));
        assert!(engine.get_password("gh", None).is_ok());
    }

    #[test]
    fn test_update_service_to_own_shorthand() {
        let mut engine = engine();
        engine.define_service("github", Some("gh")).unwrap();
        let svc = engine.update_service("github", "gh", Some("gh")).unwrap();
        assert_eq!(svc.name, "gh");
        assert_eq!(svc.shorthand.as_deref(), Some("gh"));
    }

    #[test]
    fn test_remove_service_cascades() {
        let mut engine = engine();
        engine.define_service("github", Some("gh")).unwrap();
        engine.define_service("gitlab", None).unwrap();
        for user in ["a", "b", "c"] {
            engine.add_account("gh", user, "pw").unwrap();
        }
        engine.add_account("gitlab", "a", "pw").unwrap();

        assert_eq!(engine.remove_service("gh").unwrap(), 3);
        let conn = engine.store().conn();
        assert!(registry::resolve(conn, "github").unwrap().is_none());
        assert!(registry::resolve(conn, "gh").unwrap().is_none());
        let orphans: i64 = conn
            .query_row(
                "SELECT count(*) FROM account WHERE service_name = 'github'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
        assert_eq!(ledger::count(conn).unwrap(), 1);
        assert!(matches!(
            engine.remove_service("gh"),
            Err(VaultError::ServiceNotFound(_))
        ));
    }

    #[test]
    fn test_remove_account() {
        let mut engine = engine();
        engine.define_service("github", None).unwrap();
        engine.add_account("github", "alice", "a").unwrap();
        engine.add_account("github", "bob", "b").unwrap();

        assert!(matches!(
            engine.remove_account("github", None),
            Err(VaultError::AmbiguousChoice { .. })
        ));
        assert!(matches!(
            engine.remove_account("github", Some(5)),
            Err(VaultError::InvalidSelection(_))
        ));
        let removed = engine.remove_account("github", Some(1)).unwrap();
        assert_eq!(removed.username, "alice");
        let left = engine.get_password("github", None).unwrap();
        assert_eq!(left.account.username, "bob");
    }

    #[test]
    fn test_list_services_views() {
        let mut engine = engine();
        engine.define_service("zulip", None).unwrap();
        engine.define_service("github", Some("gh")).unwrap();
        engine.add_account("github", "alice", "a").unwrap();
        engine.add_account("github", "bob", "b").unwrap();

        let plain = engine.list_services(true, false).unwrap();
        assert_eq!(plain.len(), 2);
        assert_eq!(plain[0].service, "github");
        assert!(plain.iter().all(|r| r.username.is_none()));

        let with_users = engine.list_services(false, true).unwrap();
        assert_eq!(with_users.len(), 2);
        assert!(with_users.iter().all(|r| r.service == "github"));
    }
}
