use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::Zeroizing;

/// A stored account row. The password never leaves the ledger in plaintext.
#[derive(Debug, Clone)]
pub struct Account {
    pub username: String,
    pub encrypted_password: Vec<u8>,
    pub service_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// The account picked by a service token plus selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub service: String,
    pub username: String,
    /// 1-based position among the service's accounts.
    pub index: usize,
}

/// A decrypted password together with the account it belongs to.
pub struct RetrievedPassword {
    pub account: AccountRef,
    pub password: Zeroizing<String>,
}

impl fmt::Debug for RetrievedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievedPassword")
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .finish()
    }
}
