//! Per-store symmetric key and authenticated password encryption.
//!
//! Ciphertext layout: `version (1 byte) || nonce (12 bytes) || AES-256-GCM
//! ciphertext with its 16-byte tag`. Everything needed to decrypt except the
//! key travels with the blob.

use crate::constants::{CIPHERTEXT_VERSION, FINGERPRINT_LEN, KEY_LEN, NONCE_LEN};
use crate::core::db;
use crate::core::error::{Result, VaultError};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::{rngs::OsRng, RngCore};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const TAG_LEN: usize = 16;

pub struct KeyStore {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl KeyStore {
    /// Generate and persist the store key. Runs inside store creation.
    pub fn initialize(conn: &Connection) -> Result<()> {
        let existing: i64 = conn.query_row("SELECT count(*) FROM encryption", [], |row| row.get(0))?;
        if existing > 0 {
            return Err(VaultError::AlreadyInitialized);
        }

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key[..]);
        conn.execute("INSERT INTO encryption (key) VALUES (?1)", params![&key[..]])?;
        tracing::debug!("generated store key");
        Ok(())
    }

    /// Read the key of an initialized store.
    pub fn load(conn: &Connection) -> Result<Self> {
        if !db::is_initialized(conn)? {
            return Err(VaultError::NotInitialized);
        }
        let raw: Option<Vec<u8>> = conn
            .query_row("SELECT key FROM encryption LIMIT 1", [], |row| row.get(0))
            .optional()?;
        let raw = Zeroizing::new(raw.ok_or(VaultError::CorruptKey)?);
        if raw.len() != KEY_LEN {
            return Err(VaultError::CorruptKey);
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&raw);
        Ok(Self { key })
    }

    #[cfg(test)]
    pub(crate) fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key[..]).map_err(|e| VaultError::Encryption(e.to_string()))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
        out.push(CIPHERTEXT_VERSION);
        out.extend_from_slice(&nonce_bytes);
        out.extend(sealed);
        Ok(out)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if ciphertext.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err(VaultError::Decryption("ciphertext is truncated".into()));
        }
        let (version, rest) = ciphertext.split_at(1);
        if version[0] != CIPHERTEXT_VERSION {
            return Err(VaultError::Decryption(format!(
                "unknown ciphertext version {}",
                version[0]
            )));
        }
        let (nonce_bytes, sealed) = rest.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher()?
            .decrypt(nonce, sealed)
            .map(Zeroizing::new)
            .map_err(|_| {
                VaultError::Decryption("authentication failed (wrong key or altered data)".into())
            })
    }

    /// Decrypt and require UTF-8, the form every stored password takes.
    pub fn decrypt_string(&self, ciphertext: &[u8]) -> Result<Zeroizing<String>> {
        let bytes = self.decrypt(ciphertext)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| VaultError::Decryption("password is not valid UTF-8".into()))?;
        Ok(Zeroizing::new(text.to_string()))
    }

    /// Short SHA-256 fingerprint of the key, safe to display.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.key[..]);
        hex::encode(&digest[..FINGERPRINT_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::Store;

    fn keystore() -> KeyStore {
        KeyStore::from_key([7u8; KEY_LEN])
    }

    #[test]
    fn test_roundtrip() {
        let ks = keystore();
        for password in ["secret1", "", "pässwörd with spaces", "🔑"] {
            let sealed = ks.encrypt(password.as_bytes()).unwrap();
            assert_eq!(ks.decrypt_string(&sealed).unwrap().as_str(), password);
        }
    }

    #[test]
    fn test_ciphertext_is_self_describing() {
        let sealed = keystore().encrypt(b"secret").unwrap();
        assert_eq!(sealed[0], CIPHERTEXT_VERSION);
        assert_eq!(sealed.len(), 1 + NONCE_LEN + b"secret".len() + TAG_LEN);
    }

    #[test]
    fn test_nonce_differs_per_encryption() {
        let ks = keystore();
        assert_ne!(ks.encrypt(b"same").unwrap(), ks.encrypt(b"same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = keystore().encrypt(b"secret").unwrap();
        let other = KeyStore::from_key([8u8; KEY_LEN]);
        assert!(matches!(
            other.decrypt(&sealed),
            Err(VaultError::Decryption(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let ks = keystore();
        let mut sealed = ks.encrypt(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(ks.decrypt(&sealed), Err(VaultError::Decryption(_))));
    }

    #[test]
    fn test_truncated_and_foreign_input_fails() {
        let ks = keystore();
        let sealed = ks.encrypt(b"secret").unwrap();
        assert!(matches!(
            ks.decrypt(&sealed[..sealed.len() - 1]),
            Err(VaultError::Decryption(_))
        ));
        assert!(matches!(ks.decrypt(b"short"), Err(VaultError::Decryption(_))));
        assert!(matches!(
            ks.decrypt(b"gAAAAABkZ0not-a-real-token-at-all-0000000000"),
            Err(VaultError::Decryption(_))
        ));
    }

    #[test]
    fn test_initialize_persists_loadable_key() {
        let mut store = Store::open_in_memory().unwrap();
        store.create().unwrap();
        let ks = KeyStore::load(store.conn()).unwrap();
        let sealed = ks.encrypt(b"secret").unwrap();
        let again = KeyStore::load(store.conn()).unwrap();
        assert_eq!(again.decrypt_string(&sealed).unwrap().as_str(), "secret");
        assert_eq!(ks.fingerprint(), again.fingerprint());
        assert_eq!(ks.fingerprint().len(), FINGERPRINT_LEN * 2);
    }

    #[test]
    fn test_initialize_twice_fails() {
        let mut store = Store::open_in_memory().unwrap();
        store.create().unwrap();
        assert!(matches!(
            KeyStore::initialize(store.conn()),
            Err(VaultError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_malformed_key_row() {
        let mut store = Store::open_in_memory().unwrap();
        store.create().unwrap();
        store
            .conn()
            .execute("UPDATE encryption SET key = x'0102'", [])
            .unwrap();
        assert!(matches!(
            KeyStore::load(store.conn()),
            Err(VaultError::CorruptKey)
        ));
    }

    #[test]
    fn test_load_from_uninitialized_store() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            KeyStore::load(store.conn()),
            Err(VaultError::NotInitialized)
        ));
    }
}
