//! Centralized constants for file names, permissions, and limits.

/// Directory name used under the platform data dir when no root is given.
pub const DEFAULT_ROOT_DIR_NAME: &str = "pwvault";

/// Environment variable overriding the store root.
pub const ROOT_ENV_VAR: &str = "PWVAULT_ROOT";

/// File name of the live store database.
pub const STORE_FILE_NAME: &str = "store.db";

/// File name of a backup written by `backup`.
pub const BACKUP_FILE_NAME: &str = "store_backup.db";

/// Lock file guarding mutating commands.
pub const LOCK_FILE_NAME: &str = "pwvault.lock";

/// Optional configuration file in the store root.
pub const CONFIG_FILE_NAME: &str = "pwvault.toml";

/// Permission mode for the store root directory.
pub const ROOT_DIR_MODE: u32 = 0o700;

/// Permission mode for the store database and backups.
pub const STORE_FILE_MODE: u32 = 0o600;

/// Length of the symmetric key in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Length of the AES-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Leading byte of every ciphertext produced by the key store.
pub const CIPHERTEXT_VERSION: u8 = 1;

/// Number of key-hash bytes shown as a fingerprint.
pub const FINGERPRINT_LEN: usize = 8;

/// Maximum password size in bytes (64 KiB).
pub const MAX_PASSWORD_SIZE: usize = 65_536;

/// Literal token destructive verbs require.
pub const CONFIRM_TOKEN: &str = "CONFIRM";

/// Clipboard tools probed in order when no command is configured.
pub const CLIPBOARD_TOOLS: &[&[&str]] = &[
    &["pbcopy"],
    &["wl-copy"],
    &["xclip", "-selection", "clipboard"],
    &["xsel", "--clipboard", "--input"],
    &["clip"],
];
