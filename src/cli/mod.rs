//! CLI routing and command dispatch.

use crate::constants;
use crate::core::engine::CredentialEngine;
use crate::core::{config, db::Store, file_lock::StoreLock, paths::StorePaths, VaultError};
use crate::models::config::ConfigFile;
use crate::util::fs as store_fs;
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

pub mod account;
pub mod doctor;
pub mod prompt;
pub mod service;
pub mod store;

/// Shared context passed to all command handlers.
pub struct CliContext {
    pub paths: StorePaths,
    pub non_interactive: bool,
    pub config: ConfigFile,
    pub config_load_warning: Option<String>,
}

impl CliContext {
    /// Open the existing store. A missing store file means the store was
    /// never created; nothing is written to the root in that case.
    pub fn open_engine(&self) -> Result<CredentialEngine> {
        if !self.paths.database.is_file() {
            return Err(VaultError::NotInitialized.into());
        }
        let store = Store::open(&self.paths.database)
            .with_context(|| format!("open store {}", self.paths.database.display()))?;
        Ok(CredentialEngine::new(store))
    }

    /// Open the store for `create` or `restore`, making the root directory
    /// and the database file if they do not exist yet.
    pub fn create_engine(&self) -> Result<CredentialEngine> {
        store_fs::create_private_dir(&self.paths.root, constants::ROOT_DIR_MODE)?;
        let fresh = !self.paths.database.exists();
        let store = Store::open(&self.paths.database)
            .with_context(|| format!("open store {}", self.paths.database.display()))?;
        if fresh {
            store_fs::set_mode(&self.paths.database, constants::STORE_FILE_MODE)?;
        }
        Ok(CredentialEngine::new(store))
    }

    /// Take the store lock. Only called once the root is known to exist.
    pub fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(&self.paths.lock)
    }
}

/// What a command needs from the store root before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAccess {
    /// Does not touch the store.
    None,
    /// Needs an existing store file.
    Existing,
    /// May create the root and the store file.
    Create,
}

#[derive(Parser, Debug)]
#[command(name = "pw", version, about = "Local command-line password vault")]
pub struct Cli {
    /// Store directory (default: platform data dir / pwvault)
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Run in non-interactive mode (no prompts, suitable for scripts)
    #[arg(long, global = true, env = "PWVAULT_NON_INTERACTIVE")]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Parse the process arguments with a case-insensitive verb.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_verb(std::env::args_os()))
    }

    pub fn run(self) -> Result<()> {
        let paths = StorePaths::resolve(self.root)?;

        // A broken config file must not lock the user out of their passwords.
        let mut config_load_warning: Option<String> = None;
        let config = match config::load(&paths.config) {
            Ok(cfg) => cfg,
            Err(e) => {
                config_load_warning = Some(format!("cannot read {}: {:#}", paths.config.display(), e));
                ConfigFile::default()
            }
        };
        if let Some(w) = &config_load_warning {
            tracing::warn!("{}", w);
        }

        let ctx = CliContext {
            paths,
            non_interactive: self.non_interactive,
            config,
            config_load_warning,
        };

        let access = self.command.store_access();
        match access {
            StoreAccess::Create => {
                store_fs::create_private_dir(&ctx.paths.root, constants::ROOT_DIR_MODE)?;
            }
            StoreAccess::Existing if !ctx.paths.database.is_file() => {
                return Err(VaultError::NotInitialized.into());
            }
            StoreAccess::Existing | StoreAccess::None => {}
        }
        let _lock = if self.command.mutates() {
            Some(ctx.lock()?)
        } else {
            None
        };
        tracing::debug!(command = self.command.name(), store = %ctx.paths, "dispatch");

        match self.command {
            Commands::Define(args) => service::run_define(&ctx, args),
            Commands::Add(args) => account::run_add(&ctx, args),
            Commands::Get(args) => account::run_get(&ctx, args),
            Commands::Update(args) => {
                if args.account {
                    account::run_update(&ctx, args)
                } else {
                    service::run_update(&ctx, args)
                }
            }
            Commands::Remove(args) => {
                if args.backup {
                    store::run_remove_backup(&ctx, args)
                } else if args.account {
                    account::run_remove(&ctx, args)
                } else {
                    service::run_remove(&ctx, args)
                }
            }
            Commands::Ls(args) => service::run_ls(&ctx, args),
            Commands::Clear => account::run_clear(&ctx),
            Commands::Create(args) => store::run_create(&ctx, args),
            Commands::Drop(args) => store::run_drop(&ctx, args),
            Commands::Backup(args) => store::run_backup(&ctx, args),
            Commands::Restore(args) => store::run_restore(&ctx, args),
            Commands::Doctor => doctor::run(&ctx),
        }
    }
}

/// Lowercase the first positional argument when it names a verb, so
/// `pw DEFINE` and `pw Define` reach `define`.
pub fn normalize_verb<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let command = Cli::command();
    let mut i = 1;
    while i < args.len() {
        let arg = args[i].to_string_lossy().into_owned();
        if arg == "--root" {
            i += 2;
            continue;
        }
        if arg.starts_with('-') {
            i += 1;
            continue;
        }
        let lower = arg.to_lowercase();
        if command.get_subcommands().any(|sub| sub.get_name() == lower) {
            args[i] = OsString::from(lower);
        }
        break;
    }
    args
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Define a service with an optional shorthand
    Define(service::DefineArgs),
    /// Add an account to a service
    Add(account::AddArgs),
    /// Copy an account's password to the clipboard
    Get(account::GetArgs),
    /// Update an account (-a) or a service (-s)
    Update(UpdateArgs),
    /// Remove an account (-a), a service and its accounts (-s), or a backup (-b)
    Remove(RemoveArgs),
    /// List services (-a: alphabetical, -u: with account usernames)
    Ls(service::LsArgs),
    /// Empty the clipboard
    Clear,
    /// Create the store tables and encryption key
    Create(store::ConfirmArgs),
    /// Drop the store tables, key included
    Drop(store::ConfirmArgs),
    /// Write a copy of the store to a directory
    Backup(store::BackupArgs),
    /// Replace the store contents with a backup
    Restore(store::RestoreArgs),
    /// Diagnose the store and environment (read-only)
    Doctor,
}

#[derive(clap::Args, Debug)]
#[command(group = clap::ArgGroup::new("mode").required(true).args(["account", "service"]))]
pub struct UpdateArgs {
    /// Update an account of SERVICE
    #[arg(short = 'a', long = "account-mode")]
    pub account: bool,

    /// Update SERVICE itself
    #[arg(short = 's', long = "service-mode")]
    pub service: bool,

    /// Service name or shorthand
    #[arg(value_parser = prompt::parse_token)]
    pub target: String,

    /// Account number when the service has several (1-based)
    #[arg(long = "account", value_name = "N", value_parser = prompt::parse_selector_arg)]
    pub selector: Option<usize>,

    /// New username (account mode)
    #[arg(long)]
    pub username: Option<String>,

    /// Read the new password from stdin (account mode)
    #[arg(long)]
    pub from_stdin: bool,

    /// New service name (service mode)
    #[arg(long, value_parser = prompt::parse_token)]
    pub name: Option<String>,

    /// New shorthand, empty to clear (service mode)
    #[arg(long)]
    pub shorthand: Option<String>,
}

#[derive(clap::Args, Debug)]
#[command(group = clap::ArgGroup::new("mode").required(true).args(["account", "service", "backup"]))]
pub struct RemoveArgs {
    /// Remove an account of SERVICE
    #[arg(short = 'a', long = "account-mode")]
    pub account: bool,

    /// Remove SERVICE and all of its accounts
    #[arg(short = 's', long = "service-mode")]
    pub service: bool,

    /// Remove the backup file in directory TARGET
    #[arg(short = 'b', long = "backup-mode")]
    pub backup: bool,

    /// Service name or shorthand, or a directory with -b
    pub target: String,

    /// Account number when the service has several (1-based)
    #[arg(long = "account", value_name = "N", value_parser = prompt::parse_selector_arg)]
    pub selector: Option<usize>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl Commands {
    /// Whether this command writes to the store and must hold the lock.
    pub fn mutates(&self) -> bool {
        match self {
            Commands::Remove(args) => !args.backup,
            Commands::Define(_)
            | Commands::Add(_)
            | Commands::Update(_)
            | Commands::Create(_)
            | Commands::Drop(_)
            | Commands::Backup(_)
            | Commands::Restore(_) => true,
            Commands::Get(_) | Commands::Ls(_) | Commands::Clear | Commands::Doctor => false,
        }
    }

    pub fn store_access(&self) -> StoreAccess {
        match self {
            Commands::Create(_) | Commands::Restore(_) => StoreAccess::Create,
            Commands::Remove(args) if args.backup => StoreAccess::None,
            Commands::Clear | Commands::Doctor => StoreAccess::None,
            _ => StoreAccess::Existing,
        }
    }

    /// Command name for log lines.
    pub fn name(&self) -> &str {
        match self {
            Commands::Define(_) => "define",
            Commands::Add(_) => "add",
            Commands::Get(_) => "get",
            Commands::Update(_) => "update",
            Commands::Remove(_) => "remove",
            Commands::Ls(_) => "ls",
            Commands::Clear => "clear",
            Commands::Create(_) => "create",
            Commands::Drop(_) => "drop",
            Commands::Backup(_) => "backup",
            Commands::Restore(_) => "restore",
            Commands::Doctor => "doctor",
        }
    }
}
