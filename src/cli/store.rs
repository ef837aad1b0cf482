use crate::cli::{prompt, CliContext, RemoveArgs};
use crate::constants;
use crate::core::keystore::KeyStore;
use crate::core::{backup, config, VaultError};
use crate::util::fs as store_fs;
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ConfirmArgs {
    /// Type CONFIRM to proceed
    #[arg(value_name = "CONFIRM", value_parser = prompt::parse_confirm)]
    pub confirm: String,
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Target directory (default: [backup] dir in pwvault.toml, else the store root)
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Backup file to restore from
    pub path: PathBuf,

    /// Type CONFIRM to proceed
    #[arg(value_name = "CONFIRM", value_parser = prompt::parse_confirm)]
    pub confirm: String,
}

pub fn run_create(ctx: &CliContext, _args: ConfirmArgs) -> Result<()> {
    let mut engine = ctx.create_engine()?;
    engine.store_mut().create()?;
    let fingerprint = KeyStore::load(engine.store().conn())?.fingerprint();
    if config::write_default_if_missing(&ctx.paths.config)? {
        tracing::info!(path = %ctx.paths.config.display(), "default config written");
    }
    println!("Created store {}", ctx.paths.database.display());
    println!("key fingerprint: {}", fingerprint);
    Ok(())
}

pub fn run_drop(ctx: &CliContext, _args: ConfirmArgs) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    engine.store_mut().drop_tables()?;
    println!("Dropped store {} (accounts and key are gone)", ctx.paths.database.display());
    Ok(())
}

pub fn run_backup(ctx: &CliContext, args: BackupArgs) -> Result<()> {
    let dir = args
        .path
        .or_else(|| ctx.config.backup.dir.clone())
        .unwrap_or_else(|| ctx.paths.root.clone());
    let engine = ctx.open_engine()?;
    let (path, summary) = backup::create_backup(engine.store(), &dir)
        .with_context(|| format!("back up to {}", dir.display()))?;
    store_fs::set_mode(&path, constants::STORE_FILE_MODE)?;
    let fingerprint = KeyStore::load(engine.store().conn())?.fingerprint();

    println!(
        "Backed up {} service(s), {} account(s) to {}",
        summary.services,
        summary.accounts,
        path.display()
    );
    println!("key fingerprint: {}", fingerprint);
    Ok(())
}

pub fn run_restore(ctx: &CliContext, args: RestoreArgs) -> Result<()> {
    if !args.path.is_file() {
        return Err(VaultError::BackupNotFound(args.path).into());
    }
    let mut engine = ctx.create_engine()?;
    let summary = backup::restore(engine.store_mut(), &args.path)
        .with_context(|| format!("restore from {}", args.path.display()))?;
    let fingerprint = KeyStore::load(engine.store().conn())?.fingerprint();

    println!(
        "Restored {} service(s), {} account(s) from {}",
        summary.services,
        summary.accounts,
        args.path.display()
    );
    println!("key fingerprint: {}", fingerprint);
    Ok(())
}

pub fn run_remove_backup(ctx: &CliContext, args: RemoveArgs) -> Result<()> {
    let dir = backup_dir(Path::new(&args.target));
    let target = backup::backup_path(&dir);
    if !prompt::confirm(ctx, args.yes, &format!("delete backup {}", target.display()))? {
        println!("Aborted.");
        return Ok(());
    }
    let removed = backup::remove_backup(&dir)?;
    println!("Deleted {}", removed.display());
    Ok(())
}

/// Accept either the backup directory or the backup file itself.
fn backup_dir(target: &Path) -> PathBuf {
    if target.file_name().and_then(|n| n.to_str()) == Some(constants::BACKUP_FILE_NAME) {
        return target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
    }
    target.to_path_buf()
}
