//! Diagnostics for the store and its environment. Never writes anything.

use crate::cli::CliContext;
use crate::constants;
use crate::core::db::Store;
use crate::core::keystore::KeyStore;
use crate::core::{ledger, registry};
use crate::util::{clipboard, fs as store_fs};
use anyhow::Result;
use std::path::Path;

#[derive(Default)]
struct Tally {
    ok: u32,
    warn: u32,
    fail: u32,
}

impl Tally {
    fn pass(&mut self, msg: impl AsRef<str>) {
        println!("  [PASS] {}", msg.as_ref());
        self.ok += 1;
    }

    fn warn(&mut self, msg: impl AsRef<str>) {
        println!("  [WARN] {}", msg.as_ref());
        self.warn += 1;
    }

    fn fail(&mut self, msg: impl AsRef<str>) {
        println!("  [FAIL] {}", msg.as_ref());
        self.fail += 1;
    }
}

pub fn run(ctx: &CliContext) -> Result<()> {
    let paths = &ctx.paths;
    let mut t = Tally::default();

    println!("Doctor: {}", paths);
    if let Some(w) = &ctx.config_load_warning {
        t.warn(w);
    }

    if paths.root.is_dir() {
        t.pass(format!("store root exists: {}", paths.root.display()));
        check_mode(&mut t, &paths.root, constants::ROOT_DIR_MODE);
    } else {
        t.fail(format!("store root missing: {} (run: pw create CONFIRM)", paths.root.display()));
    }

    if paths.database.is_file() {
        t.pass(format!("store file exists: {}", paths.database.display()));
        check_mode(&mut t, &paths.database, constants::STORE_FILE_MODE);
        check_store(&mut t, &paths.database);
    } else {
        t.fail(format!("store file missing: {}", paths.database.display()));
    }

    let backup_dir = ctx.config.backup.dir.as_deref().unwrap_or(paths.root.as_path());
    let backup = crate::core::backup::backup_path(backup_dir);
    if backup.is_file() {
        t.pass(format!("backup present: {}", backup.display()));
    } else {
        t.warn(format!("no backup at {} (run: pw backup)", backup.display()));
    }

    match clipboard::find_tool(&ctx.config.clipboard.command) {
        Some(tool) => t.pass(format!("clipboard tool: {}", tool.display())),
        None => t.warn("no clipboard tool found; use `pw get --stdout` or set [clipboard] command"),
    }

    println!();
    println!("Doctor summary: {} pass, {} warn, {} fail", t.ok, t.warn, t.fail);
    if t.fail > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn check_mode(t: &mut Tally, path: &Path, expected: u32) {
    if let Some(mode) = store_fs::mode_of(path) {
        if mode & 0o077 != 0 {
            t.warn(format!(
                "{} mode: {:04o} (expected {:04o})",
                path.display(),
                mode,
                expected
            ));
        } else {
            t.pass(format!("{} mode ok: {:04o}", path.display(), mode));
        }
    }
}

fn check_store(t: &mut Tally, database: &Path) {
    let store = match Store::open_read_only(database) {
        Ok(s) => s,
        Err(e) => {
            t.fail(format!("cannot open store: {}", e));
            return;
        }
    };
    match store.is_initialized() {
        Ok(true) => t.pass("store initialized"),
        Ok(false) => {
            t.fail("store not initialized (run: pw create CONFIRM)");
            return;
        }
        Err(e) => {
            t.fail(format!("cannot inspect store: {}", e));
            return;
        }
    }

    match KeyStore::load(store.conn()) {
        Ok(key) => t.pass(format!("key fingerprint: {}", key.fingerprint())),
        Err(e) => t.fail(format!("encryption key: {}", e)),
    }

    match (registry::count(store.conn()), ledger::count(store.conn())) {
        (Ok(services), Ok(accounts)) => {
            t.pass(format!("{} service(s), {} account(s)", services, accounts))
        }
        (Err(e), _) | (_, Err(e)) => t.fail(format!("cannot count rows: {}", e)),
    }
}
