//! Argument parsers and interactive prompts shared by the command handlers.

use crate::cli::CliContext;
use crate::constants;
use crate::core::{engine, VaultError};
use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Input, Password, Select};
use std::io::Read;
use zeroize::Zeroizing;

/// Service names and shorthands are case-insensitive; store them lowercased.
pub fn parse_token(s: &str) -> Result<String, String> {
    let token = s.trim();
    if token.is_empty() {
        return Err("name cannot be empty".into());
    }
    if token.chars().any(char::is_whitespace) {
        return Err("name cannot contain whitespace".into());
    }
    Ok(token.to_lowercase())
}

pub fn parse_selector_arg(s: &str) -> Result<usize, String> {
    engine::parse_selector(s).map_err(|e| e.to_string())
}

/// Destructive verbs need the literal confirmation token (any case).
pub fn parse_confirm(s: &str) -> Result<String, String> {
    if s.eq_ignore_ascii_case(constants::CONFIRM_TOKEN) {
        Ok(constants::CONFIRM_TOKEN.to_string())
    } else {
        Err(format!("type {} to proceed", constants::CONFIRM_TOKEN))
    }
}

pub fn read_username(ctx: &CliContext, given: Option<String>, prompt: &str) -> Result<String> {
    let username = match given {
        Some(u) => u,
        None => {
            if ctx.non_interactive {
                bail!("--username is required in non-interactive mode");
            }
            Input::<String>::new()
                .with_prompt(prompt)
                .interact_text()
                .context("read username from prompt")?
        }
    };
    let username = username.trim().to_string();
    if username.is_empty() {
        bail!("username is empty");
    }
    Ok(username)
}

pub fn read_password(ctx: &CliContext, from_stdin: bool, prompt: &str) -> Result<Zeroizing<String>> {
    if ctx.non_interactive && !from_stdin {
        bail!("--from-stdin is required in non-interactive mode");
    }
    let password = if from_stdin {
        let mut buf = Zeroizing::new(String::new());
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read password from stdin")?;
        Zeroizing::new(buf.trim_end_matches(['\r', '\n']).to_string())
    } else {
        Zeroizing::new(
            Password::new()
                .with_prompt(prompt)
                .allow_empty_password(false)
                .interact()
                .context("read password from prompt")?,
        )
    };
    if password.is_empty() {
        bail!("password is empty");
    }
    if password.len() > constants::MAX_PASSWORD_SIZE {
        bail!(
            "password exceeds maximum size ({} bytes, max {} bytes)",
            password.len(),
            constants::MAX_PASSWORD_SIZE
        );
    }
    Ok(password)
}

/// Ask before a destructive step. `--yes` skips the prompt and is required
/// when prompting is disabled.
pub fn confirm(ctx: &CliContext, yes: bool, message: &str) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if ctx.non_interactive {
        bail!("refusing to {} without --yes in non-interactive mode", message);
    }
    Confirm::new()
        .with_prompt(format!("Really {}?", message))
        .default(false)
        .interact()
        .context("read confirmation")
}

/// Run an account operation, asking which account to use when the service
/// has several and no selector was given.
///
/// Returns `Ok(None)` when the service has no accounts; that is reported,
/// not treated as a failure.
pub fn with_account_choice<T>(
    ctx: &CliContext,
    selector: Option<usize>,
    mut op: impl FnMut(Option<usize>) -> crate::core::Result<T>,
) -> Result<Option<T>> {
    match op(selector) {
        Ok(value) => Ok(Some(value)),
        Err(VaultError::NoAccounts(service)) => {
            println!("No accounts under service '{}'.", service);
            Ok(None)
        }
        Err(VaultError::AmbiguousChoice { service, candidates }) => {
            if ctx.non_interactive {
                bail!(
                    "service '{}' has {} accounts; pass --account N (1-{})",
                    service,
                    candidates.len(),
                    candidates.len()
                );
            }
            let items: Vec<String> = candidates
                .iter()
                .enumerate()
                .map(|(i, name)| format!("{}. {}", i + 1, name))
                .collect();
            let picked = Select::new()
                .with_prompt(format!("Accounts under {}", service))
                .items(&items)
                .default(0)
                .interact()
                .context("read account choice")?;
            Ok(Some(op(Some(picked + 1))?))
        }
        Err(e) => Err(e.into()),
    }
}
