use crate::cli::{prompt, CliContext, RemoveArgs, UpdateArgs};
use crate::core::registry;
use crate::util::clipboard;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use dialoguer::Input;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Service name or shorthand
    #[arg(value_parser = prompt::parse_token)]
    pub service: String,

    /// Account username (prompted when omitted)
    #[arg(long)]
    pub username: Option<String>,

    /// Read the password from stdin instead of an interactive prompt
    #[arg(long)]
    pub from_stdin: bool,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Service name or shorthand
    #[arg(value_parser = prompt::parse_token)]
    pub service: String,

    /// Account number when the service has several (1-based)
    #[arg(long = "account", value_name = "N", value_parser = prompt::parse_selector_arg)]
    pub selector: Option<usize>,

    /// Print the password to stdout instead of copying it
    #[arg(long)]
    pub stdout: bool,
}

pub fn run_add(ctx: &CliContext, args: AddArgs) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    engine.store().require_initialized()?;
    let service = registry::resolve(engine.store().conn(), &args.service)?
        .ok_or_else(|| anyhow!("service '{}' not found", args.service))?;

    let username = prompt::read_username(ctx, args.username, &format!("Username for {}", service.name))?;
    let password = prompt::read_password(ctx, args.from_stdin, &format!("Password for {}@{}", username, service.name))?;

    let added = engine.add_account(&service.name, &username, &password)?;
    println!(
        "Added account {} to {} (#{})",
        added.username, added.service, added.index
    );
    Ok(())
}

pub fn run_get(ctx: &CliContext, args: GetArgs) -> Result<()> {
    let engine = ctx.open_engine()?;
    let retrieved = match prompt::with_account_choice(ctx, args.selector, |sel| {
        engine.get_password(&args.service, sel)
    })? {
        Some(r) => r,
        None => return Ok(()),
    };

    if args.stdout {
        println!("{}", retrieved.password.as_str());
        return Ok(());
    }

    let tool = clipboard::copy(&retrieved.password, &ctx.config.clipboard.command)
        .context("copy password to clipboard")?;
    tracing::debug!(tool = %tool, "password handed to clipboard");
    println!(
        "Password copied to clipboard. (username: {})",
        retrieved.account.username
    );
    Ok(())
}

pub fn run_update(ctx: &CliContext, args: UpdateArgs) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    let selected = match prompt::with_account_choice(ctx, args.selector, |sel| {
        engine.select_account(&args.target, sel)
    })? {
        Some(a) => a,
        None => return Ok(()),
    };

    let username = match args.username {
        Some(u) => prompt::read_username(ctx, Some(u), "")?,
        None if ctx.non_interactive => selected.username.clone(),
        None => {
            let entered: String = Input::new()
                .with_prompt("New username")
                .default(selected.username.clone())
                .interact_text()
                .context("read username from prompt")?;
            prompt::read_username(ctx, Some(entered), "")?
        }
    };
    let password = prompt::read_password(
        ctx,
        args.from_stdin,
        &format!("New password for {}@{}", username, selected.service),
    )?;

    let updated = engine.update_account(
        &selected.service,
        Some(selected.index),
        &username,
        &password,
    )?;
    println!(
        "Updated account #{} of {} ({} -> {})",
        updated.index, updated.service, selected.username, updated.username
    );
    Ok(())
}

pub fn run_remove(ctx: &CliContext, args: RemoveArgs) -> Result<()> {
    let target = prompt::parse_token(&args.target).map_err(|e| anyhow!(e))?;
    let mut engine = ctx.open_engine()?;
    let selected = match prompt::with_account_choice(ctx, args.selector, |sel| {
        engine.select_account(&target, sel)
    })? {
        Some(a) => a,
        None => return Ok(()),
    };

    if !prompt::confirm(
        ctx,
        args.yes,
        &format!("remove account '{}' from {}", selected.username, selected.service),
    )? {
        println!("Aborted.");
        return Ok(());
    }

    let removed = engine.remove_account(&selected.service, Some(selected.index))?;
    println!("Removed account {} from {}", removed.username, removed.service);
    Ok(())
}

pub fn run_clear(ctx: &CliContext) -> Result<()> {
    clipboard::clear(&ctx.config.clipboard.command).context("clear clipboard")?;
    println!("Clipboard cleared.");
    Ok(())
}
