use crate::cli::{prompt, CliContext, RemoveArgs, UpdateArgs};
use crate::core::registry;
use crate::models::service::{ListingRow, Service};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
use dialoguer::Input;

#[derive(Args, Debug)]
pub struct DefineArgs {
    /// Service name
    #[arg(value_parser = prompt::parse_token)]
    pub name: String,

    /// Optional shorthand for the service
    #[arg(value_parser = prompt::parse_token)]
    pub shorthand: Option<String>,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Sort by service name
    #[arg(short = 'a', long = "alpha")]
    pub alpha: bool,

    /// One row per account, with its username
    #[arg(short = 'u', long = "users")]
    pub users: bool,

    /// Output format: table|json (default from pwvault.toml)
    #[arg(long, value_parser = ["table", "json"])]
    pub format: Option<String>,
}

pub fn run_define(ctx: &CliContext, args: DefineArgs) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    let service = engine.define_service(&args.name, args.shorthand.as_deref())?;
    println!("Defined {}", service.label());
    Ok(())
}

pub fn run_update(ctx: &CliContext, args: UpdateArgs) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    engine.store().require_initialized()?;
    let current = registry::resolve(engine.store().conn(), &args.target)?
        .ok_or_else(|| anyhow!("service '{}' not found", args.target))?;

    let (name, shorthand) = if args.name.is_none() && args.shorthand.is_none() {
        if ctx.non_interactive {
            bail!("nothing to update: pass --name and/or --shorthand");
        }
        let name: String = Input::new()
            .with_prompt("New service name")
            .default(current.name.clone())
            .interact_text()
            .context("read service name")?;
        let name = prompt::parse_token(&name).map_err(|e| anyhow!(e))?;
        let shorthand_prompt = match &current.shorthand {
            Some(short) => format!("New shorthand (currently '{}', empty for none)", short),
            None => "New shorthand (empty for none)".to_string(),
        };
        let shorthand: String = Input::new()
            .with_prompt(shorthand_prompt)
            .allow_empty(true)
            .interact_text()
            .context("read shorthand")?;
        merge_service_update(&current, Some(name), Some(shorthand))
    } else {
        merge_service_update(&current, args.name, args.shorthand)
    };

    let updated = engine.update_service(&current.name, &name, shorthand.as_deref())?;
    println!("Updated {} -> {}", current.label(), updated.label());
    Ok(())
}

/// New name and shorthand for `update -s`. A field left out keeps its
/// current value; an empty or blank shorthand clears it.
fn merge_service_update(
    current: &Service,
    name: Option<String>,
    shorthand: Option<String>,
) -> (String, Option<String>) {
    let name = name.unwrap_or_else(|| current.name.clone());
    let shorthand = match shorthand {
        Some(s) if s.trim().is_empty() => None,
        Some(s) => Some(s.trim().to_lowercase()),
        None => current.shorthand.clone(),
    };
    (name, shorthand)
}

pub fn run_remove(ctx: &CliContext, args: RemoveArgs) -> Result<()> {
    let target = prompt::parse_token(&args.target).map_err(|e| anyhow!(e))?;
    let mut engine = ctx.open_engine()?;
    engine.store().require_initialized()?;
    let service = registry::resolve(engine.store().conn(), &target)?
        .ok_or_else(|| anyhow!("service '{}' not found", target))?;

    if !prompt::confirm(
        ctx,
        args.yes,
        &format!("remove service '{}' and all of its accounts", service.name),
    )? {
        println!("Aborted.");
        return Ok(());
    }

    let removed = engine.remove_service(&service.name)?;
    println!("Removed {} ({} account(s))", service.label(), removed);
    Ok(())
}

pub fn run_ls(ctx: &CliContext, args: LsArgs) -> Result<()> {
    let engine = ctx.open_engine()?;
    let sort = args.alpha || ctx.config.display.sort_alphabetically;
    let rows = engine.list_services(sort, args.users)?;
    let format = args
        .format
        .unwrap_or_else(|| ctx.config.display.format.clone());

    if format == "json" {
        let json = serde_json::to_string_pretty(&rows).context("serialize listing")?;
        println!("{}", json);
        return Ok(());
    }

    if rows.is_empty() {
        if args.users {
            println!("No accounts stored");
        } else {
            println!("No services defined");
        }
        return Ok(());
    }

    println!("{}", render_table(rows, args.users));
    Ok(())
}

fn render_table(rows: Vec<ListingRow>, with_users: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    let mut header = vec![
        Cell::new("Service").add_attribute(Attribute::Bold),
        Cell::new("Shorthand").add_attribute(Attribute::Bold),
    ];
    if with_users {
        header.push(Cell::new("Account").add_attribute(Attribute::Bold));
    }
    header.push(Cell::new("Created").add_attribute(Attribute::Bold));
    table.set_header(header);

    for row in rows {
        let mut cells = vec![row.service, row.shorthand.unwrap_or_else(|| "-".to_string())];
        if with_users {
            cells.push(row.username.unwrap_or_else(|| "-".to_string()));
        }
        cells.push(
            row.created_at
                .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
        table.add_row(cells);
    }
    table
}
