//! Service registry: services, shorthands and the shared lookup namespace.
//!
//! Names and shorthands live in one namespace. `service_key` holds the
//! normalized union of both columns with the token as primary key, so a
//! lookup is a single indexed probe and SQLite itself rejects a token owned
//! by two services. A shorthand equal to its own service's name is stored
//! once.

use crate::core::db::{parse_timestamp, timestamp_now};
use crate::core::error::{Result, VaultError};
use crate::core::ledger;
use crate::models::service::Service;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Case-fold a service token. Empty tokens are rejected.
pub fn normalize(token: &str) -> Result<String> {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
        return Err(VaultError::InvalidName("service name cannot be empty".into()));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(VaultError::InvalidName(format!(
            "'{}' contains whitespace",
            token
        )));
    }
    Ok(token)
}

/// Normalize an optional shorthand; absent or blank means "no shorthand".
pub fn normalize_shorthand(shorthand: Option<&str>) -> Result<Option<String>> {
    match shorthand {
        Some(s) if !s.trim().is_empty() => normalize(s).map(Some),
        _ => Ok(None),
    }
}

fn service_from_row(row: &Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        name: row.get(0)?,
        shorthand: row.get(1)?,
        created_at: parse_timestamp(row.get(2)?),
    })
}

/// Find the service whose name or shorthand equals `token`.
pub fn resolve(conn: &Connection, token: &str) -> Result<Option<Service>> {
    let token = match normalize(token) {
        Ok(t) => t,
        Err(_) => return Ok(None),
    };
    let service = conn
        .query_row(
            "SELECT s.service_name, s.shorthand_name, s.created_at
             FROM service_key k
             JOIN service s ON s.service_name = k.service_name
             WHERE k.lookup_key = ?1",
            [&token],
            service_from_row,
        )
        .optional()?;
    Ok(service)
}

/// Name of the service that owns `token` as name or shorthand.
fn owner_of(conn: &Connection, token: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT service_name FROM service_key WHERE lookup_key = ?1",
            [token],
            |row| row.get(0),
        )
        .optional()?)
}

/// True iff no service uses `token` as its name or shorthand.
pub fn is_name_available(conn: &Connection, token: &str) -> Result<bool> {
    let token = normalize(token)?;
    Ok(owner_of(conn, &token)?.is_none())
}

fn insert_keys(conn: &Connection, name: &str, shorthand: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO service_key (lookup_key, service_name) VALUES (?1, ?1)",
        [name],
    )?;
    if let Some(short) = shorthand.filter(|s| *s != name) {
        conn.execute(
            "INSERT INTO service_key (lookup_key, service_name) VALUES (?1, ?2)",
            params![short, name],
        )?;
    }
    Ok(())
}

/// Create a service. Fails with `Conflict` if the name or shorthand is
/// already taken by any service.
pub fn define(conn: &Connection, name: &str, shorthand: Option<&str>) -> Result<Service> {
    let name = normalize(name)?;
    let shorthand = normalize_shorthand(shorthand)?;

    for token in std::iter::once(&name).chain(shorthand.iter()) {
        if owner_of(conn, token)?.is_some() {
            return Err(VaultError::Conflict(token.clone()));
        }
    }

    let created_at = timestamp_now();
    conn.execute(
        "INSERT INTO service (service_name, shorthand_name, created_at) VALUES (?1, ?2, ?3)",
        params![name, shorthand, created_at],
    )?;
    insert_keys(conn, &name, shorthand.as_deref())?;

    Ok(Service {
        name,
        shorthand,
        created_at: parse_timestamp(Some(created_at)),
    })
}

/// Rename a service and replace its shorthand (`None` clears it).
///
/// Only tokens owned by *another* service conflict; keeping a value, or
/// swapping name and shorthand, never does. Owned accounts follow the new
/// name. Call inside a transaction.
pub fn rename(
    conn: &Connection,
    old_name: &str,
    new_name: &str,
    new_shorthand: Option<&str>,
) -> Result<Service> {
    let current = find(conn, old_name)?
        .ok_or_else(|| VaultError::ServiceNotFound(old_name.to_string()))?;
    let new_name = normalize(new_name)?;
    let new_shorthand = normalize_shorthand(new_shorthand)?;

    for token in std::iter::once(&new_name).chain(new_shorthand.iter()) {
        if let Some(owner) = owner_of(conn, token)? {
            if owner != current.name {
                return Err(VaultError::Conflict(token.clone()));
            }
        }
    }

    conn.execute(
        "DELETE FROM service_key WHERE service_name = ?1",
        [&current.name],
    )?;
    conn.execute(
        "UPDATE service SET service_name = ?1, shorthand_name = ?2 WHERE service_name = ?3",
        params![new_name, new_shorthand, current.name],
    )?;
    let moved = ledger::reassign(conn, &current.name, &new_name)?;
    insert_keys(conn, &new_name, new_shorthand.as_deref())?;

    tracing::debug!(from = %current.name, to = %new_name, accounts = moved, "service renamed");
    Ok(Service {
        name: new_name,
        shorthand: new_shorthand,
        created_at: current.created_at,
    })
}

/// Look a service up by its canonical name only.
pub fn find(conn: &Connection, name: &str) -> Result<Option<Service>> {
    Ok(conn
        .query_row(
            "SELECT service_name, shorthand_name, created_at FROM service WHERE service_name = ?1",
            [name],
            service_from_row,
        )
        .optional()?)
}

/// Remove a service row and its lookup keys. Accounts must already be gone.
pub fn delete(conn: &Connection, name: &str) -> Result<()> {
    conn.execute("DELETE FROM service_key WHERE service_name = ?1", [name])?;
    let removed = conn.execute("DELETE FROM service WHERE service_name = ?1", [name])?;
    if removed == 0 {
        return Err(VaultError::ServiceNotFound(name.to_string()));
    }
    Ok(())
}

/// All services, in definition order or by name.
pub fn list(conn: &Connection, sort_alphabetically: bool) -> Result<Vec<Service>> {
    let sql = if sort_alphabetically {
        "SELECT service_name, shorthand_name, created_at FROM service ORDER BY service_name"
    } else {
        "SELECT service_name, shorthand_name, created_at FROM service ORDER BY rowid"
    };
    let mut stmt = conn.prepare(sql)?;
    let services = stmt
        .query_map([], service_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(services)
}

pub fn count(conn: &Connection) -> Result<usize> {
    Ok(conn.query_row("SELECT count(*) FROM service", [], |row| row.get::<_, usize>(0))?)
}
