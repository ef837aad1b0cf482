//! Account ledger: username + encrypted password rows owned by a service.
//!
//! Accounts reference their service by name, not by surrogate id. Row order
//! within a service is insertion order and defines the 1-based selectors the
//! engine hands out.

use crate::core::db::{parse_timestamp, timestamp_now};
use crate::core::error::{Result, VaultError};
use crate::models::account::Account;
use crate::models::service::ListingRow;
use rusqlite::{params, Connection};

fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(VaultError::InvalidName("username cannot be empty".into()));
    }
    Ok(())
}

/// Accounts of one service in insertion order. Empty when there are none.
pub fn list_for_service(conn: &Connection, service_name: &str) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(
        "SELECT account_name, account_pw, service_name, created_at
         FROM account WHERE service_name = ?1 ORDER BY rowid",
    )?;
    let accounts = stmt
        .query_map([service_name], |row| {
            Ok(Account {
                username: row.get(0)?,
                encrypted_password: row.get(1)?,
                service_name: row.get(2)?,
                created_at: parse_timestamp(row.get(3)?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(accounts)
}

pub fn exists(conn: &Connection, username: &str, service_name: &str) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT count(*) FROM account WHERE account_name = ?1 AND service_name = ?2",
        params![username, service_name],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

pub fn add(
    conn: &Connection,
    username: &str,
    encrypted_password: &[u8],
    service_name: &str,
) -> Result<()> {
    validate_username(username)?;
    if exists(conn, username, service_name)? {
        return Err(VaultError::DuplicateAccount {
            username: username.to_string(),
            service: service_name.to_string(),
        });
    }
    conn.execute(
        "INSERT INTO account (account_name, account_pw, service_name, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![username, encrypted_password, service_name, timestamp_now()],
    )?;
    Ok(())
}

/// Replace the username and password of one account of `service_name`.
/// A changed username is checked against the same service only.
pub fn update(
    conn: &Connection,
    service_name: &str,
    old_username: &str,
    new_username: &str,
    encrypted_password: &[u8],
) -> Result<()> {
    validate_username(new_username)?;
    if new_username != old_username && exists(conn, new_username, service_name)? {
        return Err(VaultError::DuplicateAccount {
            username: new_username.to_string(),
            service: service_name.to_string(),
        });
    }
    let changed = conn.execute(
        "UPDATE account SET account_name = ?1, account_pw = ?2
         WHERE account_name = ?3 AND service_name = ?4",
        params![new_username, encrypted_password, old_username, service_name],
    )?;
    if changed == 0 {
        return Err(VaultError::InvalidSelection(format!(
            "no account '{}' under '{}'",
            old_username, service_name
        )));
    }
    Ok(())
}

pub fn remove(conn: &Connection, service_name: &str, username: &str) -> Result<()> {
    let removed = conn.execute(
        "DELETE FROM account WHERE account_name = ?1 AND service_name = ?2",
        params![username, service_name],
    )?;
    if removed == 0 {
        return Err(VaultError::InvalidSelection(format!(
            "no account '{}' under '{}'",
            username, service_name
        )));
    }
    Ok(())
}

/// Delete every account of a service; returns how many went.
pub fn remove_all_for_service(conn: &Connection, service_name: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM account WHERE service_name = ?1", [service_name])?)
}

/// Point every account of `old_service` at `new_service`.
pub fn reassign(conn: &Connection, old_service: &str, new_service: &str) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE account SET service_name = ?1 WHERE service_name = ?2",
        params![new_service, old_service],
    )?)
}

/// One row per (service, account) pair. Services without accounts do not
/// appear in this view.
pub fn list_with_services(conn: &Connection, sort_alphabetically: bool) -> Result<Vec<ListingRow>> {
    let sql = if sort_alphabetically {
        "SELECT s.service_name, s.shorthand_name, a.account_name, a.created_at
         FROM service s INNER JOIN account a ON s.service_name = a.service_name
         ORDER BY s.service_name, a.rowid"
    } else {
        "SELECT s.service_name, s.shorthand_name, a.account_name, a.created_at
         FROM service s INNER JOIN account a ON s.service_name = a.service_name
         ORDER BY s.rowid, a.rowid"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ListingRow {
                service: row.get(0)?,
                shorthand: row.get(1)?,
                username: Some(row.get(2)?),
                created_at: parse_timestamp(row.get(3)?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn count(conn: &Connection) -> Result<usize> {
    Ok(conn.query_row("SELECT count(*) FROM account", [], |row| row.get::<_, usize>(0))?)
}
