// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant user mirror operations.
//!
//! Rows are mirrored from the upstream identity layer on each
//! authenticated request; the engine reads them for orphan checks and
//! the DM auto-repair fallback.

use leadline_core::EngineError;
use rusqlite::params;

use crate::database::Database;
use crate::models::TenantUser;

fn row_to_tenant_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<TenantUser> {
    Ok(TenantUser {
        id: row.get(0)?,
        company_id: row.get(1)?,
        display_name: row.get(2)?,
        last_active_at: row.get(3)?,
    })
}

/// Record (or refresh) a tenant user, bumping `last_active_at`.
pub async fn touch(db: &Database, user: &TenantUser) -> Result<(), EngineError> {
    let u = user.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tenant_users (id, company_id, display_name, last_active_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     company_id = excluded.company_id,
                     display_name = COALESCE(excluded.display_name, display_name),
                     last_active_at = excluded.last_active_at",
                params![u.id, u.company_id, u.display_name, u.last_active_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Whether the given tenant user id is known.
pub async fn exists(db: &Database, id: &str) -> Result<bool, EngineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tenant_users WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The tenant user with the most recent activity, across all companies.
pub async fn most_recently_active(db: &Database) -> Result<Option<TenantUser>, EngineError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, company_id, display_name, last_active_at
                 FROM tenant_users
                 ORDER BY last_active_at DESC LIMIT 1",
            )?;
            let result = stmt.query_row([], row_to_tenant_user);
            match result {
                Ok(u) => Ok(Some(u)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}
