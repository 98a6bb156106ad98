// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection table operations.
//!
//! At most one row exists per tenant user (`tenant_user_id` is unique);
//! reconnects refresh the row in place via upsert. Deactivation clears
//! the guild binding and credentials but keeps the row for audit history.

use leadline_core::EngineError;
use rusqlite::params;

use crate::database::Database;
use crate::models::Connection;

const COLUMNS: &str = "id, tenant_user_id, company_id, account_id, account_name, guild_id, \
     guild_name, session_token, is_active, connected_at, last_synced_at, \
     synced_members, synced_channels";

fn row_to_connection(row: &rusqlite::Row<'_>) -> rusqlite::Result<Connection> {
    Ok(Connection {
        id: row.get(0)?,
        tenant_user_id: row.get(1)?,
        company_id: row.get(2)?,
        account_id: row.get(3)?,
        account_name: row.get(4)?,
        guild_id: row.get(5)?,
        guild_name: row.get(6)?,
        session_token: row.get(7)?,
        is_active: row.get(8)?,
        connected_at: row.get(9)?,
        last_synced_at: row.get(10)?,
        synced_members: row.get(11)?,
        synced_channels: row.get(12)?,
    })
}

/// Create or refresh a tenant user's connection in one conditional write.
///
/// On conflict the original `connected_at` is preserved; everything else
/// is refreshed from the new link.
pub async fn upsert(db: &Database, connection: &Connection) -> Result<(), EngineError> {
    let c = connection.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO connections (id, tenant_user_id, company_id, account_id, \
                 account_name, guild_id, guild_name, session_token, is_active, connected_at, \
                 last_synced_at, synced_members, synced_channels)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(tenant_user_id) DO UPDATE SET
                     company_id = excluded.company_id,
                     account_id = excluded.account_id,
                     account_name = excluded.account_name,
                     guild_id = excluded.guild_id,
                     guild_name = excluded.guild_name,
                     session_token = excluded.session_token,
                     is_active = excluded.is_active,
                     last_synced_at = excluded.last_synced_at,
                     synced_members = excluded.synced_members,
                     synced_channels = excluded.synced_channels",
                params![
                    c.id,
                    c.tenant_user_id,
                    c.company_id,
                    c.account_id,
                    c.account_name,
                    c.guild_id,
                    c.guild_name,
                    c.session_token,
                    c.is_active,
                    c.connected_at,
                    c.last_synced_at,
                    c.synced_members,
                    c.synced_channels,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get the connection for a tenant user, active or not.
pub async fn get_by_tenant_user(
    db: &Database,
    tenant_user_id: &str,
) -> Result<Option<Connection>, EngineError> {
    let tenant_user_id = tenant_user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM connections WHERE tenant_user_id = ?1"
            ))?;
            let result = stmt.query_row(params![tenant_user_id], row_to_connection);
            match result {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active connection owned by the given external chat account, if any.
///
/// Used by the self-lead guard: a sender who owns a connection is a
/// tenant user, not a prospect.
pub async fn active_by_account(
    db: &Database,
    account_id: &str,
) -> Result<Option<Connection>, EngineError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM connections
                 WHERE account_id = ?1 AND is_active = 1 LIMIT 1"
            ))?;
            let result = stmt.query_row(params![account_id], row_to_connection);
            match result {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most-recently-connected active connection for a guild.
pub async fn latest_active_for_guild(
    db: &Database,
    guild_id: &str,
) -> Result<Option<Connection>, EngineError> {
    let guild_id = guild_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM connections
                 WHERE guild_id = ?1 AND is_active = 1
                 ORDER BY connected_at DESC LIMIT 1"
            ))?;
            let result = stmt.query_row(params![guild_id], row_to_connection);
            match result {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Earliest-connected active connection across all tenants.
///
/// This is the DM routing fallback; callers log every use of it.
pub async fn earliest_active(db: &Database) -> Result<Option<Connection>, EngineError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM connections
                 WHERE is_active = 1
                 ORDER BY connected_at ASC LIMIT 1"
            ))?;
            let result = stmt.query_row([], row_to_connection);
            match result {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Earliest-connected active connection for a company, optionally
/// excluding one tenant user.
///
/// Drives guild inheritance: later team members adopt the first
/// connector's guild.
pub async fn earliest_active_for_company(
    db: &Database,
    company_id: &str,
    excluding_user: Option<&str>,
) -> Result<Option<Connection>, EngineError> {
    let company_id = company_id.to_string();
    let excluding = excluding_user.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let result = match &excluding {
                Some(user) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {COLUMNS} FROM connections
                         WHERE company_id = ?1 AND is_active = 1 AND tenant_user_id != ?2
                         ORDER BY connected_at ASC LIMIT 1"
                    ))?;
                    stmt.query_row(params![company_id, user], row_to_connection)
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {COLUMNS} FROM connections
                         WHERE company_id = ?1 AND is_active = 1
                         ORDER BY connected_at ASC LIMIT 1"
                    ))?;
                    stmt.query_row(params![company_id], row_to_connection)
                }
            };
            match result {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Deactivate a tenant user's connection: clears the guild binding and
/// credentials, sets inactive, keeps the row. Returns whether a row
/// was affected.
pub async fn deactivate(db: &Database, tenant_user_id: &str) -> Result<bool, EngineError> {
    let tenant_user_id = tenant_user_id.to_string();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE connections
                 SET guild_id = NULL, guild_name = NULL, session_token = NULL, is_active = 0
                 WHERE tenant_user_id = ?1",
                params![tenant_user_id],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadline_core::types::now_ts;
    use tempfile::tempdir;

    async fn open_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_connection(tenant_user: &str, company: &str, connected_at: &str) -> Connection {
        Connection {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_user_id: tenant_user.to_string(),
            company_id: company.to_string(),
            account_id: format!("acct-{tenant_user}"),
            account_name: format!("user {tenant_user}"),
            guild_id: Some("guild-1".to_string()),
            guild_name: Some("Guild One".to_string()),
            session_token: Some("tok".to_string()),
            is_active: true,
            connected_at: connected_at.to_string(),
            last_synced_at: None,
            synced_members: 0,
            synced_channels: 0,
        }
    }

    #[tokio::test]
    async fn upsert_refreshes_existing_row() {
        let (db, _dir) = open_db().await;
        let original = make_connection("u1", "co-1", "2026-01-01T00:00:00.000Z");
        upsert(&db, &original).await.unwrap();

        let mut refreshed = make_connection("u1", "co-1", "2026-02-01T00:00:00.000Z");
        refreshed.guild_id = Some("guild-2".to_string());
        refreshed.synced_members = 42;
        upsert(&db, &refreshed).await.unwrap();

        let stored = get_by_tenant_user(&db, "u1").await.unwrap().unwrap();
        // Still one row; original id and connected_at survive the refresh.
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.connected_at, "2026-01-01T00:00:00.000Z");
        assert_eq!(stored.guild_id.as_deref(), Some("guild-2"));
        assert_eq!(stored.synced_members, 42);
    }

    #[tokio::test]
    async fn earliest_for_company_excludes_given_user() {
        let (db, _dir) = open_db().await;
        upsert(&db, &make_connection("u1", "co-1", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        upsert(&db, &make_connection("u2", "co-1", "2026-01-02T00:00:00.000Z"))
            .await
            .unwrap();

        let other = earliest_active_for_company(&db, "co-1", Some("u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(other.tenant_user_id, "u2");

        let none = earliest_active_for_company(&db, "co-2", None).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn latest_for_guild_picks_most_recent() {
        let (db, _dir) = open_db().await;
        upsert(&db, &make_connection("u1", "co-1", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        upsert(&db, &make_connection("u2", "co-1", "2026-03-01T00:00:00.000Z"))
            .await
            .unwrap();

        let conn = latest_active_for_guild(&db, "guild-1").await.unwrap().unwrap();
        assert_eq!(conn.tenant_user_id, "u2");
    }

    #[tokio::test]
    async fn deactivate_clears_guild_and_keeps_row() {
        let (db, _dir) = open_db().await;
        upsert(&db, &make_connection("u1", "co-1", &now_ts()))
            .await
            .unwrap();

        assert!(deactivate(&db, "u1").await.unwrap());

        let stored = get_by_tenant_user(&db, "u1").await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert!(stored.guild_id.is_none());
        assert!(stored.guild_name.is_none());
        assert!(stored.session_token.is_none());
        // History preserved.
        assert_eq!(stored.account_id, "acct-u1");

        assert!(earliest_active(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_by_account_ignores_inactive() {
        let (db, _dir) = open_db().await;
        upsert(&db, &make_connection("u1", "co-1", &now_ts()))
            .await
            .unwrap();
        assert!(active_by_account(&db, "acct-u1").await.unwrap().is_some());

        deactivate(&db, "u1").await.unwrap();
        assert!(active_by_account(&db, "acct-u1").await.unwrap().is_none());
    }
}
