// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead channel (thread mapping) operations.
//!
//! Two partial unique indexes enforce the invariants at the storage
//! layer: at most one active channel per lead, and at most one active
//! mapping per thread. Losers of the insert race get the winning row
//! back so they can adopt it and clean up their orphaned thread.

use leadline_core::EngineError;
use rusqlite::params;

use crate::database::Database;
use crate::models::LeadChannel;

const COLUMNS: &str = "id, tenant_user_id, company_id, lead_id, guild_id, thread_id, \
     thread_name, account_id, is_active, message_count, created_at, last_message_at, \
     archived_reason";

fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<LeadChannel> {
    Ok(LeadChannel {
        id: row.get(0)?,
        tenant_user_id: row.get(1)?,
        company_id: row.get(2)?,
        lead_id: row.get(3)?,
        guild_id: row.get(4)?,
        thread_id: row.get(5)?,
        thread_name: row.get(6)?,
        account_id: row.get(7)?,
        is_active: row.get(8)?,
        message_count: row.get(9)?,
        created_at: row.get(10)?,
        last_message_at: row.get(11)?,
        archived_reason: row.get(12)?,
    })
}

/// Result of attempting to register a freshly created thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelInsert {
    /// This call registered the active channel.
    Created(LeadChannel),
    /// A concurrent caller won; here is its row.
    Lost(LeadChannel),
}

/// The lead's active channel, if one exists.
pub async fn active_for_lead(
    db: &Database,
    lead_id: &str,
) -> Result<Option<LeadChannel>, EngineError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM lead_channels
                     WHERE lead_id = ?1 AND is_active = 1"
                ),
                params![lead_id],
                row_to_channel,
            );
            match result {
                Ok(channel) => Ok(Some(channel)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Resolve an active channel by its platform thread id.
pub async fn find_by_thread(
    db: &Database,
    thread_id: &str,
) -> Result<Option<LeadChannel>, EngineError> {
    let thread_id = thread_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM lead_channels
                     WHERE thread_id = ?1 AND is_active = 1"
                ),
                params![thread_id],
                row_to_channel,
            );
            match result {
                Ok(channel) => Ok(Some(channel)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Register an active channel for a lead.
///
/// If another writer already registered one, the unique index rejects
/// the insert and the winner's row is returned as [`ChannelInsert::Lost`].
pub async fn insert_active(
    db: &Database,
    channel: &LeadChannel,
) -> Result<ChannelInsert, EngineError> {
    let c = channel.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO lead_channels (id, tenant_user_id, company_id, lead_id, guild_id, \
                 thread_id, thread_name, account_id, is_active, message_count, created_at, \
                 last_message_at, archived_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10, ?11, NULL)",
                params![
                    c.id,
                    c.tenant_user_id,
                    c.company_id,
                    c.lead_id,
                    c.guild_id,
                    c.thread_id,
                    c.thread_name,
                    c.account_id,
                    c.message_count,
                    c.created_at,
                    c.last_message_at,
                ],
            );
            match inserted {
                Ok(_) => Ok(ChannelInsert::Created(c.clone())),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    let winner = conn.query_row(
                        &format!(
                            "SELECT {COLUMNS} FROM lead_channels
                             WHERE lead_id = ?1 AND is_active = 1"
                        ),
                        params![c.lead_id],
                        row_to_channel,
                    )?;
                    Ok(ChannelInsert::Lost(winner))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Archive the lead's active channel, recording why. The row is kept.
/// Returns the archived channel, or `None` if there was nothing active.
pub async fn archive(
    db: &Database,
    lead_id: &str,
    reason: &str,
) -> Result<Option<LeadChannel>, EngineError> {
    let lead_id = lead_id.to_string();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            let current = conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM lead_channels
                     WHERE lead_id = ?1 AND is_active = 1"
                ),
                params![lead_id],
                row_to_channel,
            );
            let mut channel = match current {
                Ok(channel) => channel,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            conn.execute(
                "UPDATE lead_channels SET is_active = 0, archived_reason = ?2 WHERE id = ?1",
                params![channel.id, reason],
            )?;
            channel.is_active = false;
            channel.archived_reason = Some(reason);
            Ok(Some(channel))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Bump the message counter and freshness stamp for a thread's active
/// mapping. No-op for unmapped threads.
pub async fn record_message(
    db: &Database,
    thread_id: &str,
    ts: &str,
) -> Result<(), EngineError> {
    let thread_id = thread_id.to_string();
    let ts = ts.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE lead_channels
                 SET message_count = message_count + 1, last_message_at = ?2
                 WHERE thread_id = ?1 AND is_active = 1",
                params![thread_id, ts],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Whether an active channel in the guild already uses this thread name.
pub async fn thread_name_taken(
    db: &Database,
    guild_id: &str,
    name: &str,
) -> Result<bool, EngineError> {
    let guild_id = guild_id.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM lead_channels
                 WHERE guild_id = ?1 AND thread_name = ?2 AND is_active = 1",
                params![guild_id, name],
                |row| row.get(0),
            )?;
            Ok(count > 0)
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

    fn make_channel(lead_id: &str, thread_id: &str, name: &str) -> LeadChannel {
        LeadChannel {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_user_id: "u1".to_string(),
            company_id: "co-1".to_string(),
            lead_id: lead_id.to_string(),
            guild_id: "guild-1".to_string(),
            thread_id: thread_id.to_string(),
            thread_name: name.to_string(),
            account_id: Some("acct-1".to_string()),
            is_active: true,
            message_count: 0,
            created_at: now_ts(),
            last_message_at: None,
            archived_reason: None,
        }
    }

    #[tokio::test]
    async fn second_active_insert_for_lead_loses() {
        let (db, _dir) = open_db().await;
        let winner = make_channel("lead-1", "thread-1", "chat-prospect");
        let outcome = insert_active(&db, &winner).await.unwrap();
        assert_eq!(outcome, ChannelInsert::Created(winner.clone()));

        let loser = make_channel("lead-1", "thread-2", "chat-prospect-2");
        match insert_active(&db, &loser).await.unwrap() {
            ChannelInsert::Lost(existing) => assert_eq!(existing.id, winner.id),
            ChannelInsert::Created(_) => panic!("duplicate active channel accepted"),
        }
    }

    #[tokio::test]
    async fn archive_then_reinsert_is_allowed() {
        let (db, _dir) = open_db().await;
        let first = make_channel("lead-1", "thread-1", "chat-prospect");
        insert_active(&db, &first).await.unwrap();

        let archived = archive(&db, "lead-1", "closed by agent").await.unwrap().unwrap();
        assert!(!archived.is_active);
        assert_eq!(archived.archived_reason.as_deref(), Some("closed by agent"));
        assert!(active_for_lead(&db, "lead-1").await.unwrap().is_none());

        // The partial index only covers active rows, so a fresh channel fits.
        let second = make_channel("lead-1", "thread-2", "chat-prospect");
        assert!(matches!(
            insert_active(&db, &second).await.unwrap(),
            ChannelInsert::Created(_)
        ));
    }

    #[tokio::test]
    async fn archive_without_active_channel_returns_none() {
        let (db, _dir) = open_db().await;
        assert!(archive(&db, "lead-1", "noop").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_message_bumps_counter() {
        let (db, _dir) = open_db().await;
        insert_active(&db, &make_channel("lead-1", "thread-1", "chat-prospect"))
            .await
            .unwrap();

        record_message(&db, "thread-1", "2026-01-01T00:00:00.000Z").await.unwrap();
        record_message(&db, "thread-1", "2026-01-02T00:00:00.000Z").await.unwrap();
        // Unknown thread: silently ignored.
        record_message(&db, "thread-9", "2026-01-03T00:00:00.000Z").await.unwrap();

        let channel = find_by_thread(&db, "thread-1").await.unwrap().unwrap();
        assert_eq!(channel.message_count, 2);
        assert_eq!(
            channel.last_message_at.as_deref(),
            Some("2026-01-02T00:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn thread_name_taken_ignores_archived_rows() {
        let (db, _dir) = open_db().await;
        insert_active(&db, &make_channel("lead-1", "thread-1", "chat-prospect"))
            .await
            .unwrap();
        assert!(thread_name_taken(&db, "guild-1", "chat-prospect").await.unwrap());
        assert!(!thread_name_taken(&db, "guild-2", "chat-prospect").await.unwrap());

        archive(&db, "lead-1", "closed").await.unwrap();
        assert!(!thread_name_taken(&db, "guild-1", "chat-prospect").await.unwrap());
    }
}
