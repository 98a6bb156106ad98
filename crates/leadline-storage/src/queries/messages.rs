// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent message persistence.
//!
//! Every message carries a `(source, external_id)` pair with a unique
//! index behind it. Redelivered platform events land on the same row via
//! `ON CONFLICT DO UPDATE`, and the caller learns which way it went from
//! the returned [`UpsertOutcome`] so it can skip side effects on
//! duplicates.

use std::str::FromStr;

use leadline_core::EngineError;
use leadline_core::types::{Direction, MessageSource};
use rusqlite::params;

use crate::database::Database;
use crate::models::MessageRecord;

const COLUMNS: &str = "id, tenant_user_id, company_id, lead_id, source, channel_id, \
     external_id, author_id, author_name, body, direction, is_read, attachments, metadata, \
     created_at, updated_at";

fn parse_col<T: FromStr>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    let source: MessageSource = parse_col(4, row.get::<_, String>(4)?)?;
    let direction: Direction = parse_col(10, row.get::<_, String>(10)?)?;
    Ok(MessageRecord {
        id: row.get(0)?,
        tenant_user_id: row.get(1)?,
        company_id: row.get(2)?,
        lead_id: row.get(3)?,
        source,
        channel_id: row.get(5)?,
        external_id: row.get(6)?,
        author_id: row.get(7)?,
        author_name: row.get(8)?,
        body: row.get(9)?,
        direction,
        is_read: row.get(11)?,
        attachments: row.get(12)?,
        metadata: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Whether an upsert created a new row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Insert a message, or refresh the mutable fields of the existing row
/// when `(source, external_id)` has been seen before.
///
/// Runs as a single statement on the single-writer connection, so the
/// outcome check cannot race another ingestion of the same event.
pub async fn upsert(
    db: &Database,
    record: &MessageRecord,
) -> Result<(MessageRecord, UpsertOutcome), EngineError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| {
            let stored = conn.query_row(
                &format!(
                    "INSERT INTO messages (id, tenant_user_id, company_id, lead_id, source, \
                     channel_id, external_id, author_id, author_name, body, direction, is_read, \
                     attachments, metadata, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                     ON CONFLICT(source, external_id) DO UPDATE SET
                         body = excluded.body,
                         attachments = excluded.attachments,
                         metadata = COALESCE(excluded.metadata, metadata),
                         updated_at = excluded.updated_at
                     RETURNING {COLUMNS}"
                ),
                params![
                    r.id,
                    r.tenant_user_id,
                    r.company_id,
                    r.lead_id,
                    r.source.to_string(),
                    r.channel_id,
                    r.external_id,
                    r.author_id,
                    r.author_name,
                    r.body,
                    r.direction.to_string(),
                    r.is_read,
                    r.attachments,
                    r.metadata,
                    r.created_at,
                    r.updated_at,
                ],
                row_to_message,
            )?;
            // The candidate id only survives when the insert arm ran.
            let outcome = if stored.id == r.id {
                UpsertOutcome::Inserted
            } else {
                UpsertOutcome::Updated
            };
            Ok((stored, outcome))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All messages for a lead in chronological order, company-scoped.
pub async fn list_for_lead(
    db: &Database,
    lead_id: &str,
    company_id: &str,
    limit: Option<i64>,
) -> Result<Vec<MessageRecord>, EngineError> {
    let lead_id = lead_id.to_string();
    let company_id = company_id.to_string();
    let limit = limit.unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE lead_id = ?1 AND company_id = ?2
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![lead_id, company_id, limit], row_to_message)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark all unread incoming messages for a lead as read. Returns how
/// many rows changed.
pub async fn mark_read(
    db: &Database,
    lead_id: &str,
    company_id: &str,
) -> Result<usize, EngineError> {
    let lead_id = lead_id.to_string();
    let company_id = company_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE lead_id = ?1 AND company_id = ?2
                   AND direction = 'incoming' AND is_read = 0",
                params![lead_id, company_id],
            )?;
            Ok(changed)
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

    fn make_record(external_id: &str, body: &str) -> MessageRecord {
        let ts = now_ts();
        MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_user_id: "u1".to_string(),
            company_id: "co-1".to_string(),
            lead_id: "lead-1".to_string(),
            source: MessageSource::Chat,
            channel_id: "chan-1".to_string(),
            external_id: external_id.to_string(),
            author_id: Some("acct-1".to_string()),
            author_name: Some("Prospect".to_string()),
            body: body.to_string(),
            direction: Direction::Incoming,
            is_read: false,
            attachments: "[]".to_string(),
            metadata: None,
            created_at: ts.clone(),
            updated_at: ts,
        }
    }

    #[tokio::test]
    async fn redelivered_event_lands_on_the_same_row() {
        let (db, _dir) = open_db().await;
        let original = make_record("msg-1", "hello");
        let (stored, outcome) = upsert(&db, &original).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(stored.id, original.id);

        // Same platform event again, new candidate row id, edited body.
        let mut redelivery = make_record("msg-1", "hello (edited)");
        redelivery.updated_at = "2026-06-01T00:00:00.000Z".to_string();
        let (stored, outcome) = upsert(&db, &redelivery).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.body, "hello (edited)");
        assert_eq!(stored.created_at, original.created_at);
        assert_eq!(stored.updated_at, "2026-06-01T00:00:00.000Z");

        let all = list_for_lead(&db, "lead-1", "co-1", None).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn same_external_id_different_source_is_a_new_row() {
        let (db, _dir) = open_db().await;
        upsert(&db, &make_record("msg-1", "from chat")).await.unwrap();

        let mut commerce = make_record("msg-1", "from commerce");
        commerce.source = MessageSource::Commerce;
        let (_, outcome) = upsert(&db, &commerce).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let all = list_for_lead(&db, "lead-1", "co-1", None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn list_is_chronological_and_company_scoped() {
        let (db, _dir) = open_db().await;
        let mut first = make_record("msg-1", "first");
        first.created_at = "2026-01-01T00:00:00.000Z".to_string();
        let mut second = make_record("msg-2", "second");
        second.created_at = "2026-01-02T00:00:00.000Z".to_string();
        upsert(&db, &second).await.unwrap();
        upsert(&db, &first).await.unwrap();

        let all = list_for_lead(&db, "lead-1", "co-1", None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].body, "first");
        assert_eq!(all[1].body, "second");

        assert!(list_for_lead(&db, "lead-1", "co-2", None).await.unwrap().is_empty());

        let limited = list_for_lead(&db, "lead-1", "co-1", Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn mark_read_only_touches_unread_incoming() {
        let (db, _dir) = open_db().await;
        upsert(&db, &make_record("msg-1", "incoming")).await.unwrap();
        let mut outgoing = make_record("msg-2", "outgoing");
        outgoing.direction = Direction::Outgoing;
        outgoing.is_read = true;
        upsert(&db, &outgoing).await.unwrap();

        assert_eq!(mark_read(&db, "lead-1", "co-1").await.unwrap(), 1);
        assert_eq!(mark_read(&db, "lead-1", "co-1").await.unwrap(), 0);

        let all = list_for_lead(&db, "lead-1", "co-1", None).await.unwrap();
        assert!(all.iter().all(|m| m.is_read));
    }
}
