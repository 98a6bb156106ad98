// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead table operations.
//!
//! Uniqueness is per company: `(company_id, account_id)` and
//! `(company_id, commerce_member_id)` each carry a partial unique index,
//! so two companies can track the same external account as separate
//! leads while one company never ends up with duplicates.

use leadline_core::EngineError;
use leadline_core::types::MessageSource;
use rusqlite::params;

use crate::database::Database;
use crate::models::Lead;

const COLUMNS: &str = "id, company_id, tenant_user_id, account_id, account_name, thread_id, \
     invite_sent, joined_thread, commerce_member_id, commerce_channel_id, status, \
     channel_kind, last_chat_message_at, last_commerce_message_at, created_at";

fn row_to_lead(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        company_id: row.get(1)?,
        tenant_user_id: row.get(2)?,
        account_id: row.get(3)?,
        account_name: row.get(4)?,
        thread_id: row.get(5)?,
        invite_sent: row.get(6)?,
        joined_thread: row.get(7)?,
        commerce_member_id: row.get(8)?,
        commerce_channel_id: row.get(9)?,
        status: row.get(10)?,
        channel_kind: row.get(11)?,
        last_chat_message_at: row.get(12)?,
        last_commerce_message_at: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Insert a lead, or fetch the existing one if a concurrent insert won
/// the per-company uniqueness race. Returns the stored lead and whether
/// this call created it.
pub async fn insert_or_fetch(db: &Database, lead: &Lead) -> Result<(Lead, bool), EngineError> {
    let l = lead.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO leads (id, company_id, tenant_user_id, account_id, account_name, \
                 thread_id, invite_sent, joined_thread, commerce_member_id, commerce_channel_id, \
                 status, channel_kind, last_chat_message_at, last_commerce_message_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    l.id,
                    l.company_id,
                    l.tenant_user_id,
                    l.account_id,
                    l.account_name,
                    l.thread_id,
                    l.invite_sent,
                    l.joined_thread,
                    l.commerce_member_id,
                    l.commerce_channel_id,
                    l.status,
                    l.channel_kind,
                    l.last_chat_message_at,
                    l.last_commerce_message_at,
                    l.created_at,
                ],
            );
            match inserted {
                Ok(_) => Ok((l.clone(), true)),
                Err(e) if is_constraint_violation(&e) => {
                    // Another writer created this lead first; adopt its row.
                    let existing = match (&l.account_id, &l.commerce_member_id) {
                        (Some(account), _) => conn.query_row(
                            &format!(
                                "SELECT {COLUMNS} FROM leads
                                 WHERE company_id = ?1 AND account_id = ?2"
                            ),
                            params![l.company_id, account],
                            row_to_lead,
                        )?,
                        (None, Some(member)) => conn.query_row(
                            &format!(
                                "SELECT {COLUMNS} FROM leads
                                 WHERE company_id = ?1 AND commerce_member_id = ?2"
                            ),
                            params![l.company_id, member],
                            row_to_lead,
                        )?,
                        (None, None) => return Err(e.into()),
                    };
                    Ok((existing, false))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look up a lead by id.
pub async fn get(db: &Database, lead_id: &str) -> Result<Option<Lead>, EngineError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {COLUMNS} FROM leads WHERE id = ?1"),
                params![lead_id],
                row_to_lead,
            );
            match result {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look up a lead by id, scoped to a company. API paths use this so one
/// tenant can never address another tenant's leads.
pub async fn get_scoped(
    db: &Database,
    lead_id: &str,
    company_id: &str,
) -> Result<Option<Lead>, EngineError> {
    let lead_id = lead_id.to_string();
    let company_id = company_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {COLUMNS} FROM leads WHERE id = ?1 AND company_id = ?2"),
                params![lead_id, company_id],
                row_to_lead,
            );
            match result {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a company's lead for an external chat account.
pub async fn find_by_account(
    db: &Database,
    company_id: &str,
    account_id: &str,
) -> Result<Option<Lead>, EngineError> {
    let company_id = company_id.to_string();
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM leads
                     WHERE company_id = ?1 AND account_id = ?2"
                ),
                params![company_id, account_id],
                row_to_lead,
            );
            match result {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a company's lead for a commerce platform member.
pub async fn find_by_commerce_member(
    db: &Database,
    company_id: &str,
    member_id: &str,
) -> Result<Option<Lead>, EngineError> {
    let company_id = company_id.to_string();
    let member_id = member_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM leads
                     WHERE company_id = ?1 AND commerce_member_id = ?2"
                ),
                params![company_id, member_id],
                row_to_lead,
            );
            match result {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Bind a lead to its private thread.
pub async fn set_thread(
    db: &Database,
    lead_id: &str,
    thread_id: &str,
    channel_kind: &str,
) -> Result<(), EngineError> {
    let lead_id = lead_id.to_string();
    let thread_id = thread_id.to_string();
    let channel_kind = channel_kind.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE leads SET thread_id = ?2, channel_kind = ?3 WHERE id = ?1",
                params![lead_id, thread_id, channel_kind],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record that the thread invite went out to the prospect.
pub async fn mark_invited(db: &Database, lead_id: &str) -> Result<(), EngineError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE leads SET invite_sent = 1 WHERE id = ?1",
                params![lead_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record that the prospect joined their thread.
pub async fn mark_joined(db: &Database, lead_id: &str) -> Result<(), EngineError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE leads SET joined_thread = 1 WHERE id = ?1",
                params![lead_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update the per-source last-message timestamp.
pub async fn touch_last_message(
    db: &Database,
    lead_id: &str,
    source: MessageSource,
    ts: &str,
) -> Result<(), EngineError> {
    let lead_id = lead_id.to_string();
    let ts = ts.to_string();
    let sql = match source {
        MessageSource::Chat => "UPDATE leads SET last_chat_message_at = ?2 WHERE id = ?1",
        MessageSource::Commerce => {
            "UPDATE leads SET last_commerce_message_at = ?2 WHERE id = ?1"
        }
    };
    db.connection()
        .call(move |conn| {
            conn.execute(sql, params![lead_id, ts])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Leads with a commerce support channel bound, for the poller sweep.
pub async fn with_commerce_channel(db: &Database) -> Result<Vec<Lead>, EngineError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM leads
                 WHERE commerce_channel_id IS NOT NULL
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map([], row_to_lead)?;
            let mut leads = Vec::new();
            for row in rows {
                leads.push(row?);
            }
            Ok(leads)
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

    fn make_lead(company: &str, account: Option<&str>, member: Option<&str>) -> Lead {
        Lead {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: company.to_string(),
            tenant_user_id: "u1".to_string(),
            account_id: account.map(str::to_string),
            account_name: account.map(|a| format!("name {a}")),
            thread_id: None,
            invite_sent: false,
            joined_thread: false,
            commerce_member_id: member.map(str::to_string),
            commerce_channel_id: None,
            status: "new".to_string(),
            channel_kind: "thread".to_string(),
            last_chat_message_at: None,
            last_commerce_message_at: None,
            created_at: now_ts(),
        }
    }

    #[tokio::test]
    async fn duplicate_account_insert_returns_winner() {
        let (db, _dir) = open_db().await;
        let first = make_lead("co-1", Some("acct-9"), None);
        let (stored, created) = insert_or_fetch(&db, &first).await.unwrap();
        assert!(created);
        assert_eq!(stored.id, first.id);

        let duplicate = make_lead("co-1", Some("acct-9"), None);
        let (adopted, created) = insert_or_fetch(&db, &duplicate).await.unwrap();
        assert!(!created);
        assert_eq!(adopted.id, first.id);
    }

    #[tokio::test]
    async fn same_account_different_companies_are_distinct_leads() {
        let (db, _dir) = open_db().await;
        let (_, a) = insert_or_fetch(&db, &make_lead("co-1", Some("acct-9"), None))
            .await
            .unwrap();
        let (_, b) = insert_or_fetch(&db, &make_lead("co-2", Some("acct-9"), None))
            .await
            .unwrap();
        assert!(a && b);

        let one = find_by_account(&db, "co-1", "acct-9").await.unwrap().unwrap();
        let two = find_by_account(&db, "co-2", "acct-9").await.unwrap().unwrap();
        assert_ne!(one.id, two.id);
    }

    #[tokio::test]
    async fn duplicate_commerce_member_insert_returns_winner() {
        let (db, _dir) = open_db().await;
        let first = make_lead("co-1", None, Some("mem-1"));
        insert_or_fetch(&db, &first).await.unwrap();

        let (adopted, created) = insert_or_fetch(&db, &make_lead("co-1", None, Some("mem-1")))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(adopted.id, first.id);

        let found = find_by_commerce_member(&db, "co-1", "mem-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn thread_binding_and_progress_flags() {
        let (db, _dir) = open_db().await;
        let lead = make_lead("co-1", Some("acct-1"), None);
        insert_or_fetch(&db, &lead).await.unwrap();

        set_thread(&db, &lead.id, "thread-7", "thread").await.unwrap();
        mark_invited(&db, &lead.id).await.unwrap();
        mark_joined(&db, &lead.id).await.unwrap();

        let stored = get(&db, &lead.id).await.unwrap().unwrap();
        assert_eq!(stored.thread_id.as_deref(), Some("thread-7"));
        assert!(stored.invite_sent);
        assert!(stored.joined_thread);
    }

    #[tokio::test]
    async fn get_scoped_enforces_company_boundary() {
        let (db, _dir) = open_db().await;
        let lead = make_lead("co-1", Some("acct-1"), None);
        insert_or_fetch(&db, &lead).await.unwrap();

        assert!(get_scoped(&db, &lead.id, "co-1").await.unwrap().is_some());
        assert!(get_scoped(&db, &lead.id, "co-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_last_message_updates_the_right_column() {
        let (db, _dir) = open_db().await;
        let lead = make_lead("co-1", Some("acct-1"), None);
        insert_or_fetch(&db, &lead).await.unwrap();

        touch_last_message(&db, &lead.id, MessageSource::Chat, "2026-01-01T00:00:00.000Z")
            .await
            .unwrap();
        let stored = get(&db, &lead.id).await.unwrap().unwrap();
        assert_eq!(
            stored.last_chat_message_at.as_deref(),
            Some("2026-01-01T00:00:00.000Z")
        );
        assert!(stored.last_commerce_message_at.is_none());
    }

    #[tokio::test]
    async fn poller_sweep_only_sees_bound_leads() {
        let (db, _dir) = open_db().await;
        insert_or_fetch(&db, &make_lead("co-1", Some("acct-1"), None))
            .await
            .unwrap();
        let mut bound = make_lead("co-1", None, Some("mem-1"));
        bound.commerce_channel_id = Some("feed-1".to_string());
        insert_or_fetch(&db, &bound).await.unwrap();

        let swept = with_commerce_channel(&db).await.unwrap();
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, bound.id);
    }
}
