// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat platform for deterministic testing.
//!
//! `MockChatPort` implements `ChatPort` entirely in memory: guild
//! membership is scripted, thread/message ids are sequential, and every
//! platform call is captured for assertion. Failure modes (blocked DMs,
//! unknown accounts, deadline overruns) are injectable per account id.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use leadline_core::EngineError;
use leadline_core::traits::ChatPort;
use leadline_core::types::{GuildCounts, GuildInfo, SessionStatus};

/// A captured outbound channel send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentToChannel {
    pub channel_id: String,
    pub body: String,
    pub message_id: String,
}

/// A captured outbound direct message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDirect {
    pub account_id: String,
    pub dm_channel_id: String,
    pub body: String,
    pub message_id: String,
}

/// In-memory scripted chat platform.
pub struct MockChatPort {
    status: Mutex<SessionStatus>,
    guilds: Mutex<Vec<GuildInfo>>,
    intake_channels: Mutex<HashMap<(String, String), String>>,
    created_threads: Mutex<Vec<(String, String, String)>>,
    thread_members: Mutex<Vec<(String, String)>>,
    archived_threads: Mutex<Vec<String>>,
    channel_sends: Mutex<Vec<SentToChannel>>,
    direct_sends: Mutex<Vec<SentDirect>>,
    blocked_dm_accounts: Mutex<HashSet<String>>,
    unknown_accounts: Mutex<HashSet<String>>,
    timed_out_accounts: Mutex<HashSet<String>>,
    next_id: AtomicU64,
}

impl MockChatPort {
    /// A connected mock that belongs to the given guilds.
    pub fn connected(guilds: &[(&str, &str)]) -> Self {
        Self {
            status: Mutex::new(SessionStatus::Connected),
            guilds: Mutex::new(
                guilds
                    .iter()
                    .map(|(id, name)| GuildInfo {
                        id: id.to_string(),
                        name: name.to_string(),
                    })
                    .collect(),
            ),
            intake_channels: Mutex::new(HashMap::new()),
            created_threads: Mutex::new(Vec::new()),
            thread_members: Mutex::new(Vec::new()),
            archived_threads: Mutex::new(Vec::new()),
            channel_sends: Mutex::new(Vec::new()),
            direct_sends: Mutex::new(Vec::new()),
            blocked_dm_accounts: Mutex::new(HashSet::new()),
            unknown_accounts: Mutex::new(HashSet::new()),
            timed_out_accounts: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_status(&self, status: SessionStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Remove the bot from a guild, so access checks start failing.
    pub fn leave_guild(&self, guild_id: &str) {
        self.guilds.lock().unwrap().retain(|g| g.id != guild_id);
    }

    /// Make DMs to this account fail with `DeliveryBlocked`.
    pub fn block_dms(&self, account_id: &str) {
        self.blocked_dm_accounts
            .lock()
            .unwrap()
            .insert(account_id.to_string());
    }

    /// Make any call addressing this account fail with `AccountNotFound`.
    pub fn forget_account(&self, account_id: &str) {
        self.unknown_accounts
            .lock()
            .unwrap()
            .insert(account_id.to_string());
    }

    /// Make sends addressing this account exceed their deadline.
    pub fn time_out_account(&self, account_id: &str) {
        self.timed_out_accounts
            .lock()
            .unwrap()
            .insert(account_id.to_string());
    }

    pub fn sent_to_channels(&self) -> Vec<SentToChannel> {
        self.channel_sends.lock().unwrap().clone()
    }

    pub fn sent_directs(&self) -> Vec<SentDirect> {
        self.direct_sends.lock().unwrap().clone()
    }

    /// `(parent_channel_id, name, thread_id)` per created thread.
    pub fn created_threads(&self) -> Vec<(String, String, String)> {
        self.created_threads.lock().unwrap().clone()
    }

    /// `(thread_id, account_id)` pairs added via `add_thread_member`.
    pub fn thread_members(&self) -> Vec<(String, String)> {
        self.thread_members.lock().unwrap().clone()
    }

    pub fn archived_threads(&self) -> Vec<String> {
        self.archived_threads.lock().unwrap().clone()
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn check_account(&self, account_id: &str) -> Result<(), EngineError> {
        if self.unknown_accounts.lock().unwrap().contains(account_id) {
            return Err(EngineError::AccountNotFound {
                account_id: account_id.to_string(),
            });
        }
        if self.timed_out_accounts.lock().unwrap().contains(account_id) {
            return Err(EngineError::Timeout {
                duration: std::time::Duration::from_secs(15),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatPort for MockChatPort {
    fn status(&self) -> SessionStatus {
        *self.status.lock().unwrap()
    }

    fn invite_url(&self) -> String {
        "https://chat.test/invite".to_string()
    }

    async fn bot_account_id(&self) -> Result<String, EngineError> {
        Ok("bot-account".to_string())
    }

    async fn has_guild_access(&self, guild_id: &str) -> Result<bool, EngineError> {
        Ok(self.guilds.lock().unwrap().iter().any(|g| g.id == guild_id))
    }

    async fn accessible_guilds(&self) -> Result<Vec<GuildInfo>, EngineError> {
        Ok(self.guilds.lock().unwrap().clone())
    }

    async fn guild_counts(&self, _guild_id: &str) -> Result<GuildCounts, EngineError> {
        Ok(GuildCounts {
            members: 10,
            channels: 3,
        })
    }

    async fn find_or_create_intake_channel(
        &self,
        guild_id: &str,
        name: &str,
    ) -> Result<String, EngineError> {
        let key = (guild_id.to_string(), name.to_string());
        let mut channels = self.intake_channels.lock().unwrap();
        if let Some(id) = channels.get(&key) {
            return Ok(id.clone());
        }
        let id = self.next("intake");
        channels.insert(key, id.clone());
        Ok(id)
    }

    async fn create_private_thread(
        &self,
        channel_id: &str,
        name: &str,
    ) -> Result<String, EngineError> {
        let id = self.next("thread");
        self.created_threads.lock().unwrap().push((
            channel_id.to_string(),
            name.to_string(),
            id.clone(),
        ));
        Ok(id)
    }

    async fn add_thread_member(
        &self,
        thread_id: &str,
        account_id: &str,
    ) -> Result<(), EngineError> {
        self.check_account(account_id)?;
        self.thread_members
            .lock()
            .unwrap()
            .push((thread_id.to_string(), account_id.to_string()));
        Ok(())
    }

    async fn archive_thread(&self, thread_id: &str) -> Result<(), EngineError> {
        self.archived_threads
            .lock()
            .unwrap()
            .push(thread_id.to_string());
        Ok(())
    }

    async fn send_to_channel(&self, channel_id: &str, body: &str) -> Result<String, EngineError> {
        let message_id = self.next("msg");
        self.channel_sends.lock().unwrap().push(SentToChannel {
            channel_id: channel_id.to_string(),
            body: body.to_string(),
            message_id: message_id.clone(),
        });
        Ok(message_id)
    }

    async fn send_direct(
        &self,
        account_id: &str,
        body: &str,
    ) -> Result<(String, String), EngineError> {
        self.check_account(account_id)?;
        if self.blocked_dm_accounts.lock().unwrap().contains(account_id) {
            return Err(EngineError::DeliveryBlocked {
                reason: "cannot send messages to this user".to_string(),
            });
        }
        let dm_channel_id = format!("dm-{account_id}");
        let message_id = self.next("msg");
        self.direct_sends.lock().unwrap().push(SentDirect {
            account_id: account_id.to_string(),
            dm_channel_id: dm_channel_id.clone(),
            body: body.to_string(),
            message_id: message_id.clone(),
        });
        Ok((dm_channel_id, message_id))
    }
}
