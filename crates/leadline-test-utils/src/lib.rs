// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Leadline integration tests.
//!
//! Provides in-memory port implementations for fast, deterministic,
//! CI-runnable tests without external services:
//!
//! - [`MockChatPort`] - scripted chat platform with call capture
//! - [`MockCommerceFeed`] - pre-loaded commerce support feed
//! - [`RecordingNotifier`] - captures published notifications

pub mod mock_chat;
pub mod mock_feed;
pub mod recording_notifier;

pub use mock_chat::MockChatPort;
pub use mock_feed::MockCommerceFeed;
pub use recording_notifier::RecordingNotifier;
