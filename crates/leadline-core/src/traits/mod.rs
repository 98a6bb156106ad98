// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Port trait definitions at the engine's seams.
//!
//! All ports use `#[async_trait]` for dynamic dispatch compatibility.

pub mod chat;
pub mod commerce;
pub mod notify;

pub use chat::ChatPort;
pub use commerce::CommerceFeed;
pub use notify::Notifier;
