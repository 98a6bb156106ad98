// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table.

pub mod channels;
pub mod connections;
pub mod leads;
pub mod messages;
pub mod tenant_users;
