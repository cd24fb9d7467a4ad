// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider module - instance creation backends.

pub mod lxc;
pub mod mock;
mod traits;

pub use lxc::{LxcProvider, LxcProviderConfig};
pub use mock::MockProvider;
pub use traits::*;
