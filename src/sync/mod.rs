// SPDX-License-Identifier: AGPL-3.0-or-later GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod chrono_sync;
pub mod content_cache;
pub mod digest_log;
pub mod digest_tree;
pub mod full_psync;
pub mod iblt;
pub mod psync_state;
pub mod segment_publisher;
pub mod sync_state;
