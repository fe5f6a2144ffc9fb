// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A small producer-side content cache with a parked-interest table.
//!
//! Incoming interests the engine cannot answer yet are parked here; when
//! the engine later publishes a matching Data packet it is pushed to the
//! face once and kept in the cache (bounded by its freshness period) for
//! peers that ask after the network PIT entry is gone.

use std::rc::Rc;

use tracing::warn;

use crate::{
    face::Face,
    packet::{data::Data, interest::Interest},
};

/// Lifetime assumed for parked interests that do not carry one.
const DEFAULT_INTEREST_LIFETIME_MS: u64 = 4000;

struct CachedData {
    data: Data,
    /// `None` means the entry never goes stale.
    stale_at_ms: Option<u64>,
}

struct PendingInterest {
    interest: Interest,
    expire_at_ms: u64,
}

pub struct ContentCache {
    face: Rc<dyn Face>,
    cache: Vec<CachedData>,
    pending: Vec<PendingInterest>,
}

impl ContentCache {
    pub fn new(face: Rc<dyn Face>) -> Self {
        Self {
            face,
            cache: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn purge(&mut self) {
        let now = self.face.now_ms();
        self.cache
            .retain(|entry| entry.stale_at_ms.is_none_or(|at| at > now));
        self.pending.retain(|entry| entry.expire_at_ms > now);
    }

    /// Answer `interest` from the cache if possible.
    pub fn serve_from_store(&mut self, interest: &Interest) -> bool {
        self.purge();
        let Some(entry) = self
            .cache
            .iter()
            .find(|entry| interest.matches_name(entry.data.name()))
        else {
            return false;
        };
        if let Err(e) = self.face.put_data(&entry.data) {
            warn!("failed to answer interest from the content cache: {e}");
        }
        true
    }

    /// Park an interest until a matching Data packet is published.
    pub fn store_pending_interest(&mut self, interest: &Interest) {
        self.purge();
        let lifetime = interest
            .lifetime_ms()
            .unwrap_or(DEFAULT_INTEREST_LIFETIME_MS);
        self.pending.push(PendingInterest {
            interest: interest.clone(),
            expire_at_ms: self.face.now_ms() + lifetime,
        });
    }

    /// Publish `data`: push it once if any parked interest matches, and
    /// keep it for later requests until its freshness period lapses.
    pub fn add(&mut self, data: Data) {
        self.purge();

        let mut matched = false;
        self.pending.retain(|entry| {
            if entry.interest.matches_name(data.name()) {
                matched = true;
                false
            } else {
                true
            }
        });
        if matched && let Err(e) = self.face.put_data(&data) {
            warn!("failed to publish data for parked interests: {e}");
        }

        let stale_at_ms = data
            .meta_info()
            .freshness_period_ms()
            .map(|fresh| self.face.now_ms() + fresh);
        self.cache.push(CachedData { data, stale_at_ms });
    }
}
