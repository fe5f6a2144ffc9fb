// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Face seam: everything the sync engines need from the forwarder.
//!
//! The engines run single-threaded and cooperative: a Face implementation
//! drives them by invoking the registered callbacks from its event loop.
//! Implementations must never invoke a callback synchronously from inside
//! `express_interest`, `put_data` or `register_prefix`; deliveries always
//! go through the loop. Registrations and pending interests are identified
//! by opaque ids so an engine can drop its side without holding the Face
//! alive (callbacks capture `Weak` engine handles plus an `enabled` flag).

use anyhow::Result;

use crate::packet::{data::Data, interest::Interest, name::Name};

pub type InterestId = u64;
pub type PrefixId = u64;

/// Response to an expressed interest.
pub type OnData = Box<dyn FnMut(&Interest, &Data)>;
/// The interest's lifetime elapsed without a response.
pub type OnTimeout = Box<dyn FnMut(&Interest)>;
/// An incoming interest under a registered prefix.
pub type OnInterest = Box<dyn FnMut(&Name, &Interest)>;

pub trait Face {
    /// Send an interest; the reply (or timeout) is delivered later from
    /// the event loop.
    fn express_interest(
        &self,
        interest: Interest,
        on_data: OnData,
        on_timeout: OnTimeout,
    ) -> Result<InterestId>;

    /// Forget an outstanding interest; its callbacks will not fire.
    fn remove_pending_interest(&self, id: InterestId);

    fn register_prefix(&self, prefix: Name, on_interest: OnInterest)
    -> Result<PrefixId>;

    fn remove_registered_prefix(&self, id: PrefixId);

    /// Publish a Data packet, satisfying pending interests it matches.
    fn put_data(&self, data: &Data) -> Result<()>;

    /// Run `callback` after `delay_ms` on the event loop.
    fn call_later(&self, delay_ms: u64, callback: Box<dyn FnOnce()>);

    /// Monotonic milliseconds, used for freshness and expiry bookkeeping.
    fn now_ms(&self) -> u64;
}
