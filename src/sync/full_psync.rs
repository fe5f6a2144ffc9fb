// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! FullPSync: IBLT-driven full-dataset synchronization.
//!
//! Every participant advertises the set of names it knows in a compressed
//! IBLT carried inside its sync interest. A receiver subtracts its own
//! table, peels the difference, and answers with the names the sender is
//! missing; when the difference is too large to peel, the whole name set
//! travels instead. Interests that reveal no difference are parked and
//! re-examined whenever the local set changes.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    rc::Rc,
};

use anyhow::{Result, bail};
use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::{
    face::{Face, InterestId, PrefixId},
    packet::{
        data::Data, interest::Interest, name::Name, wire::TlvWireFormat,
    },
    security::KeyChain,
    sync::{
        iblt::{Iblt, N_HASHCHECK, murmur_hash3},
        psync_state::PSyncState,
        segment_publisher::SegmentPublisher,
    },
};

pub type OnNamesUpdate = Box<dyn FnMut(&[Name])>;
/// `(name, negatives)`: whether `name` belongs in a reply, given the keys
/// the other side holds that we lack.
pub type CanAddToSyncData = Box<dyn Fn(&Name, &HashSet<u64>) -> bool>;
pub type CanAddReceivedName = Box<dyn Fn(&Name) -> bool>;

const DEFAULT_SYNC_INTEREST_LIFETIME_MS: u64 = 1000;
const DEFAULT_SYNC_REPLY_FRESHNESS_MS: u64 = 1000;

pub struct FullPSyncBuilder {
    face: Rc<dyn Face>,
    key_chain: Rc<dyn KeyChain>,
    wire_format: Rc<TlvWireFormat>,
    sync_prefix: Name,
    expected_n_entries: usize,
    sync_interest_lifetime_ms: u64,
    sync_reply_freshness_ms: u64,
    on_names_update: Option<OnNamesUpdate>,
    can_add_to_sync_data: Option<CanAddToSyncData>,
    can_add_received_name: Option<CanAddReceivedName>,
}

impl FullPSyncBuilder {
    pub fn new(
        face: Rc<dyn Face>,
        key_chain: Rc<dyn KeyChain>,
        wire_format: Rc<TlvWireFormat>,
    ) -> Self {
        Self {
            face,
            key_chain,
            wire_format,
            sync_prefix: Name::new(),
            expected_n_entries: 80,
            sync_interest_lifetime_ms: DEFAULT_SYNC_INTEREST_LIFETIME_MS,
            sync_reply_freshness_ms: DEFAULT_SYNC_REPLY_FRESHNESS_MS,
            on_names_update: None,
            can_add_to_sync_data: None,
            can_add_received_name: None,
        }
    }

    pub fn sync_prefix(mut self, prefix: Name) -> Self {
        self.sync_prefix = prefix;
        self
    }

    /// Sizes the IBLT; differences beyond roughly this many names fall
    /// back to whole-set replies.
    pub fn expected_n_entries(mut self, expected: usize) -> Self {
        self.expected_n_entries = expected;
        self
    }

    pub fn sync_interest_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.sync_interest_lifetime_ms = lifetime_ms;
        self
    }

    pub fn sync_reply_freshness_ms(mut self, freshness_ms: u64) -> Self {
        self.sync_reply_freshness_ms = freshness_ms;
        self
    }

    pub fn on_names_update(mut self, callback: OnNamesUpdate) -> Self {
        self.on_names_update = Some(callback);
        self
    }

    pub fn can_add_to_sync_data(mut self, predicate: CanAddToSyncData) -> Self {
        self.can_add_to_sync_data = Some(predicate);
        self
    }

    pub fn can_add_received_name(mut self, predicate: CanAddReceivedName) -> Self {
        self.can_add_received_name = Some(predicate);
        self
    }

    /// Register on the sync prefix and start the periodic sync interest.
    pub fn build(self) -> Result<FullPSync> {
        if self.sync_prefix.is_empty() {
            bail!("a sync prefix is required");
        }
        if self.expected_n_entries == 0 {
            bail!("expected_n_entries must be positive");
        }

        let segment_publisher = SegmentPublisher::new(
            Rc::clone(&self.face),
            Rc::clone(&self.key_chain),
            Rc::clone(&self.wire_format),
        );
        let inner = Rc::new(RefCell::new(Inner {
            face: Rc::clone(&self.face),
            wire_format: self.wire_format,
            sync_prefix: self.sync_prefix,
            iblt: Iblt::new(self.expected_n_entries),
            expected_n_entries: self.expected_n_entries,
            threshold: self.expected_n_entries / 2,
            name_to_hash: HashMap::new(),
            hash_to_name: HashMap::new(),
            pending_entries: HashMap::new(),
            reassembly: HashMap::new(),
            outstanding_interest_id: None,
            sync_timer_generation: 0,
            sync_interest_lifetime_ms: self.sync_interest_lifetime_ms,
            sync_reply_freshness_ms: self.sync_reply_freshness_ms,
            segment_publisher,
            on_names_update: self
                .on_names_update
                .unwrap_or_else(|| Box::new(|_| {})),
            can_add_to_sync_data: self.can_add_to_sync_data,
            can_add_received_name: self.can_add_received_name,
            enabled: true,
            registered_prefix_id: None,
        }));

        let weak = Rc::downgrade(&inner);
        let prefix = inner.borrow().sync_prefix.clone();
        let prefix_id = self.face.register_prefix(
            prefix,
            Box::new(move |_prefix, interest| {
                if let Some(inner) = weak.upgrade() {
                    on_sync_interest(&inner, interest);
                }
            }),
        )?;
        inner.borrow_mut().registered_prefix_id = Some(prefix_id);

        send_sync_interest(&inner);
        Ok(FullPSync { inner })
    }
}

pub struct FullPSync {
    inner: Rc<RefCell<Inner>>,
}

impl FullPSync {
    /// Add `name` to the advertised set. A name already present is a
    /// no-op.
    pub fn publish_name(&self, name: &Name) {
        let mut inner = self.inner.borrow_mut();
        if !inner.enabled {
            return;
        }
        if inner.name_to_hash.contains_key(name) {
            debug!(%name, "name is already published");
            return;
        }
        inner.insert_name(name.clone());
        satisfy_pending_interests(&mut inner);
    }

    /// The advertised names, unordered.
    pub fn names(&self) -> Vec<Name> {
        self.inner.borrow().name_to_hash.keys().cloned().collect()
    }

    pub fn is_published(&self, name: &Name) -> bool {
        self.inner.borrow().name_to_hash.contains_key(name)
    }

    /// Stop handling callbacks, unregister and drop the outstanding
    /// interest; parked-entry timers become no-ops.
    pub fn shutdown(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.enabled = false;
        if let Some(id) = inner.registered_prefix_id.take() {
            inner.face.remove_registered_prefix(id);
        }
        if let Some(id) = inner.outstanding_interest_id.take() {
            inner.face.remove_pending_interest(id);
        }
        for (_, entry) in inner.pending_entries.drain() {
            entry.is_removed.set(true);
        }
    }
}

struct PendingEntry {
    iblt: Iblt,
    is_removed: Rc<Cell<bool>>,
}

struct Inner {
    face: Rc<dyn Face>,
    wire_format: Rc<TlvWireFormat>,
    sync_prefix: Name,
    iblt: Iblt,
    expected_n_entries: usize,
    threshold: usize,
    name_to_hash: HashMap<Name, u64>,
    hash_to_name: HashMap<u64, Name>,
    pending_entries: HashMap<Name, PendingEntry>,
    /// In-flight multi-segment payloads keyed by `<base>/<version>`.
    reassembly: HashMap<Name, Vec<Bytes>>,
    outstanding_interest_id: Option<InterestId>,
    /// Bumped on every (re)send; stale reissue timers check it and bail.
    sync_timer_generation: u64,
    sync_interest_lifetime_ms: u64,
    sync_reply_freshness_ms: u64,
    segment_publisher: SegmentPublisher,
    on_names_update: OnNamesUpdate,
    can_add_to_sync_data: Option<CanAddToSyncData>,
    can_add_received_name: Option<CanAddReceivedName>,
    enabled: bool,
    registered_prefix_id: Option<PrefixId>,
}

impl Inner {
    fn name_hash(&self, name: &Name) -> u64 {
        u64::from(murmur_hash3(N_HASHCHECK, &self.wire_format.encode_name(name)))
    }

    fn insert_name(&mut self, name: Name) {
        let hash = self.name_hash(&name);
        self.iblt.insert(hash);
        self.name_to_hash.insert(name.clone(), hash);
        self.hash_to_name.insert(hash, name);
    }

    /// The whole advertised set as a PSyncState.
    fn whole_state(&self) -> PSyncState {
        PSyncState::from_names(self.name_to_hash.keys().cloned().collect())
    }

    fn allow_in_sync_data(&self, name: &Name, negative: &HashSet<u64>) -> bool {
        self.can_add_to_sync_data
            .as_ref()
            .is_none_or(|predicate| predicate(name, negative))
    }

    fn send_sync_data(&self, reply_name: &Name, state: &PSyncState) {
        let content = state.encode(&self.wire_format);
        if let Err(e) = self.segment_publisher.publish(
            reply_name,
            reply_name,
            &content,
            self.sync_reply_freshness_ms,
        ) {
            warn!("failed to publish sync data: {e}");
        }
    }
}

/// Express `<syncPrefix>/<compressed-IBLT>` with a fresh nonce and arm
/// the next reissue at `lifetime/2 ± 20%` jitter.
fn send_sync_interest(inner_rc: &Rc<RefCell<Inner>>) {
    let (face, interest) = {
        let mut inner = inner_rc.borrow_mut();
        if !inner.enabled {
            return;
        }

        inner.sync_timer_generation += 1;
        let generation = inner.sync_timer_generation;
        let lifetime = inner.sync_interest_lifetime_ms;
        let jitter_span = lifetime / 5;
        let jitter =
            (inner.wire_format.random_u64() % (2 * jitter_span + 1)) as i64
                - jitter_span as i64;
        let delay = ((lifetime / 2) as i64 + jitter).max(0) as u64;
        let weak = Rc::downgrade(inner_rc);
        inner.face.call_later(
            delay,
            Box::new(move || {
                if let Some(inner_rc) = weak.upgrade() {
                    let stale = {
                        let inner = inner_rc.borrow();
                        !inner.enabled || inner.sync_timer_generation != generation
                    };
                    if !stale {
                        send_sync_interest(&inner_rc);
                    }
                }
            }),
        );

        if let Some(id) = inner.outstanding_interest_id.take() {
            inner.face.remove_pending_interest(id);
        }

        let encoded_iblt = match inner.iblt.encode() {
            Ok(wire) => wire,
            Err(e) => {
                warn!("cannot encode own IBLT: {e}");
                return;
            },
        };
        let mut name = inner.sync_prefix.clone();
        name.append(crate::packet::name::NameComponent::new(encoded_iblt));
        let mut interest = Interest::new(name);
        interest.set_lifetime_ms(Some(lifetime));
        interest.set_nonce(Bytes::copy_from_slice(
            &inner.wire_format.random_nonce(),
        ));
        (Rc::clone(&inner.face), interest)
    };

    let weak_data = Rc::downgrade(inner_rc);
    let result = face.express_interest(
        interest,
        Box::new(move |interest, data| {
            if let Some(inner) = weak_data.upgrade() {
                on_sync_data(&inner, interest, data);
            }
        }),
        Box::new(move |interest| {
            // the periodic timer reissues; timeouts only get logged
            trace!(name = %interest.name(), "sync interest timed out");
        }),
    );
    match result {
        Ok(id) => inner_rc.borrow_mut().outstanding_interest_id = Some(id),
        Err(e) => warn!("failed to express sync interest: {e}"),
    }
}

fn on_sync_interest(inner_rc: &Rc<RefCell<Inner>>, interest: &Interest) {
    let mut inner = inner_rc.borrow_mut();
    if !inner.enabled {
        return;
    }
    if inner.segment_publisher.reply_from_store(interest.name()) {
        return;
    }

    let prefix_size = inner.sync_prefix.size();
    let name = interest.name();
    let base_name = if name.size() == prefix_size + 1 {
        name.clone()
    } else if name.size() == prefix_size + 3 {
        // a segment fetch for a reply no longer in the store
        name.get_prefix(-2)
    } else {
        debug!(%name, "ignoring malformed sync interest");
        return;
    };

    let Some(iblt_component) = base_name.get(-1) else {
        return;
    };
    let mut remote = Iblt::new(inner.expected_n_entries);
    if let Err(e) = remote.initialize(iblt_component.value()) {
        warn!(%name, "dropping sync interest with a bad IBLT: {e}");
        return;
    }

    let difference = match inner.iblt.difference(&remote) {
        Ok(difference) => difference,
        Err(e) => {
            warn!(%name, "dropping sync interest: {e}");
            return;
        },
    };
    let mut positive = HashSet::new();
    let mut negative = HashSet::new();
    let can_decode = difference.list_entries(&mut positive, &mut negative);

    if !can_decode
        && (positive.len() + negative.len() >= inner.threshold
            || (positive.is_empty() && negative.is_empty()))
    {
        // too far apart to peel: ship the whole set
        let state = inner.whole_state();
        inner.send_sync_data(&base_name, &state);
        return;
    }
    if !can_decode {
        // a stalled peel below the threshold still yields whatever
        // positives came off before it stuck
        trace!(
            positives = positive.len(),
            negatives = negative.len(),
            "difference only partially peeled"
        );
    }

    let mut state = PSyncState::new();
    for hash in &positive {
        if let Some(name) = inner.hash_to_name.get(hash)
            && inner.name_to_hash.contains_key(name)
            && inner.allow_in_sync_data(name, &negative)
        {
            state.add_name(name.clone());
        }
    }

    if !state.names().is_empty() {
        inner.send_sync_data(&base_name, &state);
        return;
    }

    // nothing to tell them yet: park until our set changes
    let is_removed = Rc::new(Cell::new(false));
    if let Some(replaced) = inner.pending_entries.insert(base_name.clone(), PendingEntry {
        iblt: remote,
        is_removed: Rc::clone(&is_removed),
    }) {
        // neutralize the replaced entry's removal timer
        replaced.is_removed.set(true);
    }
    let delay = interest
        .lifetime_ms()
        .unwrap_or(inner.sync_interest_lifetime_ms);
    let weak = Rc::downgrade(inner_rc);
    inner.face.call_later(
        delay,
        Box::new(move || {
            if is_removed.get() {
                // satisfied (or replaced) in the meantime
                return;
            }
            if let Some(inner_rc) = weak.upgrade() {
                inner_rc.borrow_mut().pending_entries.remove(&base_name);
            }
        }),
    );
}

/// Re-run the difference for every parked interest after the local set
/// changed, answering the ones that became satisfiable.
fn satisfy_pending_interests(inner: &mut Inner) {
    let pending_names: Vec<Name> = inner.pending_entries.keys().cloned().collect();
    for name in pending_names {
        let Some(entry) = inner.pending_entries.get(&name) else {
            continue;
        };

        let difference = match inner.iblt.difference(&entry.iblt) {
            Ok(difference) => difference,
            Err(e) => {
                warn!("dropping parked sync interest: {e}");
                if let Some(entry) = inner.pending_entries.remove(&name) {
                    entry.is_removed.set(true);
                }
                continue;
            },
        };
        let mut positive = HashSet::new();
        let mut negative = HashSet::new();
        let can_decode = difference.list_entries(&mut positive, &mut negative);

        if !can_decode {
            if positive.len() + negative.len() >= inner.threshold
                || (positive.is_empty() && negative.is_empty())
            {
                let state = inner.whole_state();
                inner.send_sync_data(&name, &state);
                if let Some(entry) = inner.pending_entries.remove(&name) {
                    entry.is_removed.set(true);
                }
            }
            continue;
        }

        let mut state = PSyncState::new();
        for hash in &positive {
            if let Some(candidate) = inner.hash_to_name.get(hash)
                && inner.name_to_hash.contains_key(candidate)
                && inner.allow_in_sync_data(candidate, &negative)
            {
                state.add_name(candidate.clone());
            }
        }
        if !state.names().is_empty() {
            inner.send_sync_data(&name, &state);
            if let Some(entry) = inner.pending_entries.remove(&name) {
                entry.is_removed.set(true);
            }
        }
    }
}

fn on_sync_data(inner_rc: &Rc<RefCell<Inner>>, _interest: &Interest, data: &Data) {
    let payload = {
        let mut inner = inner_rc.borrow_mut();
        if !inner.enabled {
            return;
        }
        match reassemble(&mut inner, inner_rc, data) {
            Reassembly::Complete(payload) => payload,
            Reassembly::Partial => return,
        }
    };
    handle_payload(inner_rc, &payload);
}

enum Reassembly {
    Complete(Bytes),
    Partial,
}

/// Collect versioned segments until the final block arrives; data without
/// the version/segment suffix passes straight through.
fn reassemble(inner: &mut Inner, inner_rc: &Rc<RefCell<Inner>>, data: &Data) -> Reassembly {
    let name = data.name();
    let segment_no = match name.get(-1).map(|c| c.to_segment()) {
        Some(Ok(segment_no)) => segment_no,
        _ => return Reassembly::Complete(data.content().clone()),
    };
    let final_segment = data
        .meta_info()
        .final_block_id()
        .and_then(|c| c.to_segment().ok());

    if segment_no == 0 && final_segment == Some(0) {
        return Reassembly::Complete(data.content().clone());
    }

    // key the partial payload by `<base>/<version>`
    let key = name.get_prefix(-1);
    let chunks = inner.reassembly.entry(key.clone()).or_default();
    if chunks.len() as u64 != segment_no {
        // out of order; restart the fetch from this version
        debug!(%name, "unexpected segment number, dropping partial payload");
        inner.reassembly.remove(&key);
        return Reassembly::Partial;
    }
    chunks.push(data.content().clone());

    if Some(segment_no) == final_segment {
        let chunks = inner.reassembly.remove(&key).unwrap_or_default();
        let mut payload = Vec::new();
        for chunk in &chunks {
            payload.extend_from_slice(chunk);
        }
        return Reassembly::Complete(Bytes::from(payload));
    }

    // fetch the next segment of this version
    let mut next_name = key.clone();
    next_name.append_segment(segment_no + 1);
    let mut interest = Interest::new(next_name);
    interest.set_lifetime_ms(Some(inner.sync_interest_lifetime_ms));
    let weak_data = Rc::downgrade(inner_rc);
    let weak_timeout = Rc::downgrade(inner_rc);
    let result = inner.face.express_interest(
        interest,
        Box::new(move |interest, data| {
            if let Some(inner) = weak_data.upgrade() {
                on_sync_data(&inner, interest, data);
            }
        }),
        Box::new(move |interest| {
            debug!(name = %interest.name(), "segment fetch timed out");
            if let Some(inner_rc) = weak_timeout.upgrade() {
                let key = interest.name().get_prefix(-1);
                inner_rc.borrow_mut().reassembly.remove(&key);
            }
        }),
    );
    if let Err(e) = result {
        warn!("failed to fetch the next segment: {e}");
        inner.reassembly.remove(&key);
    }
    Reassembly::Partial
}

fn handle_payload(inner_rc: &Rc<RefCell<Inner>>, payload: &Bytes) {
    let accepted = {
        let mut inner = inner_rc.borrow_mut();
        let state = match PSyncState::decode(payload, &inner.wire_format) {
            Ok(state) => state,
            Err(e) => {
                warn!("dropping undecodable sync data: {e}");
                return;
            },
        };

        let mut accepted = Vec::new();
        for name in state.names() {
            if inner.name_to_hash.contains_key(name) {
                continue;
            }
            if inner
                .can_add_received_name
                .as_ref()
                .is_none_or(|predicate| predicate(name))
            {
                inner.insert_name(name.clone());
                accepted.push(name.clone());
            }
        }
        if !accepted.is_empty() {
            satisfy_pending_interests(&mut inner);
        }
        accepted
    };

    if !accepted.is_empty() {
        deliver_names_update(inner_rc, &accepted);
    }
    send_sync_interest(inner_rc);
}

/// Run the application callback without holding the engine borrow, so it
/// may call back into `publish_name`.
fn deliver_names_update(inner_rc: &Rc<RefCell<Inner>>, names: &[Name]) {
    let mut callback = {
        let mut inner = inner_rc.borrow_mut();
        std::mem::replace(&mut inner.on_names_update, Box::new(|_| {}))
    };
    callback(names);
    inner_rc.borrow_mut().on_names_update = callback;
}
