// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! ChronoSync: digest-tree based sequence-number synchronization for a
//! group reachable under a shared broadcast prefix.
//!
//! Every participant keeps exactly one sync interest outstanding at
//! `<broadcast>/<rootDigest>`. Peers whose digest we recognize from the
//! digest log get the updates they are missing; an unknown digest arms a
//! recovery timer and eventually a `<broadcast>/recovery/<digest>`
//! interest, which (like a newcomer's `"00"`) is answered with the whole
//! digest-tree state.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use crate::{
    face::{Face, PrefixId},
    packet::{
        data::Data, interest::Interest, name::Name, wire::TlvWireFormat,
    },
    security::KeyChain,
    sync::{
        content_cache::ContentCache,
        digest_log::DigestLog,
        digest_tree::{DigestTree, EMPTY_ROOT},
        sync_state::{
            SyncState, SyncStateAction, decode_sync_state_msg, encode_sync_state_msg,
        },
    },
};

/// Applied updates plus whether they arrived through a recovery path.
pub type OnReceivedSyncState = Box<dyn FnMut(&[SyncState], bool)>;
pub type OnInitialized = Box<dyn FnOnce()>;

const DEFAULT_SYNC_LIFETIME_MS: u64 = 5000;
const DEFAULT_RECOVERY_DELAY_MS: u64 = 2000;
/// Freshness of ordinary sync data; replies to `"00"` use 1 s because
/// they may differ between peers.
const DEFAULT_SYNC_DATA_FRESHNESS_MS: u64 = 3_600_000;
const INITIAL_REPLY_FRESHNESS_MS: u64 = 1000;

pub struct ChronoSyncBuilder {
    face: Rc<dyn Face>,
    key_chain: Rc<dyn KeyChain>,
    wire_format: Rc<TlvWireFormat>,
    broadcast_prefix: Name,
    application_data_prefix: Name,
    session_no: u64,
    sync_lifetime_ms: u64,
    recovery_delay_ms: u64,
    on_received_sync_state: Option<OnReceivedSyncState>,
    on_initialized: Option<OnInitialized>,
}

impl ChronoSyncBuilder {
    pub fn new(
        face: Rc<dyn Face>,
        key_chain: Rc<dyn KeyChain>,
        wire_format: Rc<TlvWireFormat>,
    ) -> Self {
        Self {
            face,
            key_chain,
            wire_format,
            broadcast_prefix: Name::new(),
            application_data_prefix: Name::new(),
            session_no: 0,
            sync_lifetime_ms: DEFAULT_SYNC_LIFETIME_MS,
            recovery_delay_ms: DEFAULT_RECOVERY_DELAY_MS,
            on_received_sync_state: None,
            on_initialized: None,
        }
    }

    /// The shared prefix sync interests are routed under.
    pub fn broadcast_prefix(mut self, prefix: Name) -> Self {
        self.broadcast_prefix = prefix;
        self
    }

    /// This participant's data prefix inside the group.
    pub fn application_data_prefix(mut self, prefix: Name) -> Self {
        self.application_data_prefix = prefix;
        self
    }

    pub fn session_no(mut self, session_no: u64) -> Self {
        self.session_no = session_no;
        self
    }

    pub fn sync_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.sync_lifetime_ms = lifetime_ms;
        self
    }

    pub fn recovery_delay_ms(mut self, delay_ms: u64) -> Self {
        self.recovery_delay_ms = delay_ms;
        self
    }

    pub fn on_received_sync_state(mut self, callback: OnReceivedSyncState) -> Self {
        self.on_received_sync_state = Some(callback);
        self
    }

    pub fn on_initialized(mut self, callback: OnInitialized) -> Self {
        self.on_initialized = Some(callback);
        self
    }

    /// Register on the broadcast prefix and express the first sync
    /// interest.
    pub fn build(self) -> Result<ChronoSync> {
        if self.broadcast_prefix.is_empty() {
            bail!("a broadcast prefix is required");
        }
        if self.application_data_prefix.is_empty() {
            bail!("an application data prefix is required");
        }

        let mut digest_log = DigestLog::new();
        digest_log.append(EMPTY_ROOT.to_string(), Vec::new());

        let inner = Rc::new(RefCell::new(Inner {
            face: Rc::clone(&self.face),
            key_chain: self.key_chain,
            wire_format: self.wire_format,
            broadcast_prefix: self.broadcast_prefix,
            application_data_prefix_uri: self.application_data_prefix.to_uri(),
            session_no: self.session_no,
            sequence_no: -1,
            digest_tree: DigestTree::new(),
            digest_log,
            content_cache: ContentCache::new(Rc::clone(&self.face)),
            sync_lifetime_ms: self.sync_lifetime_ms,
            recovery_delay_ms: self.recovery_delay_ms,
            on_received_sync_state: self
                .on_received_sync_state
                .unwrap_or_else(|| Box::new(|_, _| {})),
            on_initialized: self.on_initialized,
            enabled: true,
            registered_prefix_id: None,
        }));

        let weak = Rc::downgrade(&inner);
        let prefix = inner.borrow().broadcast_prefix.clone();
        let prefix_id = self.face.register_prefix(
            prefix,
            Box::new(move |_prefix, interest| {
                if let Some(inner) = weak.upgrade() {
                    on_interest(&inner, interest);
                }
            }),
        )?;
        inner.borrow_mut().registered_prefix_id = Some(prefix_id);

        send_sync_interest(&inner);
        Ok(ChronoSync { inner })
    }
}

pub struct ChronoSync {
    inner: Rc<RefCell<Inner>>,
}

impl ChronoSync {
    /// Our latest published sequence number; −1 until the first publish
    /// (or until initialization adds us at 0).
    pub fn sequence_no(&self) -> i64 {
        self.inner.borrow().sequence_no
    }

    pub fn session_no(&self) -> u64 {
        self.inner.borrow().session_no
    }

    /// Current root digest of the local digest tree.
    pub fn digest_root(&self) -> String {
        self.inner.borrow().digest_tree.root().to_string()
    }

    /// Snapshot of `(dataPrefixUri, sessionNo, sequenceNo)` per member.
    pub fn members(&self) -> Vec<(String, u64, u64)> {
        self.inner
            .borrow()
            .digest_tree
            .nodes()
            .iter()
            .map(|n| (n.data_prefix().to_string(), n.session_no(), n.sequence_no()))
            .collect()
    }

    /// Advance our own sequence number and announce it to the group.
    pub fn publish_next_sequence_no(&self) -> Result<()> {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.enabled {
                bail!("publish after shutdown");
            }
            inner.sequence_no += 1;
            let sequence_no = inner.sequence_no as u64;
            let own = SyncState::update(
                inner.application_data_prefix_uri.clone(),
                inner.session_no,
                sequence_no,
            );
            let content = encode_sync_state_msg(std::slice::from_ref(&own));

            let old_root = inner.digest_tree.root().to_string();
            let mut data_name = inner.broadcast_prefix.clone();
            data_name.append_str(&old_root);
            let mut data = Data::new(data_name);
            data.set_content(content);
            // data published at the "00" root answers newcomers and may
            // differ between peers, so it must go stale quickly
            let freshness_ms = if old_root == EMPTY_ROOT {
                INITIAL_REPLY_FRESHNESS_MS
            } else {
                DEFAULT_SYNC_DATA_FRESHNESS_MS
            };
            data.meta_info_mut()
                .set_freshness_period_ms(Some(freshness_ms));
            let wire_format = Rc::clone(&inner.wire_format);
            inner
                .key_chain
                .sign(&mut data, &wire_format)
                .context("cannot sign sync data")?;
            inner.content_cache.add(data);

            let uri = inner.application_data_prefix_uri.clone();
            let session_no = inner.session_no;
            inner.digest_tree.update(&uri, session_no, sequence_no);
            let new_root = inner.digest_tree.root().to_string();
            inner.digest_log.append(new_root, vec![own]);
        }
        send_sync_interest(&self.inner);
        Ok(())
    }

    /// Stop handling callbacks and unregister from the broadcast prefix.
    /// In-flight interests are not cancelled; their replies are ignored.
    pub fn shutdown(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.enabled = false;
        if let Some(id) = inner.registered_prefix_id.take() {
            inner.face.remove_registered_prefix(id);
        }
    }
}

struct Inner {
    face: Rc<dyn Face>,
    key_chain: Rc<dyn KeyChain>,
    wire_format: Rc<TlvWireFormat>,
    broadcast_prefix: Name,
    application_data_prefix_uri: String,
    session_no: u64,
    sequence_no: i64,
    digest_tree: DigestTree,
    digest_log: DigestLog,
    content_cache: ContentCache,
    sync_lifetime_ms: u64,
    recovery_delay_ms: u64,
    on_received_sync_state: OnReceivedSyncState,
    on_initialized: Option<OnInitialized>,
    enabled: bool,
    registered_prefix_id: Option<PrefixId>,
}

impl Inner {
    fn sync_interest_name(&self) -> Name {
        let mut name = self.broadcast_prefix.clone();
        name.append_str(self.digest_tree.root());
        name
    }

    /// The whole digest tree as one UPDATE batch.
    fn full_state(&self) -> Vec<SyncState> {
        self.digest_tree
            .nodes()
            .iter()
            .map(|node| {
                SyncState::update(
                    node.data_prefix().to_string(),
                    node.session_no(),
                    node.sequence_no(),
                )
            })
            .collect()
    }

    fn make_sync_data(
        &self,
        name: Name,
        states: &[SyncState],
        freshness_ms: u64,
    ) -> Result<Data> {
        let mut data = Data::new(name);
        data.set_content(encode_sync_state_msg(states));
        data.meta_info_mut()
            .set_freshness_period_ms(Some(freshness_ms));
        self.key_chain
            .sign(&mut data, &self.wire_format)
            .context("cannot sign sync data")?;
        Ok(data)
    }
}

/// Express `<broadcast>/<root>` and keep it outstanding.
fn send_sync_interest(inner_rc: &Rc<RefCell<Inner>>) {
    let (face, interest) = {
        let inner = inner_rc.borrow();
        if !inner.enabled {
            return;
        }
        let mut interest = Interest::new(inner.sync_interest_name());
        interest.set_lifetime_ms(Some(inner.sync_lifetime_ms));
        (Rc::clone(&inner.face), interest)
    };

    let weak_data = Rc::downgrade(inner_rc);
    let weak_timeout = Rc::downgrade(inner_rc);
    let result = face.express_interest(
        interest,
        Box::new(move |interest, data| {
            if let Some(inner) = weak_data.upgrade() {
                on_sync_data(&inner, interest, data);
            }
        }),
        Box::new(move |interest| {
            if let Some(inner) = weak_timeout.upgrade() {
                on_sync_timeout(&inner, interest);
            }
        }),
    );
    if let Err(e) = result {
        warn!("failed to express sync interest: {e}");
    }
}

fn on_interest(inner_rc: &Rc<RefCell<Inner>>, interest: &Interest) {
    let mut inner = inner_rc.borrow_mut();
    if !inner.enabled {
        return;
    }
    if inner.content_cache.serve_from_store(interest) {
        return;
    }

    let broadcast_size = inner.broadcast_prefix.size();
    let components_past_prefix = interest.name().size() - broadcast_size;

    if components_past_prefix == 2 {
        // <broadcast>/recovery/<digest>
        let marker = interest
            .name()
            .get(-2)
            .map(|c| c.value().as_ref() == b"recovery");
        if marker != Some(true) {
            debug!(name = %interest.name(), "ignoring malformed sync interest");
            return;
        }
        let digest = match digest_component(interest, -1) {
            Some(d) => d,
            None => return,
        };
        process_recovery_interest(&mut inner, interest, &digest);
        return;
    }
    if components_past_prefix != 1 {
        debug!(name = %interest.name(), "ignoring malformed sync interest");
        return;
    }

    let digest = match digest_component(interest, -1) {
        Some(d) => d,
        None => return,
    };

    if digest == EMPTY_ROOT {
        // a newcomer probing the group
        if inner.digest_tree.size() > 0 {
            respond(&mut inner, interest.name().clone(), INITIAL_REPLY_FRESHNESS_MS);
        } else {
            inner.content_cache.store_pending_interest(interest);
        }
        return;
    }

    if digest == inner.digest_tree.root() {
        // up to date: park until our root changes
        inner.content_cache.store_pending_interest(interest);
        return;
    }

    if let Some(index) = inner.digest_log.find(&digest) {
        let updates = inner.digest_log.updates_since(index);
        let data = inner.make_sync_data(
            interest.name().clone(),
            &updates,
            DEFAULT_SYNC_DATA_FRESHNESS_MS,
        );
        publish_response(&mut inner, data);
        return;
    }

    // an unknown digest: wait briefly in case the gap closes, then recover
    inner.content_cache.store_pending_interest(interest);
    let delay = inner.recovery_delay_ms;
    let weak = Rc::downgrade(inner_rc);
    let interest_name = interest.name().clone();
    inner.face.call_later(
        delay,
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                judge_recovery(&inner, &interest_name, &digest);
            }
        }),
    );
}

fn process_recovery_interest(inner: &mut Inner, interest: &Interest, digest: &str) {
    if inner.digest_log.find(digest).is_some() {
        respond(inner, interest.name().clone(), DEFAULT_SYNC_DATA_FRESHNESS_MS);
    }
}

/// Reply to `name` with the whole current digest-tree state.
fn respond(inner: &mut Inner, name: Name, freshness_ms: u64) {
    let states = inner.full_state();
    let data = inner.make_sync_data(name, &states, freshness_ms);
    publish_response(inner, data);
}

fn publish_response(inner: &mut Inner, data: Result<Data>) {
    match data {
        Ok(data) => {
            if let Err(e) = inner.face.put_data(&data) {
                warn!("failed to send sync data: {e}");
            }
            inner.content_cache.add(data);
        },
        Err(e) => warn!("dropping sync response: {e}"),
    }
}

/// The 2-second timer armed for an unrecognized digest.
fn judge_recovery(inner_rc: &Rc<RefCell<Inner>>, interest_name: &Name, digest: &str) {
    let mut inner = inner_rc.borrow_mut();
    if !inner.enabled {
        return;
    }
    if let Some(index) = inner.digest_log.find(digest) {
        // a peer's update meanwhile told us about this digest; the
        // original interest is parked, so the cache pushes the reply
        let updates = inner.digest_log.updates_since(index);
        match inner.make_sync_data(
            interest_name.clone(),
            &updates,
            DEFAULT_SYNC_DATA_FRESHNESS_MS,
        ) {
            Ok(data) => inner.content_cache.add(data),
            Err(e) => warn!("dropping sync response: {e}"),
        }
        return;
    }

    let mut recovery_name = inner.broadcast_prefix.clone();
    recovery_name.append_str("recovery").append_str(digest);
    let mut interest = Interest::new(recovery_name);
    interest.set_lifetime_ms(Some(inner.sync_lifetime_ms));
    debug!(name = %interest.name(), "sending recovery interest");

    let face = Rc::clone(&inner.face);
    drop(inner);

    let weak_data = Rc::downgrade(inner_rc);
    let result = face.express_interest(
        interest,
        Box::new(move |interest, data| {
            if let Some(inner) = weak_data.upgrade() {
                on_sync_data(&inner, interest, data);
            }
        }),
        Box::new(move |interest| {
            // recovery interests are not retried
            debug!(name = %interest.name(), "recovery interest timed out");
        }),
    );
    if let Err(e) = result {
        warn!("failed to express recovery interest: {e}");
    }
}

fn on_sync_data(inner_rc: &Rc<RefCell<Inner>>, interest: &Interest, data: &Data) {
    let (applied, is_recovery, on_initialized) = {
        let mut inner = inner_rc.borrow_mut();
        if !inner.enabled {
            return;
        }
        if !inner.key_chain.verify(data, &inner.wire_format) {
            warn!(name = %data.name(), "dropping sync data that fails verification");
            return;
        }
        let states = match decode_sync_state_msg(data.content()) {
            Ok(states) => states,
            Err(e) => {
                warn!(name = %data.name(), "dropping undecodable sync data: {e}");
                return;
            },
        };

        let broadcast_size = inner.broadcast_prefix.size();
        let from_recovery = interest.name().size() == broadcast_size + 2
            || digest_component(interest, -1).as_deref() == Some(EMPTY_ROOT);
        let newcomer = inner.digest_tree.root() == EMPTY_ROOT;

        if newcomer {
            let (applied, on_initialized) = initial_on_data(&mut inner, &states);
            (applied, true, on_initialized)
        } else {
            (apply_states(&mut inner, &states), from_recovery, None)
        }
    };

    if let Some(on_initialized) = on_initialized {
        on_initialized();
    }
    deliver_sync_states(inner_rc, &applied, is_recovery);
    send_sync_interest(inner_rc);
}

/// Apply an UPDATE batch; returns the states that advanced the tree and
/// appends a digest-log entry when the root moved.
fn apply_states(inner: &mut Inner, states: &[SyncState]) -> Vec<SyncState> {
    let mut applied = Vec::new();
    for state in states {
        if state.action != SyncStateAction::Update {
            continue;
        }
        if inner.digest_tree.update(
            &state.data_prefix_uri,
            state.session_no,
            state.sequence_no,
        ) {
            applied.push(state.clone());
        }
    }
    if !applied.is_empty() {
        let root = inner.digest_tree.root().to_string();
        let batch: Vec<SyncState> = states
            .iter()
            .filter(|s| s.action == SyncStateAction::Update)
            .cloned()
            .collect();
        inner.digest_log.append(root, batch);
    }
    applied
}

/// First sync data seen while our root is still `"00"`. Returns the
/// applied updates and, when we just joined the tree, the
/// `on_initialized` callback for the caller to run outside the borrow.
fn initial_on_data(
    inner: &mut Inner,
    states: &[SyncState],
) -> (Vec<SyncState>, Option<OnInitialized>) {
    let applied = apply_states(inner, states);

    // tell other newcomers about our state
    let sequence_for_broadcast = inner.sequence_no.max(0) as u64;
    let own = SyncState::update(
        inner.application_data_prefix_uri.clone(),
        inner.session_no,
        sequence_for_broadcast,
    );
    let mut announce_name = inner.broadcast_prefix.clone();
    announce_name.append_str(EMPTY_ROOT);
    match inner.make_sync_data(
        announce_name,
        std::slice::from_ref(&own),
        INITIAL_REPLY_FRESHNESS_MS,
    ) {
        Ok(data) => inner.content_cache.add(data),
        Err(e) => warn!("dropping initial announcement: {e}"),
    }

    let uri = inner.application_data_prefix_uri.clone();
    let mut on_initialized = None;
    if inner.digest_tree.find(&uri, inner.session_no).is_none() {
        inner.sequence_no += 1;
        let sequence_no = inner.sequence_no as u64;
        inner
            .digest_tree
            .update(&uri, inner.session_no, sequence_no);
        let root = inner.digest_tree.root().to_string();
        inner.digest_log.append(root, vec![SyncState::update(
            uri,
            inner.session_no,
            sequence_no,
        )]);
        on_initialized = inner.on_initialized.take();
    }
    (applied, on_initialized)
}

fn on_sync_timeout(inner_rc: &Rc<RefCell<Inner>>, interest: &Interest) {
    let same_root = {
        let inner = inner_rc.borrow();
        if !inner.enabled {
            return;
        }
        digest_component_of(interest, inner.broadcast_prefix.size())
            .is_some_and(|digest| digest == inner.digest_tree.root())
    };
    if same_root {
        // still waiting on the same root: reissue
        send_sync_interest(inner_rc);
    }
    // a newer root has its own interest outstanding; drop this one
}

/// Run the application callback without holding the engine borrow, so it
/// may call back into `publish_next_sequence_no`.
fn deliver_sync_states(
    inner_rc: &Rc<RefCell<Inner>>,
    updates: &[SyncState],
    is_recovery: bool,
) {
    let mut callback = {
        let mut inner = inner_rc.borrow_mut();
        std::mem::replace(&mut inner.on_received_sync_state, Box::new(|_, _| {}))
    };
    callback(updates, is_recovery);
    inner_rc.borrow_mut().on_received_sync_state = callback;
}

fn digest_component(interest: &Interest, index: isize) -> Option<String> {
    let component = interest.name().get(index)?;
    match std::str::from_utf8(component.value()) {
        Ok(text) => Some(text.to_string()),
        Err(_) => {
            debug!(name = %interest.name(), "sync digest component is not UTF-8");
            None
        },
    }
}

fn digest_component_of(interest: &Interest, at: usize) -> Option<String> {
    digest_component(interest, at as isize)
}
