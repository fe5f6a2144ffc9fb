// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A deterministic in-memory forwarder with a virtual clock.
//!
//! Every face attached to the hub sees every other face's interests
//! (subject to its prefix registrations), data consumes pending
//! interests like a real PIT, and `call_later` closures run on the same
//! virtual timeline. Packets take a wire round trip on every hop, so the
//! sync engines are exercised through the real codec.

use std::{
    cell::RefCell,
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap},
    rc::Rc,
};

use anyhow::{Result, anyhow};
use ndn_sync_rs::{
    face::{Face, InterestId, OnData, OnInterest, OnTimeout, PrefixId},
    packet::{data::Data, interest::Interest, name::Name, wire::TlvWireFormat},
};

const LINK_LATENCY_MS: u64 = 10;
const DEFAULT_INTEREST_LIFETIME_MS: u64 = 4000;

enum Action {
    DeliverInterest { to_face: usize, interest: Interest },
    DeliverData { pit_id: u64, data: Data },
    Timeout { pit_id: u64 },
    Closure(Box<dyn FnOnce()>),
}

struct Event {
    due_ms: u64,
    seq: u64,
    action: Action,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due_ms, self.seq).cmp(&(other.due_ms, other.seq))
    }
}

struct Registration {
    id: PrefixId,
    prefix: Name,
    handler: Rc<RefCell<OnInterest>>,
}

struct FaceRecord {
    registrations: Vec<Registration>,
}

struct PitEntry {
    face_index: usize,
    interest: Interest,
    on_data: Rc<RefCell<OnData>>,
    on_timeout: Rc<RefCell<OnTimeout>>,
    satisfied: bool,
    removed: bool,
}

struct HubState {
    now_ms: u64,
    next_seq: u64,
    next_id: u64,
    queue: BinaryHeap<Reverse<Event>>,
    faces: Vec<FaceRecord>,
    pit: HashMap<u64, PitEntry>,
    wire_format: TlvWireFormat,
}

fn schedule(state: &mut HubState, delay_ms: u64, action: Action) {
    let event = Event {
        due_ms: state.now_ms + delay_ms,
        seq: state.next_seq,
        action,
    };
    state.next_seq += 1;
    state.queue.push(Reverse(event));
}

pub struct Hub {
    state: Rc<RefCell<HubState>>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(HubState {
                now_ms: 0,
                next_seq: 0,
                next_id: 1,
                queue: BinaryHeap::new(),
                faces: Vec::new(),
                pit: HashMap::new(),
                wire_format: TlvWireFormat::with_seed(99),
            })),
        }
    }

    pub fn create_face(&self) -> Rc<HubFace> {
        let index = {
            let mut state = self.state.borrow_mut();
            state.faces.push(FaceRecord {
                registrations: Vec::new(),
            });
            state.faces.len() - 1
        };
        Rc::new(HubFace {
            state: Rc::clone(&self.state),
            index,
        })
    }

    pub fn now_ms(&self) -> u64 {
        self.state.borrow().now_ms
    }

    /// Run the virtual clock forward, draining every due event in order.
    pub fn advance(&self, ms: u64) {
        let until = self.state.borrow().now_ms + ms;
        loop {
            let event = {
                let mut state = self.state.borrow_mut();
                match state.queue.peek() {
                    Some(Reverse(event)) if event.due_ms <= until => {
                        let Reverse(event) =
                            state.queue.pop().expect("peeked event vanished");
                        state.now_ms = event.due_ms;
                        Some(event)
                    },
                    _ => None,
                }
            };
            let Some(event) = event else { break };
            self.dispatch(event.action);
        }
        self.state.borrow_mut().now_ms = until;
    }

    fn dispatch(&self, action: Action) {
        match action {
            Action::DeliverInterest { to_face, interest } => {
                let handlers: Vec<(Name, Rc<RefCell<OnInterest>>)> = {
                    let state = self.state.borrow();
                    let Some(record) = state.faces.get(to_face) else {
                        return;
                    };
                    record
                        .registrations
                        .iter()
                        .filter(|r| r.prefix.is_prefix_of(interest.name()))
                        .map(|r| (r.prefix.clone(), Rc::clone(&r.handler)))
                        .collect()
                };
                for (prefix, handler) in handlers {
                    (handler.borrow_mut())(&prefix, &interest);
                }
            },
            Action::DeliverData { pit_id, data } => {
                let entry = self.state.borrow_mut().pit.remove(&pit_id);
                if let Some(entry) = entry
                    && !entry.removed
                {
                    (entry.on_data.borrow_mut())(&entry.interest, &data);
                }
            },
            Action::Timeout { pit_id } => {
                let entry = {
                    let mut state = self.state.borrow_mut();
                    // a satisfied entry is consumed by its data event
                    let fires = state
                        .pit
                        .get(&pit_id)
                        .is_some_and(|e| !e.satisfied && !e.removed);
                    let was_removed =
                        state.pit.get(&pit_id).is_some_and(|e| e.removed);
                    if fires {
                        state.pit.remove(&pit_id)
                    } else {
                        if was_removed {
                            state.pit.remove(&pit_id);
                        }
                        None
                    }
                };
                if let Some(entry) = entry {
                    (entry.on_timeout.borrow_mut())(&entry.interest);
                }
            },
            Action::Closure(callback) => callback(),
        }
    }
}

pub struct HubFace {
    state: Rc<RefCell<HubState>>,
    index: usize,
}

impl Face for HubFace {
    fn express_interest(
        &self,
        interest: Interest,
        on_data: OnData,
        on_timeout: OnTimeout,
    ) -> Result<InterestId> {
        let mut state = self.state.borrow_mut();

        // every hop goes through the real codec
        let (wire, _) = state
            .wire_format
            .encode_interest(&interest)
            .map_err(|e| anyhow!("encode interest: {e}"))?;
        let (normalized, _) = state
            .wire_format
            .decode_interest(&wire, true)
            .map_err(|e| anyhow!("decode interest: {e}"))?;

        let id = state.next_id;
        state.next_id += 1;
        let lifetime = normalized
            .lifetime_ms()
            .unwrap_or(DEFAULT_INTEREST_LIFETIME_MS);

        state.pit.insert(id, PitEntry {
            face_index: self.index,
            interest: normalized.clone(),
            on_data: Rc::new(RefCell::new(on_data)),
            on_timeout: Rc::new(RefCell::new(on_timeout)),
            satisfied: false,
            removed: false,
        });

        for to_face in 0..state.faces.len() {
            if to_face != self.index {
                schedule(&mut state, LINK_LATENCY_MS, Action::DeliverInterest {
                    to_face,
                    interest: normalized.clone(),
                });
            }
        }
        schedule(&mut state, lifetime, Action::Timeout { pit_id: id });
        Ok(id)
    }

    fn remove_pending_interest(&self, id: InterestId) {
        if let Some(entry) = self.state.borrow_mut().pit.get_mut(&id) {
            entry.removed = true;
        }
    }

    fn register_prefix(
        &self,
        prefix: Name,
        on_interest: OnInterest,
    ) -> Result<PrefixId> {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.faces[self.index].registrations.push(Registration {
            id,
            prefix,
            handler: Rc::new(RefCell::new(on_interest)),
        });
        Ok(id)
    }

    fn remove_registered_prefix(&self, id: PrefixId) {
        let mut state = self.state.borrow_mut();
        for face in &mut state.faces {
            face.registrations.retain(|r| r.id != id);
        }
    }

    fn put_data(&self, data: &Data) -> Result<()> {
        let mut state = self.state.borrow_mut();

        let (wire, _) = state
            .wire_format
            .encode_data(data)
            .map_err(|e| anyhow!("encode data: {e}"))?;
        let (normalized, _) = state
            .wire_format
            .decode_data(&wire, true)
            .map_err(|e| anyhow!("decode data: {e}"))?;

        let satisfied: Vec<u64> = state
            .pit
            .iter()
            .filter(|(_, entry)| {
                !entry.satisfied
                    && !entry.removed
                    && entry.face_index != self.index
                    && entry.interest.name().is_prefix_of(normalized.name())
            })
            .map(|(id, _)| *id)
            .collect();

        for pit_id in satisfied {
            if let Some(entry) = state.pit.get_mut(&pit_id) {
                entry.satisfied = true;
            }
            schedule(&mut state, LINK_LATENCY_MS, Action::DeliverData {
                pit_id,
                data: normalized.clone(),
            });
        }
        // unsolicited data is dropped, as a real forwarder would
        Ok(())
    }

    fn call_later(&self, delay_ms: u64, callback: Box<dyn FnOnce()>) {
        let mut state = self.state.borrow_mut();
        schedule(&mut state, delay_ms, Action::Closure(callback));
    }

    fn now_ms(&self) -> u64 {
        self.state.borrow().now_ms
    }
}
