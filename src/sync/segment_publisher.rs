// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Splits a large sync payload into signed, versioned segments backed by
//! a freshness-bounded in-memory store.
//!
//! Only the segment the triggering interest asked for goes to the face
//! immediately; the rest wait in the store for follow-up interests. Every
//! stored segment schedules its own eviction closure when inserted.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use anyhow::Result;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    codec::MAX_NDN_PACKET_SIZE,
    face::Face,
    packet::{data::Data, name::Name, wire::TlvWireFormat},
    security::KeyChain,
};

/// Payloads above this size are split across several segments.
pub const MAX_SEGMENT_PAYLOAD: usize = MAX_NDN_PACKET_SIZE / 2;

struct Store {
    segments: Vec<(u64, Data)>,
    next_id: u64,
}

pub struct SegmentPublisher {
    face: Rc<dyn Face>,
    key_chain: Rc<dyn KeyChain>,
    wire_format: Rc<TlvWireFormat>,
    store: Rc<RefCell<Store>>,
}

impl SegmentPublisher {
    pub fn new(
        face: Rc<dyn Face>,
        key_chain: Rc<dyn KeyChain>,
        wire_format: Rc<TlvWireFormat>,
    ) -> Self {
        Self {
            face,
            key_chain,
            wire_format,
            store: Rc::new(RefCell::new(Store {
                segments: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Serve `interest_name` from the store. Matches by prefix, so both a
    /// bare data name and a full `<name>/<version>/<segment>` hit.
    pub fn reply_from_store(&self, interest_name: &Name) -> bool {
        let store = self.store.borrow();
        let Some((_, data)) = store
            .segments
            .iter()
            .find(|(_, data)| interest_name.is_prefix_of(data.name()))
        else {
            return false;
        };
        if let Err(e) = self.face.put_data(data) {
            warn!("failed to reply from the segment store: {e}");
        }
        true
    }

    /// Segment `content` under `<data_name>/<version>/<segmentNo>`,
    /// pushing only the segment `interest_name` asked for and storing the
    /// rest for `freshness_ms`.
    pub fn publish(
        &self,
        data_name: &Name,
        interest_name: &Name,
        content: &Bytes,
        freshness_ms: u64,
    ) -> Result<()> {
        let version = self.face.now_ms();
        let chunks: Vec<&[u8]> = if content.is_empty() {
            vec![&content[..]]
        } else {
            content.chunks(MAX_SEGMENT_PAYLOAD).collect()
        };
        let final_segment = (chunks.len() - 1) as u64;

        // which segment the interest wants; a bare prefix means the first
        let requested_segment = interest_name
            .get(-1)
            .and_then(|c| c.to_segment().ok())
            .unwrap_or(0);

        for (segment_no, chunk) in chunks.into_iter().enumerate() {
            let segment_no = segment_no as u64;
            let mut name = data_name.clone();
            name.append_version(version).append_segment(segment_no);

            let mut data = Data::new(name);
            data.set_content(Bytes::copy_from_slice(chunk));
            data.meta_info_mut()
                .set_freshness_period_ms(Some(freshness_ms))
                .set_final_block_id(Some(
                    crate::packet::name::NameComponent::from_segment(final_segment),
                ));
            self.key_chain.sign(&mut data, &self.wire_format)?;

            if segment_no == requested_segment {
                self.face.put_data(&data)?;
            }
            self.insert(data, freshness_ms);
        }
        Ok(())
    }

    fn insert(&self, data: Data, freshness_ms: u64) {
        let id = {
            let mut store = self.store.borrow_mut();
            let id = store.next_id;
            store.next_id += 1;
            store.segments.push((id, data));
            id
        };

        let weak: Weak<RefCell<Store>> = Rc::downgrade(&self.store);
        self.face.call_later(
            freshness_ms,
            Box::new(move || {
                if let Some(store) = weak.upgrade() {
                    debug!(id, "evicting stale segment");
                    store.borrow_mut().segments.retain(|(i, _)| *i != id);
                }
            }),
        );
    }
}
