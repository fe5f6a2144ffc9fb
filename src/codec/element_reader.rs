// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Turns an arbitrary chunking of a byte stream into discrete TLV
//! elements.
//!
//! When an element completes inside a single chunk it is delivered as a
//! zero-copy slice of that chunk; an element that straddles chunks is
//! accumulated in a partial buffer and delivered from there. The partial
//! buffer is bounded by [`MAX_NDN_PACKET_SIZE`]; exceeding it resets the
//! framer so the next call starts a fresh element.

use bytes::BytesMut;
use tracing::warn;

use crate::codec::{
    MAX_NDN_PACKET_SIZE, error::CodecError, structure_decoder::StructureDecoder,
};

pub trait ElementListener {
    fn on_received_element(&mut self, element: &[u8]);
}

impl<F: FnMut(&[u8])> ElementListener for F {
    fn on_received_element(&mut self, element: &[u8]) {
        self(element)
    }
}

pub struct ElementReader<L> {
    listener: L,
    decoder: StructureDecoder,
    partial: BytesMut,
}

impl<L: ElementListener> ElementReader<L> {
    pub fn new(listener: L) -> Self {
        Self {
            listener,
            decoder: StructureDecoder::new(),
            partial: BytesMut::new(),
        }
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Feed the next chunk of the stream, delivering every element it
    /// completes.
    pub fn on_received_data(&mut self, mut data: &[u8]) -> Result<(), CodecError> {
        while !data.is_empty() {
            let got_end = match self.decoder.find_element_end(data) {
                Ok(got) => got,
                Err(e) => {
                    self.recover();
                    return Err(e);
                },
            };

            if !got_end {
                // the whole chunk was consumed without closing an element
                let size = self.partial.len() + data.len();
                if size > MAX_NDN_PACKET_SIZE {
                    self.recover();
                    return Err(CodecError::PacketTooLarge {
                        size,
                        limit: MAX_NDN_PACKET_SIZE,
                    });
                }
                self.partial.extend_from_slice(data);
                return Ok(());
            }

            // bytes of this chunk that belong to the completed element
            let used = self.decoder.offset() - self.partial.len();
            if self.partial.is_empty() {
                self.listener.on_received_element(&data[..used]);
            } else {
                let size = self.partial.len() + used;
                if size > MAX_NDN_PACKET_SIZE {
                    warn!(size, "dropping oversized element");
                    self.recover();
                    return Err(CodecError::PacketTooLarge {
                        size,
                        limit: MAX_NDN_PACKET_SIZE,
                    });
                }
                self.partial.extend_from_slice(&data[..used]);
                self.listener.on_received_element(&self.partial);
                self.partial.clear();
            }

            data = &data[used..];
            self.decoder.reset();
        }
        Ok(())
    }

    fn recover(&mut self) {
        self.partial.clear();
        self.decoder.reset();
    }
}
