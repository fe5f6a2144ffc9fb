// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Backward-building TLV encoder.
//!
//! Children are emitted before their enclosing `type + length` header, so a
//! nested structure is written leaf-first and no sizes are pre-computed:
//!
//! ```text
//! let save = encoder.len();
//! ...write the children...
//! encoder.write_type_and_length(ty, (encoder.len() - save) as u64);
//! ```
//!
//! Saved positions are measured in bytes-from-the-tail; after [`finish`]
//! the forward offset of a saved position is `total_len - saved`.
//!
//! [`finish`]: TlvEncoder::finish

use bytes::Bytes;

pub struct TlvEncoder {
    buffer: Vec<u8>,
    /// Bytes written so far, counted from the tail of `buffer`.
    length: usize,
}

impl TlvEncoder {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; initial_capacity.max(16)],
            length: 0,
        }
    }

    /// Number of bytes written so far.
    ///
    /// Callers snapshot this before writing a nested scope and use the
    /// difference as the scope's length.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn grow(&mut self, additional: usize) {
        let needed = self.length + additional;
        if needed <= self.buffer.len() {
            return;
        }
        let new_size = needed.max(self.buffer.len() * 2);
        let mut bigger = vec![0u8; new_size];
        let old_start = self.buffer.len() - self.length;
        bigger[new_size - self.length..].copy_from_slice(&self.buffer[old_start..]);
        self.buffer = bigger;
    }

    /// Prepend one byte.
    pub fn write_u8(&mut self, value: u8) {
        self.grow(1);
        let at = self.buffer.len() - self.length - 1;
        self.buffer[at] = value;
        self.length += 1;
    }

    /// Prepend a byte slice verbatim.
    pub fn write_bytes(&mut self, value: &[u8]) {
        if value.is_empty() {
            return;
        }
        self.grow(value.len());
        let end = self.buffer.len() - self.length;
        self.buffer[end - value.len()..end].copy_from_slice(value);
        self.length += value.len();
    }

    pub fn write_var_number(&mut self, value: u64) {
        if value < 253 {
            self.write_u8(value as u8);
        } else if value <= 0xffff {
            self.write_bytes(&(value as u16).to_be_bytes());
            self.write_u8(253);
        } else if value <= 0xffff_ffff {
            self.write_bytes(&(value as u32).to_be_bytes());
            self.write_u8(254);
        } else {
            self.write_bytes(&value.to_be_bytes());
            self.write_u8(255);
        }
    }

    /// Prepend a `type || length` header for a value already written.
    pub fn write_type_and_length(&mut self, ty: u64, length: u64) {
        // backward: length first so that type comes first on the wire
        self.write_var_number(length);
        self.write_var_number(ty);
    }

    pub fn write_blob_tlv(&mut self, ty: u64, value: &[u8]) {
        self.write_bytes(value);
        self.write_type_and_length(ty, value.len() as u64);
    }

    /// Skips `None` and the empty blob.
    pub fn write_optional_blob_tlv(&mut self, ty: u64, value: Option<&[u8]>) {
        if let Some(v) = value
            && !v.is_empty()
        {
            self.write_blob_tlv(ty, v);
        }
    }

    /// Big-endian, smallest of the 1/2/4/8-byte widths that fits.
    pub fn write_non_negative_integer(&mut self, value: u64) {
        if value <= 0xff {
            self.write_u8(value as u8);
        } else if value <= 0xffff {
            self.write_bytes(&(value as u16).to_be_bytes());
        } else if value <= 0xffff_ffff {
            self.write_bytes(&(value as u32).to_be_bytes());
        } else {
            self.write_bytes(&value.to_be_bytes());
        }
    }

    pub fn write_non_negative_integer_tlv(&mut self, ty: u64, value: u64) {
        let save = self.length;
        self.write_non_negative_integer(value);
        self.write_type_and_length(ty, (self.length - save) as u64);
    }

    pub fn write_optional_non_negative_integer_tlv(
        &mut self,
        ty: u64,
        value: Option<u64>,
    ) {
        if let Some(v) = value {
            self.write_non_negative_integer_tlv(ty, v);
        }
    }

    /// A zero-length TLV whose presence means `true`; `false` writes nothing.
    pub fn write_boolean_tlv(&mut self, ty: u64, value: bool) {
        if value {
            self.write_type_and_length(ty, 0);
        }
    }

    /// Consume the encoder and return the encoding.
    pub fn finish(mut self) -> Bytes {
        let start = self.buffer.len() - self.length;
        self.buffer.drain(..start);
        Bytes::from(self.buffer)
    }
}
