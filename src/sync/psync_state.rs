// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The PSync sync-data payload: an ordered sequence of Names wrapped in
//! one outer TLV.

use bytes::Bytes;

use crate::{
    codec::{decoder::TlvDecoder, encoder::TlvEncoder, error::CodecError},
    packet::{name::Name, tlv, wire::TlvWireFormat},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PSyncState {
    names: Vec<Name>,
}

impl PSyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names(names: Vec<Name>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[Name] {
        &self.names
    }

    pub fn add_name(&mut self, name: Name) -> &mut Self {
        self.names.push(name);
        self
    }

    pub fn encode(&self, wire_format: &TlvWireFormat) -> Bytes {
        let mut encoder = TlvEncoder::new(256);
        let save = encoder.len();
        for name in self.names.iter().rev() {
            encoder.write_bytes(&wire_format.encode_name(name));
        }
        encoder.write_type_and_length(tlv::PSYNC_CONTENT, (encoder.len() - save) as u64);
        encoder.finish()
    }

    pub fn decode(
        input: &Bytes,
        wire_format: &TlvWireFormat,
    ) -> Result<Self, CodecError> {
        let mut decoder = TlvDecoder::new(input);
        let end = decoder.read_nested_tlvs_start(tlv::PSYNC_CONTENT)?;
        let mut state = PSyncState::new();
        while decoder.offset() < end {
            let begin = decoder.offset();
            let length = decoder.read_type_and_length(tlv::NAME)? as usize;
            decoder.seek(decoder.offset() + length);
            let name_wire = input.slice(begin..decoder.offset());
            state.add_name(wire_format.decode_name(&name_wire, true)?);
        }
        decoder.finish_nested_tlvs(end)?;
        Ok(state)
    }
}
