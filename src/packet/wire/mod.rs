// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Structural encode/decode of whole packets in the NDN-TLV format.
//!
//! [`TlvWireFormat`] is an explicit context object: it owns the RNG used
//! for generated nonces, so deterministic tests construct it with a seed
//! instead of patching a global. Decoders take a `copy` flag; with
//! `copy = false` the decoded blobs are zero-copy slices sharing the input
//! buffer.

mod data;
mod interest;
mod name;

use std::cell::RefCell;

use bytes::Bytes;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    codec::{decoder::TlvDecoder, encoder::TlvEncoder, error::CodecError},
    packet::{
        data::Data,
        interest::Interest,
        name::Name,
        signature::KeyLocator,
        tlv,
    },
};

/// Forward byte range of the signed portion inside an encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedPortion {
    pub begin: usize,
    pub end: usize,
}

pub struct TlvWireFormat {
    rng: RefCell<StdRng>,
}

impl Default for TlvWireFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl TlvWireFormat {
    pub fn new() -> Self {
        Self {
            rng: RefCell::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic instance for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// 4 fresh random bytes for an Interest nonce.
    pub fn random_nonce(&self) -> [u8; 4] {
        let mut nonce = [0u8; 4];
        self.rng.borrow_mut().fill(&mut nonce[..]);
        nonce
    }

    pub(crate) fn random_u64(&self) -> u64 {
        self.rng.borrow_mut().random()
    }

    pub fn encode_name(&self, name: &Name) -> Bytes {
        let mut encoder = TlvEncoder::new(128);
        name::encode_name(&mut encoder, name);
        encoder.finish()
    }

    pub fn decode_name(&self, input: &Bytes, copy: bool) -> Result<Name, CodecError> {
        let mut decoder = TlvDecoder::new(input);
        let (name, ..) = name::decode_name(&mut decoder, input, copy)?;
        Ok(name)
    }

    /// Encode an Interest, generating (or padding/truncating) the nonce to
    /// exactly 4 bytes. Returns the encoding and the signed-interest
    /// range in forward offsets.
    pub fn encode_interest(
        &self,
        interest: &Interest,
    ) -> Result<(Bytes, SignedPortion), CodecError> {
        interest::encode_interest(self, interest)
    }

    pub fn decode_interest(
        &self,
        input: &Bytes,
        copy: bool,
    ) -> Result<(Interest, SignedPortion), CodecError> {
        interest::decode_interest(input, copy)
    }

    /// Encode a Data packet. The signed portion runs from the first child
    /// of Data through the end of SignatureInfo.
    pub fn encode_data(
        &self,
        data: &Data,
    ) -> Result<(Bytes, SignedPortion), CodecError> {
        data::encode_data(data)
    }

    pub fn decode_data(
        &self,
        input: &Bytes,
        copy: bool,
    ) -> Result<(Data, SignedPortion), CodecError> {
        data::decode_data(input, copy)
    }
}

/// Slice `begin..end` of the input, sharing or copying per `copy`.
pub(super) fn to_blob(input: &Bytes, begin: usize, end: usize, copy: bool) -> Bytes {
    if copy {
        Bytes::copy_from_slice(&input[begin..end])
    } else {
        input.slice(begin..end)
    }
}

/// Encode a KeyLocator under the given outer type (KeyLocator proper, or
/// PublisherPublicKeyLocator inside Selectors).
pub(super) fn encode_key_locator(
    encoder: &mut TlvEncoder,
    outer_type: u64,
    key_locator: &KeyLocator,
) {
    let save = encoder.len();
    match key_locator {
        KeyLocator::KeyName(name) => {
            name::encode_name(encoder, name);
        },
        KeyLocator::KeyDigest(digest) => {
            encoder.write_blob_tlv(tlv::KEY_LOCATOR_DIGEST, digest);
        },
    }
    encoder.write_type_and_length(outer_type, (encoder.len() - save) as u64);
}

pub(super) fn decode_key_locator(
    decoder: &mut TlvDecoder,
    outer_type: u64,
    input: &Bytes,
    copy: bool,
) -> Result<KeyLocator, CodecError> {
    let end = decoder.read_nested_tlvs_start(outer_type)?;
    let key_locator = if decoder.peek_type(tlv::NAME, end) {
        let (name, ..) = name::decode_name(decoder, input, copy)?;
        KeyLocator::KeyName(name)
    } else if decoder.peek_type(tlv::KEY_LOCATOR_DIGEST, end) {
        let begin = {
            let digest = decoder.read_blob_tlv(tlv::KEY_LOCATOR_DIGEST)?;
            decoder.offset() - digest.len()
        };
        KeyLocator::KeyDigest(to_blob(input, begin, decoder.offset(), copy))
    } else {
        return Err(CodecError::InvalidEncoding(
            "KeyLocator holds neither a Name nor a KeyLocatorDigest".to_string(),
        ));
    };
    decoder.finish_nested_tlvs(end)?;
    Ok(key_locator)
}
