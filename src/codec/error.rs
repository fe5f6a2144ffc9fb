// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

/// Error taxonomy of the TLV codec and the structures layered on it.
///
/// Codec entry points return these directly; the sync engines treat them as
/// per-packet failures (log and drop) and never let them escape the event
/// loop.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Truncated input, malformed var-number, a type that differs from the
    /// one the caller demanded, or a declared length past its scope.
    #[error("invalid TLV encoding: {0}")]
    InvalidEncoding(String),

    /// An unknown TLV type the decoder may not skip under the
    /// critical-type rule (see [`TlvDecoder::finish_nested_tlvs`]).
    ///
    /// [`TlvDecoder::finish_nested_tlvs`]: crate::codec::decoder::TlvDecoder::finish_nested_tlvs
    #[error("unexpected critical TLV type {0}")]
    UnexpectedType(u64),

    /// The inflated IBLT wire image has the wrong size, or a difference
    /// exceeded the decoding capacity.
    #[error("cannot decode IBLT: {0}")]
    IbltDecode(String),

    /// An element stream exceeded the packet-size bound.
    #[error("packet of {size} bytes exceeds the {limit}-byte limit")]
    PacketTooLarge { size: usize, limit: usize },

    /// Fields that are only valid together arrived apart, e.g. a selected
    /// delegation index without a Link.
    #[error("invalid field combination: {0}")]
    InvalidCombination(&'static str),

    /// A SignatureType code that cannot be re-encoded.
    #[error("unsupported SignatureType {0}")]
    SignatureUnsupported(u64),

    /// A Face timeout surfaced at the sync level.
    #[error("interest timed out: {0}")]
    Timeout(String),
}
