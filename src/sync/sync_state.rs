// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The SyncState message: the payload of ChronoSync data packets.
//!
//! A message is one outer TLV holding a repeated `ss` field, one entry per
//! participant update. The entry types live in the application-reserved
//! range.

use bytes::Bytes;

use crate::codec::{decoder::TlvDecoder, encoder::TlvEncoder, error::CodecError};

pub const SYNC_STATE_MSG: u64 = 130;
pub const SYNC_STATE: u64 = 131;
const SYNC_STATE_ACTION: u64 = 132;
const SYNC_STATE_SESSION_NO: u64 = 133;
const SYNC_STATE_SEQUENCE_NO: u64 = 134;
const SYNC_STATE_PREFIX: u64 = 135;

/// Action carried by a SyncState entry. Only `Update` is produced; other
/// codes round-trip so a newer peer does not break us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStateAction {
    Update,
    Other(u64),
}

impl SyncStateAction {
    pub fn code(self) -> u64 {
        match self {
            SyncStateAction::Update => 0,
            SyncStateAction::Other(code) => code,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            0 => SyncStateAction::Update,
            other => SyncStateAction::Other(other),
        }
    }
}

/// One participant update: `(dataPrefixUri, sessionNo, sequenceNo)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub data_prefix_uri: String,
    pub session_no: u64,
    pub sequence_no: u64,
    pub action: SyncStateAction,
}

impl SyncState {
    pub fn update(data_prefix_uri: String, session_no: u64, sequence_no: u64) -> Self {
        Self {
            data_prefix_uri,
            session_no,
            sequence_no,
            action: SyncStateAction::Update,
        }
    }
}

/// Encode a batch of updates as one SyncStateMsg TLV.
pub fn encode_sync_state_msg(states: &[SyncState]) -> Bytes {
    let mut encoder = TlvEncoder::new(256);
    let save = encoder.len();
    for state in states.iter().rev() {
        let entry_save = encoder.len();
        encoder.write_non_negative_integer_tlv(
            SYNC_STATE_SEQUENCE_NO,
            state.sequence_no,
        );
        encoder
            .write_non_negative_integer_tlv(SYNC_STATE_SESSION_NO, state.session_no);
        encoder.write_non_negative_integer_tlv(SYNC_STATE_ACTION, state.action.code());
        encoder.write_blob_tlv(SYNC_STATE_PREFIX, state.data_prefix_uri.as_bytes());
        encoder.write_type_and_length(SYNC_STATE, (encoder.len() - entry_save) as u64);
    }
    encoder.write_type_and_length(SYNC_STATE_MSG, (encoder.len() - save) as u64);
    encoder.finish()
}

pub fn decode_sync_state_msg(input: &[u8]) -> Result<Vec<SyncState>, CodecError> {
    let mut decoder = TlvDecoder::new(input);
    let end = decoder.read_nested_tlvs_start(SYNC_STATE_MSG)?;
    let mut states = Vec::new();
    while decoder.peek_type(SYNC_STATE, end) {
        let entry_end = decoder.read_nested_tlvs_start(SYNC_STATE)?;
        let prefix = decoder.read_blob_tlv(SYNC_STATE_PREFIX)?;
        let data_prefix_uri = String::from_utf8(prefix.to_vec()).map_err(|_| {
            CodecError::InvalidEncoding("SyncState prefix is not UTF-8".to_string())
        })?;
        let action = SyncStateAction::from_code(
            decoder.read_non_negative_integer_tlv(SYNC_STATE_ACTION)?,
        );
        let session_no =
            decoder.read_non_negative_integer_tlv(SYNC_STATE_SESSION_NO)?;
        let sequence_no =
            decoder.read_non_negative_integer_tlv(SYNC_STATE_SEQUENCE_NO)?;
        decoder.finish_nested_tlvs(entry_end)?;
        states.push(SyncState {
            data_prefix_uri,
            session_no,
            sequence_no,
            action,
        });
    }
    decoder.finish_nested_tlvs(end)?;
    Ok(states)
}
