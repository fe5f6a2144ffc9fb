// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::{
    codec::{
        decoder::{self, TlvDecoder},
        encoder::TlvEncoder,
        error::CodecError,
    },
    packet::{
        name::{ComponentType, Name, NameComponent},
        tlv,
        wire::to_blob,
    },
};

/// Write the Name TLV backward, returning the bytes-from-tail positions of
/// the first component and of the start of the last component (the
/// signed-interest range endpoints).
pub(super) fn encode_name(encoder: &mut TlvEncoder, name: &Name) -> (usize, usize) {
    let save = encoder.len();
    let mut signed_end_from_tail = save;
    for (i, component) in name.components().iter().enumerate().rev() {
        encoder.write_blob_tlv(
            component.component_type().type_number(),
            component.value(),
        );
        if i + 1 == name.size() {
            signed_end_from_tail = encoder.len();
        }
    }
    let signed_begin_from_tail = encoder.len();
    encoder.write_type_and_length(tlv::NAME, (encoder.len() - save) as u64);
    (signed_begin_from_tail, signed_end_from_tail)
}

/// Decode a Name TLV, returning the forward offsets of the first component
/// and of the start of the last component.
pub(super) fn decode_name(
    decoder: &mut TlvDecoder,
    input: &Bytes,
    copy: bool,
) -> Result<(Name, usize, usize), CodecError> {
    let end = decoder.read_nested_tlvs_start(tlv::NAME)?;
    let mut name = Name::new();
    let signed_begin = decoder.offset();
    let mut signed_end = decoder.offset();

    while decoder.offset() < end {
        let component_begin = decoder.offset();
        let ty = decoder.read_var_number()?;
        let length = decoder.read_var_number()? as usize;
        let value_begin = decoder.offset();
        let value_end = value_begin + length;
        if value_end > end {
            return Err(CodecError::InvalidEncoding(format!(
                "name component length {length} exceeds the Name TLV"
            )));
        }
        decoder.seek(value_end);

        let component_type = match ty {
            tlv::NAME_COMPONENT => ComponentType::Generic,
            tlv::IMPLICIT_SHA256_DIGEST_COMPONENT => {
                ComponentType::ImplicitSha256Digest
            },
            other if decoder::is_ignorable(other) => continue,
            other => return Err(CodecError::UnexpectedType(other)),
        };
        signed_end = component_begin;
        name.append(NameComponent::with_type(
            to_blob(input, value_begin, value_end, copy),
            component_type,
        ));
    }

    decoder.finish_nested_tlvs(end)?;
    Ok((name, signed_begin, signed_end))
}
