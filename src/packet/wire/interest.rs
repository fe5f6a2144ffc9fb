// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::{
    codec::{decoder::TlvDecoder, encoder::TlvEncoder, error::CodecError},
    packet::{
        interest::{Exclude, ExcludeEntry, Interest},
        name::{ComponentType, NameComponent},
        tlv,
        wire::{
            SignedPortion, TlvWireFormat, decode_key_locator, encode_key_locator,
            name, to_blob,
        },
    },
};

pub(super) fn encode_interest(
    wire_format: &TlvWireFormat,
    interest: &Interest,
) -> Result<(Bytes, SignedPortion), CodecError> {
    let mut encoder = TlvEncoder::new(256);
    let save = encoder.len();

    encoder.write_optional_non_negative_integer_tlv(
        tlv::SELECTED_DELEGATION,
        interest.selected_delegation_index(),
    );
    if interest.selected_delegation_index().is_some()
        && interest.link_wire_encoding().is_none()
    {
        return Err(CodecError::InvalidCombination(
            "selected delegation index without a Link",
        ));
    }
    if let Some(link) = interest.link_wire_encoding() {
        // the Link is a pre-encoded Data packet, emitted verbatim
        encoder.write_bytes(link);
    }
    encoder.write_optional_non_negative_integer_tlv(
        tlv::INTEREST_LIFETIME,
        interest.lifetime_ms(),
    );

    let mut nonce = [0u8; 4];
    let given = interest.nonce();
    if given.len() >= 4 {
        nonce.copy_from_slice(&given[..4]);
    } else {
        nonce = wire_format.random_nonce();
        nonce[..given.len()].copy_from_slice(given);
    }
    encoder.write_blob_tlv(tlv::NONCE, &nonce);

    if interest.has_selectors() {
        encode_selectors(&mut encoder, interest);
    }

    let (signed_begin_from_tail, signed_end_from_tail) =
        name::encode_name(&mut encoder, interest.name());

    encoder.write_type_and_length(tlv::INTEREST, (encoder.len() - save) as u64);

    let total = encoder.len();
    let signed = SignedPortion {
        begin: total - signed_begin_from_tail,
        end: total - signed_end_from_tail,
    };
    Ok((encoder.finish(), signed))
}

pub(super) fn decode_interest(
    input: &Bytes,
    copy: bool,
) -> Result<(Interest, SignedPortion), CodecError> {
    let mut decoder = TlvDecoder::new(input);
    let end = decoder.read_nested_tlvs_start(tlv::INTEREST)?;

    let (name, signed_begin, signed_end) =
        name::decode_name(&mut decoder, input, copy)?;
    let mut interest = Interest::new(name);

    if decoder.peek_type(tlv::SELECTORS, end) {
        decode_selectors(&mut decoder, &mut interest, input, copy)?;
    }

    let nonce = {
        let value = decoder.read_blob_tlv(tlv::NONCE)?;
        let begin = decoder.offset() - value.len();
        to_blob(input, begin, decoder.offset(), copy)
    };
    interest.set_nonce(nonce);

    interest.set_lifetime_ms(
        decoder.read_optional_non_negative_integer_tlv(tlv::INTEREST_LIFETIME, end)?,
    );

    if decoder.peek_type(tlv::DATA, end) {
        // the Link is carried as a whole nested Data packet
        let (_, begin) = decoder.skip_tlv()?;
        interest
            .set_link_wire_encoding(Some(to_blob(input, begin, decoder.offset(), copy)));
    }
    interest.set_selected_delegation_index(
        decoder
            .read_optional_non_negative_integer_tlv(tlv::SELECTED_DELEGATION, end)?,
    );
    if interest.selected_delegation_index().is_some()
        && interest.link_wire_encoding().is_none()
    {
        return Err(CodecError::InvalidCombination(
            "selected delegation index without a Link",
        ));
    }

    decoder.finish_nested_tlvs(end)?;
    Ok((interest, SignedPortion {
        begin: signed_begin,
        end: signed_end,
    }))
}

fn encode_selectors(encoder: &mut TlvEncoder, interest: &Interest) {
    let save = encoder.len();

    encoder.write_boolean_tlv(tlv::MUST_BE_FRESH, interest.must_be_fresh());
    encoder.write_optional_non_negative_integer_tlv(
        tlv::CHILD_SELECTOR,
        interest.child_selector(),
    );
    if !interest.exclude().is_empty() {
        encode_exclude(encoder, interest.exclude());
    }
    if let Some(key_locator) = interest.key_locator() {
        encode_key_locator(encoder, tlv::PUBLISHER_PUBLIC_KEY_LOCATOR, key_locator);
    }
    encoder.write_optional_non_negative_integer_tlv(
        tlv::MAX_SUFFIX_COMPONENTS,
        interest.max_suffix_components(),
    );
    encoder.write_optional_non_negative_integer_tlv(
        tlv::MIN_SUFFIX_COMPONENTS,
        interest.min_suffix_components(),
    );

    encoder.write_type_and_length(tlv::SELECTORS, (encoder.len() - save) as u64);
}

fn decode_selectors(
    decoder: &mut TlvDecoder,
    interest: &mut Interest,
    input: &Bytes,
    copy: bool,
) -> Result<(), CodecError> {
    let end = decoder.read_nested_tlvs_start(tlv::SELECTORS)?;

    interest.set_min_suffix_components(
        decoder
            .read_optional_non_negative_integer_tlv(tlv::MIN_SUFFIX_COMPONENTS, end)?,
    );
    interest.set_max_suffix_components(
        decoder
            .read_optional_non_negative_integer_tlv(tlv::MAX_SUFFIX_COMPONENTS, end)?,
    );

    if decoder.peek_type(tlv::PUBLISHER_PUBLIC_KEY_LOCATOR, end) {
        interest.set_key_locator(Some(decode_key_locator(
            decoder,
            tlv::PUBLISHER_PUBLIC_KEY_LOCATOR,
            input,
            copy,
        )?));
    }

    if decoder.peek_type(tlv::EXCLUDE, end) {
        decode_exclude(decoder, interest.exclude_mut(), input, copy)?;
    }

    interest.set_child_selector(
        decoder.read_optional_non_negative_integer_tlv(tlv::CHILD_SELECTOR, end)?,
    );
    interest.set_must_be_fresh(decoder.read_boolean_tlv(tlv::MUST_BE_FRESH, end)?);

    decoder.finish_nested_tlvs(end)
}

fn encode_exclude(encoder: &mut TlvEncoder, exclude: &Exclude) {
    let save = encoder.len();
    for entry in exclude.entries().iter().rev() {
        match entry {
            ExcludeEntry::Any => encoder.write_type_and_length(tlv::ANY, 0),
            ExcludeEntry::Component(component) => encoder.write_blob_tlv(
                component.component_type().type_number(),
                component.value(),
            ),
        }
    }
    encoder.write_type_and_length(tlv::EXCLUDE, (encoder.len() - save) as u64);
}

fn decode_exclude(
    decoder: &mut TlvDecoder,
    exclude: &mut Exclude,
    input: &Bytes,
    copy: bool,
) -> Result<(), CodecError> {
    let end = decoder.read_nested_tlvs_start(tlv::EXCLUDE)?;
    exclude.clear();
    while decoder.offset() < end {
        if decoder.peek_type(tlv::ANY, end) {
            let length = decoder.read_type_and_length(tlv::ANY)?;
            decoder.seek(decoder.offset() + length as usize);
            exclude.append_any();
        } else if decoder.peek_type(tlv::NAME_COMPONENT, end) {
            let value = decoder.read_blob_tlv(tlv::NAME_COMPONENT)?;
            let begin = decoder.offset() - value.len();
            exclude.append_component(NameComponent::with_type(
                to_blob(input, begin, decoder.offset(), copy),
                ComponentType::Generic,
            ));
        } else if decoder.peek_type(tlv::IMPLICIT_SHA256_DIGEST_COMPONENT, end) {
            let value =
                decoder.read_blob_tlv(tlv::IMPLICIT_SHA256_DIGEST_COMPONENT)?;
            let begin = decoder.offset() - value.len();
            exclude.append_component(NameComponent::with_type(
                to_blob(input, begin, decoder.offset(), copy),
                ComponentType::ImplicitSha256Digest,
            ));
        } else {
            break;
        }
    }
    decoder.finish_nested_tlvs(end)
}
