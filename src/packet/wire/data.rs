// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::{
    codec::{decoder::TlvDecoder, encoder::TlvEncoder, error::CodecError},
    packet::{
        data::{ContentType, Data, MetaInfo},
        name::{ComponentType, NameComponent},
        signature::{
            DigestSha256Signature, GenericSignature, HmacWithSha256Signature,
            KeyLocator, Sha256WithEcdsaSignature, Sha256WithRsaSignature, Signature,
            SignatureFields,
        },
        tlv::{self, signature_type},
        wire::{
            SignedPortion, decode_key_locator, encode_key_locator, name, to_blob,
        },
    },
};

pub(super) fn encode_data(data: &Data) -> Result<(Bytes, SignedPortion), CodecError> {
    let mut encoder = TlvEncoder::new(512);
    let save = encoder.len();

    encoder.write_blob_tlv(tlv::SIGNATURE_VALUE, data.signature().signature_value());
    let signed_end_from_tail = encoder.len();

    encode_signature_info(&mut encoder, data.signature())?;
    encoder.write_blob_tlv(tlv::CONTENT, data.content());
    encode_meta_info(&mut encoder, data.meta_info());
    name::encode_name(&mut encoder, data.name());
    let signed_begin_from_tail = encoder.len();

    encoder.write_type_and_length(tlv::DATA, (encoder.len() - save) as u64);

    let total = encoder.len();
    let signed = SignedPortion {
        begin: total - signed_begin_from_tail,
        end: total - signed_end_from_tail,
    };
    Ok((encoder.finish(), signed))
}

pub(super) fn decode_data(
    input: &Bytes,
    copy: bool,
) -> Result<(Data, SignedPortion), CodecError> {
    let mut decoder = TlvDecoder::new(input);
    let end = decoder.read_nested_tlvs_start(tlv::DATA)?;
    let signed_begin = decoder.offset();

    let (name, ..) = name::decode_name(&mut decoder, input, copy)?;
    let mut data = Data::new(name);

    if decoder.peek_type(tlv::META_INFO, end) {
        decode_meta_info(&mut decoder, data.meta_info_mut(), input, copy)?;
    }
    if decoder.peek_type(tlv::CONTENT, end) {
        let value = decoder.read_blob_tlv(tlv::CONTENT)?;
        let begin = decoder.offset() - value.len();
        data.set_content(to_blob(input, begin, decoder.offset(), copy));
    }

    data.set_signature(decode_signature_info(&mut decoder, input, copy)?);
    let signed_end = decoder.offset();

    let signature_value = {
        let value = decoder.read_blob_tlv(tlv::SIGNATURE_VALUE)?;
        let begin = decoder.offset() - value.len();
        to_blob(input, begin, decoder.offset(), copy)
    };
    data.signature_mut().set_signature_value(signature_value);

    decoder.finish_nested_tlvs(end)?;
    Ok((data, SignedPortion {
        begin: signed_begin,
        end: signed_end,
    }))
}

fn encode_meta_info(encoder: &mut TlvEncoder, meta_info: &MetaInfo) {
    let save = encoder.len();

    if let Some(final_block_id) = meta_info.final_block_id() {
        let inner_save = encoder.len();
        encoder.write_blob_tlv(
            final_block_id.component_type().type_number(),
            final_block_id.value(),
        );
        encoder
            .write_type_and_length(tlv::FINAL_BLOCK_ID, (encoder.len() - inner_save) as u64);
    }
    encoder.write_optional_non_negative_integer_tlv(
        tlv::FRESHNESS_PERIOD,
        meta_info.freshness_period_ms(),
    );
    match meta_info.content_type() {
        // the default is omitted on the wire
        ContentType::Blob => {},
        other => {
            encoder.write_non_negative_integer_tlv(tlv::CONTENT_TYPE, other.code());
        },
    }

    encoder.write_type_and_length(tlv::META_INFO, (encoder.len() - save) as u64);
}

fn decode_meta_info(
    decoder: &mut TlvDecoder,
    meta_info: &mut MetaInfo,
    input: &Bytes,
    copy: bool,
) -> Result<(), CodecError> {
    let end = decoder.read_nested_tlvs_start(tlv::META_INFO)?;

    // decode order: LINK, then KEY, otherwise BLOB (or the raw code)
    let content_type = decoder
        .read_optional_non_negative_integer_tlv(tlv::CONTENT_TYPE, end)?
        .map_or(ContentType::Blob, ContentType::from_code);
    meta_info.set_content_type(content_type);

    meta_info.set_freshness_period_ms(
        decoder.read_optional_non_negative_integer_tlv(tlv::FRESHNESS_PERIOD, end)?,
    );

    if decoder.peek_type(tlv::FINAL_BLOCK_ID, end) {
        let inner_end = decoder.read_nested_tlvs_start(tlv::FINAL_BLOCK_ID)?;
        let component = if decoder
            .peek_type(tlv::IMPLICIT_SHA256_DIGEST_COMPONENT, inner_end)
        {
            let value =
                decoder.read_blob_tlv(tlv::IMPLICIT_SHA256_DIGEST_COMPONENT)?;
            let begin = decoder.offset() - value.len();
            NameComponent::with_type(
                to_blob(input, begin, decoder.offset(), copy),
                ComponentType::ImplicitSha256Digest,
            )
        } else {
            let value = decoder.read_blob_tlv(tlv::NAME_COMPONENT)?;
            let begin = decoder.offset() - value.len();
            NameComponent::with_type(
                to_blob(input, begin, decoder.offset(), copy),
                ComponentType::Generic,
            )
        };
        meta_info.set_final_block_id(Some(component));
        decoder.finish_nested_tlvs(inner_end)?;
    }

    decoder.finish_nested_tlvs(end)
}

fn encode_signature_info(
    encoder: &mut TlvEncoder,
    signature: &Signature,
) -> Result<(), CodecError> {
    if let Signature::Generic(generic) = signature {
        if generic.signature_info_encoding.is_empty() {
            return Err(CodecError::SignatureUnsupported(generic.type_code));
        }
        // preserved verbatim, byte-for-byte
        encoder.write_bytes(&generic.signature_info_encoding);
        return Ok(());
    }

    let save = encoder.len();
    if let Some(key_locator) = signature.key_locator() {
        encode_key_locator(encoder, tlv::KEY_LOCATOR, key_locator);
    }
    encoder.write_non_negative_integer_tlv(tlv::SIGNATURE_TYPE, signature.type_code());
    encoder.write_type_and_length(tlv::SIGNATURE_INFO, (encoder.len() - save) as u64);
    Ok(())
}

fn decode_signature_info(
    decoder: &mut TlvDecoder,
    input: &Bytes,
    copy: bool,
) -> Result<Signature, CodecError> {
    let info_begin = decoder.offset();
    let end = decoder.read_nested_tlvs_start(tlv::SIGNATURE_INFO)?;
    let type_code = decoder.read_non_negative_integer_tlv(tlv::SIGNATURE_TYPE)?;

    let signature = match type_code {
        signature_type::DIGEST_SHA256 => {
            Signature::DigestSha256(DigestSha256Signature::default())
        },
        signature_type::SHA256_WITH_RSA => {
            Signature::Sha256WithRsa(Sha256WithRsaSignature {
                key_locator: decode_optional_key_locator(decoder, end, input, copy)?,
                signature: Bytes::new(),
            })
        },
        signature_type::SHA256_WITH_ECDSA => {
            Signature::Sha256WithEcdsa(Sha256WithEcdsaSignature {
                key_locator: decode_optional_key_locator(decoder, end, input, copy)?,
                signature: Bytes::new(),
            })
        },
        signature_type::HMAC_WITH_SHA256 => {
            Signature::HmacWithSha256(HmacWithSha256Signature {
                key_locator: decode_optional_key_locator(decoder, end, input, copy)?,
                signature: Bytes::new(),
            })
        },
        unknown => {
            // sanity-decode the rest, then keep the whole TLV verbatim
            while decoder.offset() < end {
                decoder.skip_tlv()?;
            }
            if decoder.offset() != end {
                return Err(CodecError::InvalidEncoding(
                    "SignatureInfo contents overrun the TLV".to_string(),
                ));
            }
            return Ok(Signature::Generic(GenericSignature {
                type_code: unknown,
                signature_info_encoding: to_blob(input, info_begin, end, copy),
                signature: Bytes::new(),
            }));
        },
    };

    decoder.finish_nested_tlvs(end)?;
    Ok(signature)
}

fn decode_optional_key_locator(
    decoder: &mut TlvDecoder,
    end: usize,
    input: &Bytes,
    copy: bool,
) -> Result<Option<KeyLocator>, CodecError> {
    if decoder.peek_type(tlv::KEY_LOCATOR, end) {
        Ok(Some(decode_key_locator(
            decoder,
            tlv::KEY_LOCATOR,
            input,
            copy,
        )?))
    } else {
        Ok(None)
    }
}
