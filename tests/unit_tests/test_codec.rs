// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use ndn_sync_rs::codec::{
    decoder::TlvDecoder, encoder::TlvEncoder, error::CodecError,
};

#[test]
fn test_optional_readers_return_none_on_other_types() -> Result<()> {
    let mut encoder = TlvEncoder::new(32);
    let save = encoder.len();
    encoder.write_non_negative_integer_tlv(12, 4000);
    encoder.write_blob_tlv(10, &[1, 2, 3, 4]);
    // None and the empty blob stay off the wire entirely
    encoder.write_optional_blob_tlv(15, None);
    encoder.write_optional_blob_tlv(15, Some(&[]));
    encoder.write_type_and_length(5, (encoder.len() - save) as u64);
    let wire = encoder.finish();

    let mut decoder = TlvDecoder::new(&wire);
    let end = decoder.read_nested_tlvs_start(5)?;

    // type 13 is not next, so the optional readers pass
    assert_eq!(decoder.read_optional_non_negative_integer_tlv(13, end)?, None);
    assert_eq!(decoder.read_optional_blob_tlv(13, end)?, None);

    assert_eq!(decoder.read_blob_tlv(10)?, &[1, 2, 3, 4]);
    assert_eq!(
        decoder.read_optional_non_negative_integer_tlv(12, end)?,
        Some(4000)
    );
    decoder.finish_nested_tlvs(end)?;
    Ok(())
}

#[test]
fn test_boolean_tlv() -> Result<()> {
    let mut encoder = TlvEncoder::new(16);
    let save = encoder.len();
    encoder.write_boolean_tlv(18, true);
    encoder.write_boolean_tlv(17, false);
    encoder.write_type_and_length(9, (encoder.len() - save) as u64);
    let wire = encoder.finish();
    assert_eq!(wire.as_ref(), &[9, 2, 18, 0]);

    let mut decoder = TlvDecoder::new(&wire);
    let end = decoder.read_nested_tlvs_start(9)?;
    assert!(!decoder.read_boolean_tlv(17, end)?);
    assert!(decoder.read_boolean_tlv(18, end)?);
    decoder.finish_nested_tlvs(end)?;
    Ok(())
}

#[test]
fn test_non_negative_integer_widths_round_trip() -> Result<()> {
    for value in [0u64, 255, 256, 65535, 65536, u32::MAX as u64, u64::MAX] {
        let mut encoder = TlvEncoder::new(16);
        encoder.write_non_negative_integer_tlv(24, value);
        let wire = encoder.finish();

        let mut decoder = TlvDecoder::new(&wire);
        assert_eq!(decoder.read_non_negative_integer_tlv(24)?, value);
    }
    Ok(())
}

#[test]
fn test_invalid_integer_width_rejected() {
    // length 3 is not one of the fixed widths
    let wire = [24u8, 3, 0, 0, 1];
    let mut decoder = TlvDecoder::new(&wire);
    assert!(matches!(
        decoder.read_non_negative_integer_tlv(24),
        Err(CodecError::InvalidEncoding(_))
    ));
}

#[test]
fn test_peek_type_respects_scope_end() -> Result<()> {
    // outer(7) { 8 "a" } followed by a trailing TLV outside the scope
    let wire = [7u8, 3, 8, 1, b'a', 10, 1, 0xff];
    let mut decoder = TlvDecoder::new(&wire);
    let end = decoder.read_nested_tlvs_start(7)?;
    assert!(decoder.peek_type(8, end));
    decoder.read_blob_tlv(8)?;
    // the nonce TLV past `end` must not be visible inside the scope
    assert!(!decoder.peek_type(10, end));
    decoder.finish_nested_tlvs(end)?;
    Ok(())
}

#[test]
fn test_wrong_expected_type_is_invalid_encoding() {
    let wire = [7u8, 0];
    let mut decoder = TlvDecoder::new(&wire);
    assert!(matches!(
        decoder.read_type_and_length(5),
        Err(CodecError::InvalidEncoding(_))
    ));
}

#[test]
fn test_truncated_packets_fail_cleanly() -> Result<()> {
    use bytes::Bytes;
    use ndn_sync_rs::packet::{interest::Interest, name::Name};

    let wf = super::wire_format();
    let mut interest = Interest::new(Name::from_uri("/trunc")?);
    interest.set_nonce(Bytes::from_static(&[0; 4]));
    let (wire, _) = wf.encode_interest(&interest)?;

    for cut in 1..wire.len() {
        let partial = wire.slice(..cut);
        assert!(
            wf.decode_interest(&partial, true).is_err(),
            "a {cut}-byte prefix must not decode"
        );
    }
    Ok(())
}

#[test]
fn test_critical_unknown_type_in_name_rejected() {
    use bytes::Bytes;

    let wf = super::wire_format();
    // Name { component "a", unknown critical type 4 }
    let wire = Bytes::from_static(&[7, 6, 8, 1, b'a', 4, 1, 0]);
    assert!(matches!(
        wf.decode_name(&wire, true),
        Err(CodecError::UnexpectedType(4))
    ));

    // the same unknown type with the ignorable shape is skipped
    let wire = Bytes::from_static(&[7, 6, 8, 1, b'a', 33, 1, 0]);
    let name = wf.decode_name(&wire, true).expect("ignorable type skipped");
    assert_eq!(name.size(), 1);
}

#[test]
fn test_get_slice_bounds() -> Result<()> {
    let wire = [7u8, 2, 8, 0];
    let decoder = TlvDecoder::new(&wire);
    assert_eq!(decoder.get_slice(1, 3)?, &[2, 8]);
    assert!(decoder.get_slice(3, 9).is_err());
    assert!(decoder.get_slice(3, 1).is_err());
    Ok(())
}
