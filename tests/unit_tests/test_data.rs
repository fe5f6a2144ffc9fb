// SPDX-License-Identifier: AGPL-3.0-or-later GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use bytes::Bytes;
use hex_literal::hex;
use ndn_sync_rs::{
    packet::{
        data::{ContentType, Data},
        name::{Name, NameComponent},
        signature::{Signature, SignatureFields},
    },
    security::{KeyChain, Sha256Signer},
};
use sha2::{Digest, Sha256};

use super::wire_format;

#[test]
fn test_digest_sha256_data_wire_exact() -> Result<()> {
    let wf = wire_format();
    let mut data = Data::new(Name::from_uri("/a/b")?);
    data.set_content(Bytes::from_static(&[0xca, 0xfe]));
    Sha256Signer.sign(&mut data, &wf)?;

    let (wire, signed) = wf.encode_data(&data)?;
    assert_eq!(wire.len(), 55);
    // Data(53) { Name(/a/b), MetaInfo(empty), Content [ca fe],
    //            SignatureInfo(DigestSha256) } before the signature value
    assert_eq!(
        &wire[..23],
        hex!("0635 0706 0801 61 0801 62 1400 1502 cafe 1603 1b01 00 1720")
    );

    // the signed portion brackets Name || MetaInfo || Content || SignatureInfo
    assert_eq!(signed.begin, 2);
    assert_eq!(signed.end, 21);
    let digest = Sha256::digest(&wire[signed.begin..signed.end]);
    assert_eq!(&wire[23..], digest.as_slice());
    assert!(Sha256Signer.verify(&data, &wf));
    Ok(())
}

#[test]
fn test_data_round_trip() -> Result<()> {
    let wf = wire_format();
    let mut data = Data::new(Name::from_uri("/round/trip")?);
    data.set_content(Bytes::from_static(b"payload"));
    data.meta_info_mut()
        .set_content_type(ContentType::Key)
        .set_freshness_period_ms(Some(2500))
        .set_final_block_id(Some(NameComponent::from_segment(3)));
    Sha256Signer.sign(&mut data, &wf)?;

    let (wire, _) = wf.encode_data(&data)?;
    let (decoded, signed) = wf.decode_data(&wire, true)?;

    assert_eq!(decoded.name(), data.name());
    assert_eq!(decoded.content(), data.content());
    assert_eq!(decoded.meta_info(), data.meta_info());
    assert_eq!(
        decoded.signature().signature_value(),
        data.signature().signature_value()
    );

    // the reported offsets locate the range the signer hashed
    let digest = Sha256::digest(&wire[signed.begin..signed.end]);
    assert_eq!(decoded.signature().signature_value().as_ref(), &digest[..]);
    Ok(())
}

#[test]
fn test_meta_info_other_content_type() -> Result<()> {
    let wf = wire_format();
    let mut data = Data::new(Name::from_uri("/t")?);
    data.meta_info_mut().set_content_type(ContentType::Other(21));
    Sha256Signer.sign(&mut data, &wf)?;

    let (wire, _) = wf.encode_data(&data)?;
    let (decoded, _) = wf.decode_data(&wire, true)?;
    assert_eq!(decoded.meta_info().content_type(), ContentType::Other(21));

    // the BLOB default stays off the wire entirely
    let mut blob = Data::new(Name::from_uri("/t")?);
    Sha256Signer.sign(&mut blob, &wf)?;
    let (blob_wire, _) = wf.encode_data(&blob)?;
    assert!(blob_wire.len() < wire.len());
    Ok(())
}

#[test]
fn test_generic_signature_round_trips_verbatim() -> Result<()> {
    let wf = wire_format();
    // SignatureType 42 is unknown; 0x83 is an ignorable extension TLV
    let wire = Bytes::from_static(&hex!(
        "0615 0703 0801 78 1400 1500 1606 1b01 2a 8301 07 1702 aabb"
    ));
    let (decoded, _) = wf.decode_data(&wire, true)?;

    match decoded.signature() {
        Signature::Generic(generic) => {
            assert_eq!(generic.type_code, 42);
            assert_eq!(
                generic.signature_info_encoding.as_ref(),
                hex!("1606 1b01 2a 8301 07")
            );
        },
        other => panic!("expected a generic signature, got {other:?}"),
    }
    assert_eq!(
        decoded.signature().signature_value().as_ref(),
        &[0xaa, 0xbb]
    );

    let (re_encoded, _) = wf.encode_data(&decoded)?;
    assert_eq!(re_encoded, wire);
    Ok(())
}

#[test]
fn test_known_signature_types_round_trip() -> Result<()> {
    use ndn_sync_rs::packet::signature::{
        HmacWithSha256Signature, KeyLocator, Sha256WithEcdsaSignature,
        Sha256WithRsaSignature,
    };

    let wf = wire_format();
    let signatures = [
        Signature::Sha256WithRsa(Sha256WithRsaSignature {
            key_locator: Some(KeyLocator::KeyName(Name::from_uri("/keys/rsa")?)),
            signature: Bytes::from_static(&[1; 8]),
        }),
        Signature::Sha256WithEcdsa(Sha256WithEcdsaSignature {
            key_locator: Some(KeyLocator::KeyDigest(Bytes::from_static(&[7; 4]))),
            signature: Bytes::from_static(&[2; 8]),
        }),
        Signature::HmacWithSha256(HmacWithSha256Signature {
            key_locator: None,
            signature: Bytes::from_static(&[3; 8]),
        }),
    ];

    for signature in signatures {
        let mut data = Data::new(Name::from_uri("/sig")?);
        data.set_signature(signature.clone());
        let (wire, _) = wf.encode_data(&data)?;
        let (decoded, _) = wf.decode_data(&wire, true)?;
        assert_eq!(decoded.signature(), &signature);
    }
    Ok(())
}

#[test]
fn test_zero_copy_decode_shares_the_input() -> Result<()> {
    let wf = wire_format();
    let mut data = Data::new(Name::from_uri("/zc")?);
    data.set_content(Bytes::from_static(b"shared"));
    Sha256Signer.sign(&mut data, &wf)?;
    let (wire, _) = wf.encode_data(&data)?;

    let (borrowed, _) = wf.decode_data(&wire, false)?;
    let (copied, _) = wf.decode_data(&wire, true)?;
    assert_eq!(borrowed.content(), copied.content());

    // the zero-copy view points into the original buffer
    let wire_range = wire.as_ptr() as usize..wire.as_ptr() as usize + wire.len();
    assert!(wire_range.contains(&(borrowed.content().as_ptr() as usize)));
    assert!(!wire_range.contains(&(copied.content().as_ptr() as usize)));
    Ok(())
}
