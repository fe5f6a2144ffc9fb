// SPDX-License-Identifier: AGPL-3.0-or-later GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use bytes::Bytes;
use hex_literal::hex;
use ndn_sync_rs::{
    codec::error::CodecError,
    packet::{
        interest::Interest,
        name::{Name, NameComponent},
        signature::KeyLocator,
    },
};

use super::wire_format;

#[test]
fn test_encode_minimal_interest_wire_exact() -> Result<()> {
    let mut interest = Interest::new(Name::from_uri("/ndn/test")?);
    interest.set_lifetime_ms(Some(4000));
    interest.set_nonce(Bytes::from_static(b"abcd"));

    let (wire, signed) = wire_format().encode_interest(&interest)?;
    // Interest(23) { Name(/ndn/test), Nonce "abcd", Lifetime 4000 }
    assert_eq!(
        wire.as_ref(),
        hex!("0517 070b 0803 6e646e 0804 74657374 0a04 61626364 0c02 0fa0")
    );
    // the signed-interest range spans the components before the last one
    assert_eq!(signed.begin, 4);
    assert_eq!(signed.end, 9);
    Ok(())
}

#[test]
fn test_absent_nonce_is_generated_with_four_bytes() -> Result<()> {
    let wf = wire_format();
    let mut interest = Interest::new(Name::from_uri("/ndn/test")?);
    interest.set_lifetime_ms(Some(4000));

    let (wire, _) = wf.encode_interest(&interest)?;
    let (decoded, _) = wf.decode_interest(&wire, true)?;

    assert_eq!(decoded.name(), &Name::from_uri("/ndn/test")?);
    assert_eq!(decoded.lifetime_ms(), Some(4000));
    assert_eq!(decoded.nonce().len(), 4);

    // the total length is the name plus nonce, lifetime and headers
    assert_eq!(wire.len(), 2 + 13 + 6 + 4);
    Ok(())
}

#[test]
fn test_nonce_is_normalized_to_four_bytes() -> Result<()> {
    let wf = wire_format();

    let mut short = Interest::new(Name::from_uri("/n")?);
    short.set_nonce(Bytes::from_static(&[0x01]));
    let (wire, _) = wf.encode_interest(&short)?;
    let (decoded, _) = wf.decode_interest(&wire, true)?;
    assert_eq!(decoded.nonce().len(), 4);
    assert_eq!(decoded.nonce()[0], 0x01);

    let mut long = Interest::new(Name::from_uri("/n")?);
    long.set_nonce(Bytes::from_static(&[1, 2, 3, 4, 5, 6]));
    let (wire, _) = wf.encode_interest(&long)?;
    let (decoded, _) = wf.decode_interest(&wire, true)?;
    assert_eq!(decoded.nonce().as_ref(), &[1, 2, 3, 4]);
    Ok(())
}

#[test]
fn test_selectors_round_trip() -> Result<()> {
    let wf = wire_format();
    let mut interest = Interest::new(Name::from_uri("/a/b")?);
    interest
        .set_min_suffix_components(Some(1))
        .set_max_suffix_components(Some(4))
        .set_key_locator(Some(KeyLocator::KeyName(Name::from_uri("/keys/alice")?)))
        .set_child_selector(Some(1))
        .set_must_be_fresh(true)
        .set_lifetime_ms(Some(1500));
    interest
        .exclude_mut()
        .append_component(NameComponent::from_bytes(b"v1"))
        .append_any();

    let (wire, _) = wf.encode_interest(&interest)?;
    let (decoded, _) = wf.decode_interest(&wire, true)?;

    assert_eq!(decoded.name(), interest.name());
    assert_eq!(decoded.min_suffix_components(), Some(1));
    assert_eq!(decoded.max_suffix_components(), Some(4));
    assert_eq!(decoded.key_locator(), interest.key_locator());
    assert_eq!(decoded.exclude(), interest.exclude());
    assert_eq!(decoded.child_selector(), Some(1));
    assert!(decoded.must_be_fresh());
    assert_eq!(decoded.lifetime_ms(), Some(1500));

    // no selector set means no Selectors TLV at all
    let bare = Interest::new(Name::from_uri("/a/b")?);
    let (bare_wire, _) = wf.encode_interest(&bare)?;
    assert!(bare_wire.len() < wire.len());
    Ok(())
}

#[test]
fn test_exclude_matches_ranges() -> Result<()> {
    let mut interest = Interest::new(Name::from_uri("/a")?);
    interest
        .exclude_mut()
        .append_component(NameComponent::from_bytes(b"c"))
        .append_any();

    let exclude = interest.exclude();
    assert!(exclude.matches(&NameComponent::from_bytes(b"c")));
    assert!(exclude.matches(&NameComponent::from_bytes(b"x")));
    assert!(!exclude.matches(&NameComponent::from_bytes(b"a")));
    Ok(())
}

#[test]
fn test_matches_name_applies_selectors() -> Result<()> {
    let mut interest = Interest::new(Name::from_uri("/a")?);
    interest
        .set_min_suffix_components(Some(2))
        .set_max_suffix_components(Some(3));
    interest
        .exclude_mut()
        .append_component(NameComponent::from_bytes(b"bad"));

    // suffix counts include the implicit digest component
    assert!(interest.matches_name(&Name::from_uri("/a/b")?));
    assert!(interest.matches_name(&Name::from_uri("/a/b/c")?));
    assert!(!interest.matches_name(&Name::from_uri("/a")?));
    assert!(!interest.matches_name(&Name::from_uri("/a/b/c/d")?));
    assert!(!interest.matches_name(&Name::from_uri("/a/bad")?));
    assert!(!interest.matches_name(&Name::from_uri("/other")?));
    Ok(())
}

#[test]
fn test_link_and_selected_delegation_round_trip() -> Result<()> {
    let wf = wire_format();

    // a Link is a pre-encoded Data packet carried verbatim
    let mut link = ndn_sync_rs::packet::data::Data::new(Name::from_uri("/link")?);
    link.set_content(Bytes::from_static(b"/delegation"));
    let (link_wire, _) = wf.encode_data(&link)?;

    let mut interest = Interest::new(Name::from_uri("/routed")?);
    interest.set_nonce(Bytes::from_static(&[5, 5, 5, 5]));
    interest.set_link_wire_encoding(Some(link_wire.clone()));
    interest.set_selected_delegation_index(Some(0));

    let (wire, _) = wf.encode_interest(&interest)?;
    let (decoded, _) = wf.decode_interest(&wire, true)?;
    assert_eq!(decoded.link_wire_encoding(), Some(&link_wire));
    assert_eq!(decoded.selected_delegation_index(), Some(0));
    Ok(())
}

#[test]
fn test_selected_delegation_requires_link() -> Result<()> {
    let wf = wire_format();
    let mut interest = Interest::new(Name::from_uri("/a")?);
    interest.set_selected_delegation_index(Some(0));

    assert!(matches!(
        wf.encode_interest(&interest),
        Err(CodecError::InvalidCombination(_))
    ));
    Ok(())
}

#[test]
fn test_round_trip_is_stable_given_a_nonce() -> Result<()> {
    let wf = wire_format();
    let mut interest = Interest::new(Name::from_uri("/stable/name")?);
    interest.set_nonce(Bytes::from_static(&[9, 9, 9, 9]));
    interest.set_lifetime_ms(Some(250));

    let (first, _) = wf.encode_interest(&interest)?;
    let (decoded, _) = wf.decode_interest(&first, false)?;
    let (second, _) = wf.encode_interest(&decoded)?;
    assert_eq!(first, second);
    Ok(())
}
