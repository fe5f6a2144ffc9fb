// SPDX-License-Identifier: AGPL-3.0-or-later GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{cell::RefCell, rc::Rc};

use anyhow::Result;
use ndn_sync_rs::{
    face::Face,
    packet::{name::Name, wire::TlvWireFormat},
    security::Sha256Signer,
    sync::{
        chrono_sync::{ChronoSync, ChronoSyncBuilder},
        digest_tree::DigestTree,
        sync_state::SyncState,
    },
};

use super::common::Hub;

const BROADCAST: &str = "/ndn/broadcast/app/room";

struct Node {
    sync: ChronoSync,
    received: Rc<RefCell<Vec<SyncState>>>,
    initialized: Rc<RefCell<bool>>,
}

fn make_node(hub: &Hub, data_prefix: &str) -> Result<Node> {
    let face: Rc<dyn Face> = hub.create_face();
    let wire_format = Rc::new(TlvWireFormat::with_seed(7));
    let received = Rc::new(RefCell::new(Vec::new()));
    let initialized = Rc::new(RefCell::new(false));

    let received_sink = Rc::clone(&received);
    let initialized_sink = Rc::clone(&initialized);
    let sync = ChronoSyncBuilder::new(face, Rc::new(Sha256Signer), wire_format)
        .broadcast_prefix(Name::from_uri(BROADCAST)?)
        .application_data_prefix(Name::from_uri(data_prefix)?)
        .session_no(0)
        .on_received_sync_state(Box::new(move |updates, _is_recovery| {
            received_sink.borrow_mut().extend_from_slice(updates);
        }))
        .on_initialized(Box::new(move || {
            *initialized_sink.borrow_mut() = true;
        }))
        .build()?;

    Ok(Node {
        sync,
        received,
        initialized,
    })
}

#[test]
fn test_two_nodes_converge_from_empty() -> Result<()> {
    let hub = Hub::new();
    let a = make_node(&hub, "/ndn/app/alice")?;
    let b = make_node(&hub, "/ndn/app/bob")?;

    // both sides park each other's "00" interest
    hub.advance(100);
    assert_eq!(a.sync.digest_root(), "00");
    assert_eq!(b.sync.digest_root(), "00");

    a.sync.publish_next_sequence_no()?;
    hub.advance(8000);

    assert_eq!(a.sync.sequence_no(), 0);
    assert_eq!(b.sync.sequence_no(), 0);
    assert!(*b.initialized.borrow());
    assert_ne!(a.sync.digest_root(), "00");
    assert_eq!(a.sync.digest_root(), b.sync.digest_root());

    // the shared root is the digest over both participants' nodes
    let mut expected = DigestTree::new();
    expected.update("/ndn/app/alice", 0, 0);
    expected.update("/ndn/app/bob", 0, 0);
    assert_eq!(a.sync.digest_root(), expected.root());

    // B learned Alice's publication through the sync data
    assert!(
        a.received
            .borrow()
            .iter()
            .any(|s| s.data_prefix_uri == "/ndn/app/bob")
    );
    assert!(
        b.received
            .borrow()
            .iter()
            .any(|s| s.data_prefix_uri == "/ndn/app/alice")
    );
    Ok(())
}

#[test]
fn test_sequence_numbers_propagate() -> Result<()> {
    let hub = Hub::new();
    let a = make_node(&hub, "/ndn/app/alice")?;
    let b = make_node(&hub, "/ndn/app/bob")?;

    hub.advance(100);
    a.sync.publish_next_sequence_no()?;
    hub.advance(8000);

    for _ in 0..3 {
        a.sync.publish_next_sequence_no()?;
        hub.advance(1000);
    }
    hub.advance(8000);

    assert_eq!(a.sync.sequence_no(), 3);
    assert_eq!(a.sync.digest_root(), b.sync.digest_root());
    let alice_seq_at_b = b
        .sync
        .members()
        .into_iter()
        .find(|(prefix, ..)| prefix == "/ndn/app/alice")
        .map(|(_, _, seq)| seq);
    assert_eq!(alice_seq_at_b, Some(3));
    Ok(())
}

#[test]
fn test_simultaneous_publish_rejoins_forked_digests() -> Result<()> {
    let hub = Hub::new();
    let a = make_node(&hub, "/ndn/app/alice")?;
    let b = make_node(&hub, "/ndn/app/bob")?;

    hub.advance(100);
    a.sync.publish_next_sequence_no()?;
    hub.advance(8000);
    assert_eq!(a.sync.digest_root(), b.sync.digest_root());

    // both publish before seeing each other's update, forking the digests
    a.sync.publish_next_sequence_no()?;
    b.sync.publish_next_sequence_no()?;
    hub.advance(20_000);

    assert_eq!(a.sync.digest_root(), b.sync.digest_root());
    let seqs = |node: &Node| {
        let mut members = node.sync.members();
        members.sort();
        members
            .into_iter()
            .map(|(prefix, _, seq)| (prefix, seq))
            .collect::<Vec<_>>()
    };
    assert_eq!(seqs(&a), seqs(&b));
    assert_eq!(seqs(&a), vec![
        ("/ndn/app/alice".to_string(), 1),
        ("/ndn/app/bob".to_string(), 1),
    ]);
    Ok(())
}

#[test]
fn test_newcomer_catches_up_from_full_state() -> Result<()> {
    let hub = Hub::new();
    let a = make_node(&hub, "/ndn/app/alice")?;
    let b = make_node(&hub, "/ndn/app/bob")?;

    hub.advance(100);
    a.sync.publish_next_sequence_no()?;
    hub.advance(8000);
    a.sync.publish_next_sequence_no()?;
    hub.advance(8000);

    // Carol joins late and learns the whole tree from a "00" reply
    let c = make_node(&hub, "/ndn/app/carol")?;
    hub.advance(15_000);

    assert!(*c.initialized.borrow());
    assert_eq!(c.sync.digest_root(), a.sync.digest_root());
    assert!(
        c.received
            .borrow()
            .iter()
            .any(|s| s.data_prefix_uri == "/ndn/app/alice" && s.sequence_no == 1)
    );
    assert_eq!(b.sync.digest_root(), a.sync.digest_root());
    Ok(())
}

#[test]
fn test_three_nodes_converge() -> Result<()> {
    let hub = Hub::new();
    let a = make_node(&hub, "/ndn/app/alice")?;
    let b = make_node(&hub, "/ndn/app/bob")?;
    let c = make_node(&hub, "/ndn/app/carol")?;

    hub.advance(100);
    a.sync.publish_next_sequence_no()?;
    hub.advance(10_000);
    b.sync.publish_next_sequence_no()?;
    hub.advance(10_000);
    c.sync.publish_next_sequence_no()?;
    hub.advance(20_000);

    assert_eq!(a.sync.digest_root(), b.sync.digest_root());
    assert_eq!(b.sync.digest_root(), c.sync.digest_root());

    // Alice published from scratch (0); the others were initialized at 0
    // and then published once more
    let mut members = a.sync.members();
    members.sort();
    assert_eq!(members, vec![
        ("/ndn/app/alice".to_string(), 0, 0),
        ("/ndn/app/bob".to_string(), 0, 1),
        ("/ndn/app/carol".to_string(), 0, 1),
    ]);
    Ok(())
}

#[test]
fn test_publishing_from_the_callback_is_safe() -> Result<()> {
    let hub = Hub::new();
    let a = make_node(&hub, "/ndn/app/alice")?;

    // Bob answers every incoming update with a publication of his own
    let face: Rc<dyn Face> = hub.create_face();
    let wire_format = Rc::new(TlvWireFormat::with_seed(7));
    let bob: Rc<RefCell<Option<ChronoSync>>> = Rc::new(RefCell::new(None));
    let bob_handle = Rc::clone(&bob);
    let sync = ChronoSyncBuilder::new(face, Rc::new(Sha256Signer), wire_format)
        .broadcast_prefix(Name::from_uri(BROADCAST)?)
        .application_data_prefix(Name::from_uri("/ndn/app/bob")?)
        .on_received_sync_state(Box::new(move |updates, _is_recovery| {
            let reacting = updates
                .iter()
                .any(|s| s.data_prefix_uri == "/ndn/app/alice");
            if reacting && let Some(sync) = bob_handle.borrow().as_ref() {
                sync.publish_next_sequence_no().expect("reactive publish");
            }
        }))
        .build()?;
    *bob.borrow_mut() = Some(sync);

    hub.advance(100);
    a.sync.publish_next_sequence_no()?;
    hub.advance(20_000);

    let bob = bob.borrow();
    let bob = bob.as_ref().expect("bob was built");
    assert!(bob.sequence_no() >= 1);
    assert_eq!(a.sync.digest_root(), bob.digest_root());
    let bob_seq_at_a = a
        .sync
        .members()
        .into_iter()
        .find(|(prefix, ..)| prefix == "/ndn/app/bob")
        .map(|(_, _, seq)| seq);
    assert_eq!(bob_seq_at_a, Some(bob.sequence_no() as u64));
    Ok(())
}

#[test]
fn test_shutdown_stops_publishing() -> Result<()> {
    let hub = Hub::new();
    let a = make_node(&hub, "/ndn/app/alice")?;
    hub.advance(100);

    a.sync.shutdown();
    assert!(a.sync.publish_next_sequence_no().is_err());
    Ok(())
}
