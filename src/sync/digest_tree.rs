// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The digest tree: a sorted set of `(dataPrefix, sessionNo, sequenceNo)`
//! tuples whose root digest compactly represents the state of a sync
//! group.
//!
//! Node order is `(dataPrefix as UTF-8 bytes, sessionNo)` ascending. Any
//! mutation recomputes exactly one node digest and then the root.

use sha2::{Digest, Sha256};

/// Root digest of a tree with no nodes.
pub const EMPTY_ROOT: &str = "00";

#[derive(Debug, Clone)]
pub struct DigestTreeNode {
    data_prefix: String,
    session_no: u64,
    sequence_no: u64,
    digest: String,
}

impl DigestTreeNode {
    fn new(data_prefix: String, session_no: u64, sequence_no: u64) -> Self {
        let mut node = Self {
            data_prefix,
            session_no,
            sequence_no,
            digest: String::new(),
        };
        node.recompute_digest();
        node
    }

    #[inline]
    pub fn data_prefix(&self) -> &str {
        &self.data_prefix
    }

    #[inline]
    pub fn session_no(&self) -> u64 {
        self.session_no
    }

    #[inline]
    pub fn sequence_no(&self) -> u64 {
        self.sequence_no
    }

    /// Hex digest of this node.
    #[inline]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// `SHA256( SHA256(prefix) || SHA256(le32(session) || le32(seq)) )`
    fn recompute_digest(&mut self) {
        let prefix_digest = Sha256::digest(self.data_prefix.as_bytes());

        let mut seq_hasher = Sha256::new();
        seq_hasher.update((self.session_no as u32).to_le_bytes());
        seq_hasher.update((self.sequence_no as u32).to_le_bytes());
        let seq_digest = seq_hasher.finalize();

        let mut hasher = Sha256::new();
        hasher.update(prefix_digest);
        hasher.update(seq_digest);
        self.digest = hex::encode(hasher.finalize());
    }
}

#[derive(Debug, Clone)]
pub struct DigestTree {
    nodes: Vec<DigestTreeNode>,
    root: String,
}

impl Default for DigestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: EMPTY_ROOT.to_string(),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, i: usize) -> Option<&DigestTreeNode> {
        self.nodes.get(i)
    }

    pub fn nodes(&self) -> &[DigestTreeNode] {
        &self.nodes
    }

    /// Hex digest over all node digests, `"00"` for the empty tree.
    #[inline]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Index of the node for `(data_prefix, session_no)`.
    pub fn find(&self, data_prefix: &str, session_no: u64) -> Option<usize> {
        self.nodes
            .binary_search_by(|node| {
                node.data_prefix
                    .as_bytes()
                    .cmp(data_prefix.as_bytes())
                    .then(node.session_no.cmp(&session_no))
            })
            .ok()
    }

    /// Record `sequence_no` for the participant, inserting its node at the
    /// sorted position if new. Returns `false` when the stored sequence
    /// number is already the same or higher.
    pub fn update(
        &mut self,
        data_prefix: &str,
        session_no: u64,
        sequence_no: u64,
    ) -> bool {
        match self.nodes.binary_search_by(|node| {
            node.data_prefix
                .as_bytes()
                .cmp(data_prefix.as_bytes())
                .then(node.session_no.cmp(&session_no))
        }) {
            Ok(i) => {
                if self.nodes[i].sequence_no >= sequence_no {
                    return false;
                }
                self.nodes[i].sequence_no = sequence_no;
                self.nodes[i].recompute_digest();
                self.recompute_root();
                true
            },
            Err(i) => {
                self.nodes.insert(
                    i,
                    DigestTreeNode::new(
                        data_prefix.to_string(),
                        session_no,
                        sequence_no,
                    ),
                );
                self.recompute_root();
                true
            },
        }
    }

    fn recompute_root(&mut self) {
        if self.nodes.is_empty() {
            self.root = EMPTY_ROOT.to_string();
            return;
        }
        let mut hasher = Sha256::new();
        for node in &self.nodes {
            // the raw bytes behind each hex digest, in sorted order
            let raw = hex::decode(&node.digest)
                .expect("node digests are always valid hex");
            hasher.update(raw);
        }
        self.root = hex::encode(hasher.finalize());
    }
}
