// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Append-only log of root digests and the updates that produced them.
//!
//! The log is the sole basis for answering peers whose advertised digest
//! is stale: everything after their digest, collapsed per participant, is
//! what they are missing.

use crate::sync::sync_state::SyncState;

#[derive(Debug, Clone)]
pub struct DigestLogEntry {
    digest: String,
    /// Snapshot of the SyncState batch that transitioned into `digest`.
    states: Vec<SyncState>,
}

impl DigestLogEntry {
    #[inline]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    #[inline]
    pub fn states(&self) -> &[SyncState] {
        &self.states
    }
}

#[derive(Debug, Clone, Default)]
pub struct DigestLog {
    entries: Vec<DigestLogEntry>,
}

impl DigestLog {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&DigestLogEntry> {
        self.entries.get(i)
    }

    /// Linear search by digest.
    pub fn find(&self, digest: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.digest == digest)
    }

    pub fn append(&mut self, digest: String, states: Vec<SyncState>) {
        self.entries.push(DigestLogEntry { digest, states });
    }

    /// All updates recorded after `index`, collapsed per participant to
    /// the latest `(sessionNo, sequenceNo)`.
    pub fn updates_since(&self, index: usize) -> Vec<SyncState> {
        let mut collapsed: Vec<SyncState> = Vec::new();
        for entry in self.entries.iter().skip(index + 1) {
            for state in &entry.states {
                match collapsed.iter_mut().find(|s| {
                    s.data_prefix_uri == state.data_prefix_uri
                        && s.session_no == state.session_no
                }) {
                    Some(existing) => {
                        if state.sequence_no > existing.sequence_no {
                            existing.sequence_no = state.sequence_no;
                        }
                    },
                    None => collapsed.push(state.clone()),
                }
            }
        }
        collapsed
    }
}
