// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Invertible Bloom Lookup Table.
//!
//! Each key lands in three buckets (one per hash function); a bucket whose
//! `|count| == 1` and whose key check matches is *pure* and can be peeled,
//! which is what makes small symmetric differences decodable. The wire
//! form packs three little-endian 32-bit fields per bucket and is
//! zlib-compressed at the highest level.

use std::{
    collections::HashSet,
    io::{Read, Write},
};

use bytes::Bytes;
use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};
use zerocopy::{
    FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, LittleEndian, I32,
    U32,
};

use crate::codec::error::CodecError;

/// Buckets per key.
pub const N_HASH: usize = 3;
/// Seed of the key-check hash.
pub const N_HASHCHECK: u32 = 11;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashTableEntry {
    count: i32,
    key_sum: u64,
    key_check: u64,
}

impl HashTableEntry {
    #[inline]
    fn is_empty(&self) -> bool {
        self.count == 0 && self.key_sum == 0 && self.key_check == 0
    }

    /// `|count| == 1` and the key check matches the key sum.
    #[inline]
    fn is_pure(&self) -> bool {
        (self.count == 1 || self.count == -1)
            && murmur_hash3_u64(N_HASHCHECK, self.key_sum) == self.key_check
    }

    #[inline]
    pub fn count(&self) -> i32 {
        self.count
    }

    #[inline]
    pub fn key_sum(&self) -> u64 {
        self.key_sum
    }
}

/// On-wire image of one bucket: only the low 32 bits of the 64-bit sums
/// travel, a documented compatibility trait of the format.
#[repr(C)]
#[derive(Debug, Default, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
struct WireEntry {
    count: I32<LittleEndian>,
    key_sum: U32<LittleEndian>,
    key_check: U32<LittleEndian>,
}

const WIRE_ENTRY_SIZE: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iblt {
    entries: Vec<HashTableEntry>,
}

impl Iblt {
    /// Size the table for an expected number of set-difference entries.
    ///
    /// `nEntries = ceil(1.5 × expected / N_HASH) × N_HASH`, so the table
    /// is divisible into `N_HASH` equal bucket ranges.
    pub fn new(expected_n_entries: usize) -> Self {
        let padded = (expected_n_entries * 3).div_ceil(2);
        let n_entries = padded.div_ceil(N_HASH) * N_HASH;
        Self {
            entries: vec![HashTableEntry::default(); n_entries],
        }
    }

    #[inline]
    pub fn n_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[HashTableEntry] {
        &self.entries
    }

    fn update(&mut self, direction: i32, key: u64) {
        let buckets_per_hash = self.entries.len() / N_HASH;
        for i in 0..N_HASH {
            let bucket = i * buckets_per_hash
                + (murmur_hash3_u64(i as u32, key) as usize) % buckets_per_hash;
            let entry = &mut self.entries[bucket];
            entry.count += direction;
            entry.key_sum ^= key;
            entry.key_check ^= murmur_hash3_u64(N_HASHCHECK, key);
        }
    }

    pub fn insert(&mut self, key: u64) {
        self.update(1, key);
    }

    pub fn erase(&mut self, key: u64) {
        self.update(-1, key);
    }

    /// Bucket-wise difference; the result represents the symmetric set
    /// difference with signed counts.
    pub fn difference(&self, other: &Iblt) -> Result<Iblt, CodecError> {
        if self.entries.len() != other.entries.len() {
            return Err(CodecError::IbltDecode(format!(
                "size mismatch: {} vs {} buckets",
                self.entries.len(),
                other.entries.len()
            )));
        }
        let entries = self
            .entries
            .iter()
            .zip(&other.entries)
            .map(|(a, b)| HashTableEntry {
                count: a.count - b.count,
                key_sum: a.key_sum ^ b.key_sum,
                key_check: a.key_check ^ b.key_check,
            })
            .collect();
        Ok(Iblt { entries })
    }

    /// Peel the table into the keys only present here (`positive`) and
    /// only present in the subtrahend (`negative`).
    ///
    /// Returns `false` when peeling stalls before the table empties, i.e.
    /// the difference exceeded the decoding capacity.
    pub fn list_entries(
        &self,
        positive: &mut HashSet<u64>,
        negative: &mut HashSet<u64>,
    ) -> bool {
        positive.clear();
        negative.clear();

        let mut peeled = self.clone();
        loop {
            let mut erased = 0usize;
            for i in 0..peeled.entries.len() {
                let entry = peeled.entries[i];
                if entry.is_pure() {
                    if entry.count == 1 {
                        positive.insert(entry.key_sum);
                    } else {
                        negative.insert(entry.key_sum);
                    }
                    peeled.update(-entry.count, entry.key_sum);
                    erased += 1;
                }
            }
            if erased == 0 {
                break;
            }
        }
        peeled.entries.iter().all(HashTableEntry::is_empty)
    }

    /// Serialize and zlib-compress the table.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let mut table = Vec::with_capacity(self.entries.len() * WIRE_ENTRY_SIZE);
        for entry in &self.entries {
            let wire = WireEntry {
                count: I32::new(entry.count),
                key_sum: U32::new(entry.key_sum as u32),
                key_check: U32::new(entry.key_check as u32),
            };
            table.extend_from_slice(wire.as_bytes());
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder
            .write_all(&table)
            .and_then(|_| encoder.finish())
            .map(Bytes::from)
            .map_err(|e| CodecError::IbltDecode(format!("compression failed: {e}")))
    }

    /// Inflate `blob` into this table. The inflated image must hold
    /// exactly `3 × nEntries × 4` bytes.
    pub fn initialize(&mut self, blob: &[u8]) -> Result<(), CodecError> {
        let mut inflated = Vec::new();
        ZlibDecoder::new(blob)
            .read_to_end(&mut inflated)
            .map_err(|e| CodecError::IbltDecode(format!("inflate failed: {e}")))?;
        if inflated.len() != self.entries.len() * WIRE_ENTRY_SIZE {
            return Err(CodecError::IbltDecode(format!(
                "inflated to {} bytes, expected {}",
                inflated.len(),
                self.entries.len() * WIRE_ENTRY_SIZE
            )));
        }
        for (entry, chunk) in self
            .entries
            .iter_mut()
            .zip(inflated.chunks_exact(WIRE_ENTRY_SIZE))
        {
            let wire = WireEntry::read_from_bytes(chunk)
                .map_err(|e| CodecError::IbltDecode(e.to_string()))?;
            entry.count = wire.count.get();
            entry.key_sum = u64::from(wire.key_sum.get());
            entry.key_check = u64::from(wire.key_check.get());
        }
        Ok(())
    }
}

/// MurmurHash3 x86_32 over the 4 little-endian low bytes of the key, the
/// form the wire format is defined against.
pub fn murmur_hash3_u64(seed: u32, key: u64) -> u64 {
    u64::from(murmur_hash3(seed, &(key as u32).to_le_bytes()))
}

/// MurmurHash3 x86_32.
pub fn murmur_hash3(seed: u32, data: &[u8]) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h1 = seed;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k1 = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);

        h1 ^= k1;
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k1 = 0u32;
        for (i, &b) in tail.iter().enumerate() {
            k1 |= u32::from(b) << (8 * i);
        }
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= data.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85eb_ca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2_ae35);
    h1 ^= h1 >> 16;
    h1
}
