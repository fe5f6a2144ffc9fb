// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The signing seam consumed by the sync engines.
//!
//! Key and certificate management live outside this crate; engines only
//! ask a [`KeyChain`] to sign an outgoing Data packet and to verify an
//! incoming one. [`Sha256Signer`] is the self-contained DigestSha256
//! implementation; RSA/ECDSA/HMAC signers plug in through the same trait.

use anyhow::Result;
use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::packet::{
    data::Data,
    signature::{DigestSha256Signature, Signature, SignatureFields},
    wire::TlvWireFormat,
};

pub trait KeyChain {
    /// Install a signature over the Data's signed portion.
    fn sign(&self, data: &mut Data, wire_format: &TlvWireFormat) -> Result<()>;

    /// Whether the Data's signature checks out.
    fn verify(&self, data: &Data, wire_format: &TlvWireFormat) -> bool;
}

/// DigestSha256: the "signature" is the SHA-256 of the signed portion.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Signer;

impl KeyChain for Sha256Signer {
    fn sign(&self, data: &mut Data, wire_format: &TlvWireFormat) -> Result<()> {
        data.set_signature(Signature::DigestSha256(DigestSha256Signature {
            // a placeholder of the final width keeps the offsets stable
            signature: Bytes::from(vec![0u8; 32]),
        }));
        let (encoding, signed) = wire_format.encode_data(data)?;
        let digest = Sha256::digest(&encoding[signed.begin..signed.end]);
        data.signature_mut()
            .set_signature_value(Bytes::copy_from_slice(&digest));
        Ok(())
    }

    fn verify(&self, data: &Data, wire_format: &TlvWireFormat) -> bool {
        let Ok((encoding, signed)) = wire_format.encode_data(data) else {
            return false;
        };
        let digest = Sha256::digest(&encoding[signed.begin..signed.end]);
        data.signature().signature_value().as_ref() == digest.as_slice()
    }
}
