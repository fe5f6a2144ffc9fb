// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Signature variants of a Data packet, tagged by `SignatureType`.
//!
//! A code the library does not recognize decodes into
//! [`GenericSignature`], which preserves the whole SignatureInfo TLV
//! verbatim so re-encoding is byte-for-byte identical.

use bytes::Bytes;
use enum_dispatch::enum_dispatch;

use crate::packet::{name::Name, tlv::signature_type};

/// Locates the signing key: by name, or by the digest of the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLocator {
    KeyName(Name),
    KeyDigest(Bytes),
}

/// Field access shared by every signature variant.
#[enum_dispatch]
pub trait SignatureFields {
    /// The `SignatureType` code this variant encodes as.
    fn type_code(&self) -> u64;

    fn signature_value(&self) -> &Bytes;

    fn set_signature_value(&mut self, value: Bytes);

    fn key_locator(&self) -> Option<&KeyLocator> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sha256WithRsaSignature {
    pub key_locator: Option<KeyLocator>,
    pub signature: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sha256WithEcdsaSignature {
    pub key_locator: Option<KeyLocator>,
    pub signature: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HmacWithSha256Signature {
    pub key_locator: Option<KeyLocator>,
    pub signature: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DigestSha256Signature {
    pub signature: Bytes,
}

/// An unrecognized `SignatureType`: the whole SignatureInfo TLV is kept
/// and re-emitted verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericSignature {
    pub type_code: u64,
    pub signature_info_encoding: Bytes,
    pub signature: Bytes,
}

impl SignatureFields for Sha256WithRsaSignature {
    fn type_code(&self) -> u64 {
        signature_type::SHA256_WITH_RSA
    }

    fn signature_value(&self) -> &Bytes {
        &self.signature
    }

    fn set_signature_value(&mut self, value: Bytes) {
        self.signature = value;
    }

    fn key_locator(&self) -> Option<&KeyLocator> {
        self.key_locator.as_ref()
    }
}

impl SignatureFields for Sha256WithEcdsaSignature {
    fn type_code(&self) -> u64 {
        signature_type::SHA256_WITH_ECDSA
    }

    fn signature_value(&self) -> &Bytes {
        &self.signature
    }

    fn set_signature_value(&mut self, value: Bytes) {
        self.signature = value;
    }

    fn key_locator(&self) -> Option<&KeyLocator> {
        self.key_locator.as_ref()
    }
}

impl SignatureFields for HmacWithSha256Signature {
    fn type_code(&self) -> u64 {
        signature_type::HMAC_WITH_SHA256
    }

    fn signature_value(&self) -> &Bytes {
        &self.signature
    }

    fn set_signature_value(&mut self, value: Bytes) {
        self.signature = value;
    }

    fn key_locator(&self) -> Option<&KeyLocator> {
        self.key_locator.as_ref()
    }
}

impl SignatureFields for DigestSha256Signature {
    fn type_code(&self) -> u64 {
        signature_type::DIGEST_SHA256
    }

    fn signature_value(&self) -> &Bytes {
        &self.signature
    }

    fn set_signature_value(&mut self, value: Bytes) {
        self.signature = value;
    }
}

impl SignatureFields for GenericSignature {
    fn type_code(&self) -> u64 {
        self.type_code
    }

    fn signature_value(&self) -> &Bytes {
        &self.signature
    }

    fn set_signature_value(&mut self, value: Bytes) {
        self.signature = value;
    }
}

#[enum_dispatch(SignatureFields)]
#[derive(Debug, Clone, PartialEq)]
pub enum Signature {
    Sha256WithRsa(Sha256WithRsaSignature),
    Sha256WithEcdsa(Sha256WithEcdsaSignature),
    HmacWithSha256(HmacWithSha256Signature),
    DigestSha256(DigestSha256Signature),
    Generic(GenericSignature),
}

impl Default for Signature {
    fn default() -> Self {
        Signature::DigestSha256(DigestSha256Signature::default())
    }
}
