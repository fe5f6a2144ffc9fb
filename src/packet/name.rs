// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! NDN names: ordered sequences of opaque, typed components.
//!
//! Equality is component-wise; ordering is the canonical NDN order (common
//! prefix first, then the shorter name, with components compared by type
//! code, length and bytes). Appending never disturbs an existing prefix
//! relation.

use std::{cmp::Ordering, fmt, str::FromStr};

use bytes::Bytes;

use crate::codec::error::CodecError;

/// Marker octet of a version component under the naming conventions.
const VERSION_MARKER: u8 = 0xfd;
/// Marker octet of a segment-number component.
const SEGMENT_MARKER: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Generic,
    ImplicitSha256Digest,
}

impl ComponentType {
    /// The TLV type number the component is encoded with.
    #[inline]
    pub fn type_number(self) -> u64 {
        match self {
            ComponentType::Generic => crate::packet::tlv::NAME_COMPONENT,
            ComponentType::ImplicitSha256Digest => {
                crate::packet::tlv::IMPLICIT_SHA256_DIGEST_COMPONENT
            },
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NameComponent {
    value: Bytes,
    component_type: ComponentType,
}

impl NameComponent {
    pub fn new(value: Bytes) -> Self {
        Self {
            value,
            component_type: ComponentType::Generic,
        }
    }

    pub fn from_bytes(value: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(value))
    }

    pub fn from_implicit_sha256_digest(digest: Bytes) -> Self {
        Self {
            value: digest,
            component_type: ComponentType::ImplicitSha256Digest,
        }
    }

    pub fn with_type(value: Bytes, component_type: ComponentType) -> Self {
        Self {
            value,
            component_type,
        }
    }

    /// A generic component holding the big-endian bytes of `number`
    /// (smallest of the 1/2/4/8-byte widths).
    pub fn from_number(number: u64) -> Self {
        Self::new(Bytes::from(non_negative_integer_bytes(number)))
    }

    /// `marker || NonNegativeInteger(number)`, the shape the naming
    /// conventions use for versions and segment numbers.
    pub fn from_number_with_marker(number: u64, marker: u8) -> Self {
        let mut bytes = Vec::with_capacity(9);
        bytes.push(marker);
        bytes.extend_from_slice(&non_negative_integer_bytes(number));
        Self::new(Bytes::from(bytes))
    }

    pub fn from_version(version: u64) -> Self {
        Self::from_number_with_marker(version, VERSION_MARKER)
    }

    pub fn from_segment(segment: u64) -> Self {
        Self::from_number_with_marker(segment, SEGMENT_MARKER)
    }

    #[inline]
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    #[inline]
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    #[inline]
    pub fn is_implicit_sha256_digest(&self) -> bool {
        self.component_type == ComponentType::ImplicitSha256Digest
    }

    /// Interpret the whole value as a big-endian integer.
    pub fn to_number(&self) -> Result<u64, CodecError> {
        if self.value.is_empty() || self.value.len() > 8 {
            return Err(CodecError::InvalidEncoding(format!(
                "component of {} bytes is not a number",
                self.value.len()
            )));
        }
        let mut number = 0u64;
        for b in self.value.iter() {
            number = number << 8 | u64::from(*b);
        }
        Ok(number)
    }

    pub fn to_number_with_marker(&self, marker: u8) -> Result<u64, CodecError> {
        match self.value.first() {
            Some(&first) if first == marker => {
                if self.value.len() == 1 || self.value.len() > 9 {
                    return Err(CodecError::InvalidEncoding(
                        "marker component has no number bytes".to_string(),
                    ));
                }
                let mut number = 0u64;
                for b in &self.value[1..] {
                    number = number << 8 | u64::from(*b);
                }
                Ok(number)
            },
            _ => Err(CodecError::InvalidEncoding(format!(
                "component does not start with marker {marker:#04x}"
            ))),
        }
    }

    pub fn to_version(&self) -> Result<u64, CodecError> {
        self.to_number_with_marker(VERSION_MARKER)
    }

    pub fn to_segment(&self) -> Result<u64, CodecError> {
        self.to_number_with_marker(SEGMENT_MARKER)
    }

    /// The URI form of this component alone.
    pub fn to_escaped_string(&self) -> String {
        let mut out = String::new();
        if self.is_implicit_sha256_digest() {
            out.push_str("sha256digest=");
            out.push_str(&hex::encode(&self.value));
            return out;
        }
        if !self.value.is_empty() && self.value.iter().all(|&b| b == b'.') {
            // an all-period value gains three extra dots
            out.push_str("...");
        }
        for &b in self.value.iter() {
            if b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.' | b'_' | b'~')
            {
                out.push(b as char);
            } else {
                out.push('%');
                out.push_str(&format!("{b:02X}"));
            }
        }
        if self.value.is_empty() {
            out.push_str("...");
        }
        out
    }

    /// Parse one URI path segment into a component.
    pub fn from_escaped_string(escaped: &str) -> Result<Self, CodecError> {
        if let Some(hex_digest) = escaped.strip_prefix("sha256digest=") {
            let digest = hex::decode(hex_digest).map_err(|e| {
                CodecError::InvalidEncoding(format!("bad sha256digest component: {e}"))
            })?;
            if digest.len() != 32 {
                return Err(CodecError::InvalidEncoding(
                    "sha256digest component must hold 32 bytes".to_string(),
                ));
            }
            return Ok(Self::from_implicit_sha256_digest(Bytes::from(digest)));
        }

        let mut bytes = unescape(escaped)?;
        if !bytes.is_empty() && bytes.iter().all(|&b| b == b'.') {
            // strip the three extra dots added on output
            if bytes.len() < 3 {
                return Err(CodecError::InvalidEncoding(format!(
                    "invalid dot component \"{escaped}\""
                )));
            }
            bytes.drain(..3);
        }
        Ok(Self::new(Bytes::from(bytes)))
    }
}

impl fmt::Debug for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_escaped_string())
    }
}

impl Ord for NameComponent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.component_type
            .type_number()
            .cmp(&other.component_type.type_number())
            .then_with(|| self.value.len().cmp(&other.value.len()))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for NameComponent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_uri(uri: &str) -> Result<Self, CodecError> {
        let trimmed = uri.trim();
        let mut name = Name::new();
        let path = trimmed
            .strip_prefix("ndn:")
            .unwrap_or(trimmed)
            .trim_start_matches('/');
        if path.is_empty() {
            return Ok(name);
        }
        for part in path.split('/') {
            if part.is_empty() {
                continue;
            }
            name.components.push(NameComponent::from_escaped_string(part)?);
        }
        Ok(name)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component at `i`; negative indices count from the end, as in
    /// `name.get(-1)` for the last component.
    pub fn get(&self, i: isize) -> Option<&NameComponent> {
        let index = if i < 0 {
            self.components.len().checked_sub(i.unsigned_abs())?
        } else {
            i as usize
        };
        self.components.get(index)
    }

    pub fn components(&self) -> &[NameComponent] {
        &self.components
    }

    pub fn append(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn append_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.append(NameComponent::from_bytes(value))
    }

    pub fn append_str(&mut self, value: &str) -> &mut Self {
        self.append_bytes(value.as_bytes())
    }

    pub fn append_name(&mut self, other: &Name) -> &mut Self {
        self.components.extend(other.components.iter().cloned());
        self
    }

    pub fn append_number(&mut self, number: u64) -> &mut Self {
        self.append(NameComponent::from_number(number))
    }

    pub fn append_version(&mut self, version: u64) -> &mut Self {
        self.append(NameComponent::from_version(version))
    }

    pub fn append_segment(&mut self, segment: u64) -> &mut Self {
        self.append(NameComponent::from_segment(segment))
    }

    /// First `n` components; a negative `n` leaves off `-n` from the end.
    pub fn get_prefix(&self, n: isize) -> Name {
        let count = if n < 0 {
            self.components.len().saturating_sub(n.unsigned_abs())
        } else {
            (n as usize).min(self.components.len())
        };
        Name {
            components: self.components[..count].to_vec(),
        }
    }

    pub fn get_sub_name(&self, start: usize, count: usize) -> Name {
        let begin = start.min(self.components.len());
        let end = (begin + count).min(self.components.len());
        Name {
            components: self.components[begin..end].to_vec(),
        }
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|(a, b)| a == b)
    }

    pub fn to_uri(&self) -> String {
        if self.components.is_empty() {
            return "/".to_string();
        }
        let mut uri = String::new();
        for c in &self.components {
            uri.push('/');
            uri.push_str(&c.to_escaped_string());
        }
        uri
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl FromStr for Name {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::from_uri(s)
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(&other.components) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn non_negative_integer_bytes(value: u64) -> Vec<u8> {
    if value <= 0xff {
        vec![value as u8]
    } else if value <= 0xffff {
        (value as u16).to_be_bytes().to_vec()
    } else if value <= 0xffff_ffff {
        (value as u32).to_be_bytes().to_vec()
    } else {
        value.to_be_bytes().to_vec()
    }
}

fn unescape(escaped: &str) -> Result<Vec<u8>, CodecError> {
    let raw = escaped.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0usize;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex_pair = raw.get(i + 1..i + 3).ok_or_else(|| {
                CodecError::InvalidEncoding(format!(
                    "truncated percent escape in \"{escaped}\""
                ))
            })?;
            let byte = u8::from_str_radix(
                std::str::from_utf8(hex_pair).map_err(|_| {
                    CodecError::InvalidEncoding(format!(
                        "bad percent escape in \"{escaped}\""
                    ))
                })?,
                16,
            )
            .map_err(|_| {
                CodecError::InvalidEncoding(format!(
                    "bad percent escape in \"{escaped}\""
                ))
            })?;
            out.push(byte);
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    Ok(out)
}
