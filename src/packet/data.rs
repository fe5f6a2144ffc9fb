// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Data packet: a signed, named payload.

use bytes::Bytes;

use crate::packet::{
    name::{Name, NameComponent},
    signature::Signature,
    tlv::content_type,
};

/// `ContentType` of a Data packet. `Blob` is the default and is omitted
/// on the wire; codes this library does not name round-trip as `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentType {
    #[default]
    Blob,
    Link,
    Key,
    Nack,
    Other(u64),
}

impl ContentType {
    pub fn code(self) -> u64 {
        match self {
            ContentType::Blob => content_type::BLOB,
            ContentType::Link => content_type::LINK,
            ContentType::Key => content_type::KEY,
            ContentType::Nack => content_type::NACK,
            ContentType::Other(code) => code,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            content_type::LINK => ContentType::Link,
            content_type::KEY => ContentType::Key,
            content_type::BLOB => ContentType::Blob,
            content_type::NACK => ContentType::Nack,
            other => ContentType::Other(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaInfo {
    content_type: ContentType,
    freshness_period_ms: Option<u64>,
    final_block_id: Option<NameComponent>,
}

impl MetaInfo {
    #[inline]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn set_content_type(&mut self, content_type: ContentType) -> &mut Self {
        self.content_type = content_type;
        self
    }

    #[inline]
    pub fn freshness_period_ms(&self) -> Option<u64> {
        self.freshness_period_ms
    }

    pub fn set_freshness_period_ms(&mut self, value: Option<u64>) -> &mut Self {
        self.freshness_period_ms = value;
        self
    }

    #[inline]
    pub fn final_block_id(&self) -> Option<&NameComponent> {
        self.final_block_id.as_ref()
    }

    pub fn set_final_block_id(&mut self, value: Option<NameComponent>) -> &mut Self {
        self.final_block_id = value;
        self
    }

    /// Whether every field still has its default value.
    pub fn is_default(&self) -> bool {
        self.content_type == ContentType::Blob
            && self.freshness_period_ms.is_none()
            && self.final_block_id.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Data {
    name: Name,
    meta_info: MetaInfo,
    content: Bytes,
    signature: Signature,
}

impl Data {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn name_mut(&mut self) -> &mut Name {
        &mut self.name
    }

    pub fn set_name(&mut self, name: Name) -> &mut Self {
        self.name = name;
        self
    }

    #[inline]
    pub fn meta_info(&self) -> &MetaInfo {
        &self.meta_info
    }

    pub fn meta_info_mut(&mut self) -> &mut MetaInfo {
        &mut self.meta_info
    }

    #[inline]
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn set_content(&mut self, content: Bytes) -> &mut Self {
        self.content = content;
        self
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn signature_mut(&mut self) -> &mut Signature {
        &mut self.signature
    }

    pub fn set_signature(&mut self, signature: Signature) -> &mut Self {
        self.signature = signature;
        self
    }
}
