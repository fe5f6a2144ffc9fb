// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Forward-consuming TLV decoder with nested scopes.
//!
//! The decoder owns an input slice and a current offset. A nested scope is
//! opened with [`TlvDecoder::read_nested_tlvs_start`], which returns the
//! scope's end offset; every read inside the scope is bounded by it, and
//! [`TlvDecoder::finish_nested_tlvs`] closes the scope, skipping unknown
//! TLVs the critical-type rule permits.

use crate::codec::{error::CodecError, var_number};

/// Unknown TLV types above 31 with the low bit set may be skipped on
/// decode; everything else is critical.
#[inline]
pub fn is_ignorable(ty: u64) -> bool {
    ty > 0x1f && ty & 1 == 1
}

pub struct TlvDecoder<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> TlvDecoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, offset: 0 }
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn seek(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// Bytes of the input between two absolute offsets.
    pub fn get_slice(&self, begin: usize, end: usize) -> Result<&'a [u8], CodecError> {
        if begin > end || end > self.input.len() {
            return Err(CodecError::InvalidEncoding(format!(
                "slice {begin}..{end} outside the {}-byte input",
                self.input.len()
            )));
        }
        Ok(&self.input[begin..end])
    }

    pub fn read_var_number(&mut self) -> Result<u64, CodecError> {
        let (value, width) = var_number::decode(&self.input[self.offset..])?;
        self.offset += width;
        Ok(value)
    }

    /// Read `type || length`, demanding `expected`; returns the length.
    pub fn read_type_and_length(&mut self, expected: u64) -> Result<u64, CodecError> {
        let ty = self.read_var_number()?;
        if ty != expected {
            return Err(CodecError::InvalidEncoding(format!(
                "expected TLV type {expected}, got {ty}"
            )));
        }
        let length = self.read_var_number()?;
        if self.offset as u64 + length > self.input.len() as u64 {
            return Err(CodecError::InvalidEncoding(format!(
                "TLV length {length} exceeds the enclosing scope"
            )));
        }
        Ok(length)
    }

    /// Open a nested scope of the given type; returns the scope end offset.
    pub fn read_nested_tlvs_start(
        &mut self,
        expected: u64,
    ) -> Result<usize, CodecError> {
        let length = self.read_type_and_length(expected)?;
        Ok(self.offset + length as usize)
    }

    /// Close a nested scope, skipping any trailing TLVs whose type the
    /// critical-type rule allows the decoder to ignore.
    pub fn finish_nested_tlvs(&mut self, end_offset: usize) -> Result<(), CodecError> {
        if self.offset == end_offset {
            return Ok(());
        }
        while self.offset < end_offset {
            let ty = self.read_var_number()?;
            let length = self.read_var_number()?;
            if !is_ignorable(ty) {
                return Err(CodecError::UnexpectedType(ty));
            }
            self.offset += length as usize;
            if self.offset > end_offset {
                return Err(CodecError::InvalidEncoding(format!(
                    "TLV length {length} exceeds the enclosing scope"
                )));
            }
        }
        Ok(())
    }

    /// Look at the next TLV type without consuming it, bounded by the
    /// scope end.
    pub fn peek_type(&self, ty: u64, end_offset: usize) -> bool {
        if self.offset >= end_offset {
            return false;
        }
        matches!(
            var_number::try_decode(&self.input[self.offset..end_offset.min(self.input.len())]),
            Some((t, _)) if t == ty
        )
    }

    pub fn read_blob_tlv(&mut self, ty: u64) -> Result<&'a [u8], CodecError> {
        let length = self.read_type_and_length(ty)? as usize;
        let value = &self.input[self.offset..self.offset + length];
        self.offset += length;
        Ok(value)
    }

    pub fn read_optional_blob_tlv(
        &mut self,
        ty: u64,
        end_offset: usize,
    ) -> Result<Option<&'a [u8]>, CodecError> {
        if self.peek_type(ty, end_offset) {
            Ok(Some(self.read_blob_tlv(ty)?))
        } else {
            Ok(None)
        }
    }

    /// A zero-length TLV of the given type reads as `true`; absence as
    /// `false`.
    pub fn read_boolean_tlv(
        &mut self,
        ty: u64,
        end_offset: usize,
    ) -> Result<bool, CodecError> {
        if self.peek_type(ty, end_offset) {
            // value bytes, if any, are ignored
            let length = self.read_type_and_length(ty)? as usize;
            self.offset += length;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Big-endian integer of exactly 1, 2, 4 or 8 bytes.
    pub fn read_non_negative_integer(
        &mut self,
        length: usize,
    ) -> Result<u64, CodecError> {
        if self.offset + length > self.input.len() {
            return Err(CodecError::InvalidEncoding(
                "truncated non-negative integer".to_string(),
            ));
        }
        let bytes = &self.input[self.offset..self.offset + length];
        let value = match length {
            1 => u64::from(bytes[0]),
            2 => u64::from(u16::from_be_bytes([bytes[0], bytes[1]])),
            4 => u64::from(u32::from_be_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ])),
            8 => u64::from_be_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6],
                bytes[7],
            ]),
            other => {
                return Err(CodecError::InvalidEncoding(format!(
                    "invalid non-negative integer length {other}"
                )));
            },
        };
        self.offset += length;
        Ok(value)
    }

    pub fn read_non_negative_integer_tlv(
        &mut self,
        ty: u64,
    ) -> Result<u64, CodecError> {
        let length = self.read_type_and_length(ty)?;
        self.read_non_negative_integer(length as usize)
    }

    pub fn read_optional_non_negative_integer_tlv(
        &mut self,
        ty: u64,
        end_offset: usize,
    ) -> Result<Option<u64>, CodecError> {
        if self.peek_type(ty, end_offset) {
            Ok(Some(self.read_non_negative_integer_tlv(ty)?))
        } else {
            Ok(None)
        }
    }

    /// Skip one TLV of any type, validating only that it is well formed.
    pub fn skip_tlv(&mut self) -> Result<(u64, usize), CodecError> {
        let begin = self.offset;
        let ty = self.read_var_number()?;
        let length = self.read_var_number()?;
        if self.offset as u64 + length > self.input.len() as u64 {
            return Err(CodecError::InvalidEncoding(format!(
                "TLV length {length} exceeds the enclosing scope"
            )));
        }
        self.offset += length as usize;
        Ok((ty, begin))
    }
}
