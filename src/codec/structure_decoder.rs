// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Streaming framer: scan an incoming byte stream until one complete
//! top-level TLV element has been seen.
//!
//! Each call to [`StructureDecoder::find_element_end`] receives only the
//! bytes that arrived since the previous call; everything older has already
//! been consumed. A type or length var-number whose final byte has not yet
//! arrived is stashed in an internal header buffer and completed on the
//! next call, so repeated calls with a growing stream make monotonic
//! progress and the total scanned bytes equal the element size exactly.

use crate::codec::{error::CodecError, var_number};

/// type var-number (9) + length var-number (9)
const MAX_HEADER_LEN: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ReadHeaderOrClose,
    ReadBytes,
}

pub struct StructureDecoder {
    got_element_end: bool,
    /// Stream offset since the last reset; one past the element end once
    /// `got_element_end` is set.
    offset: usize,
    /// 0 outside an element, 1 while its value bytes are being consumed.
    level: usize,
    state: State,
    header_buffer: [u8; MAX_HEADER_LEN],
    header_length: usize,
    use_header_buffer: bool,
    n_bytes_to_read: usize,
}

impl Default for StructureDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureDecoder {
    pub fn new() -> Self {
        Self {
            got_element_end: false,
            offset: 0,
            level: 0,
            state: State::ReadHeaderOrClose,
            header_buffer: [0u8; MAX_HEADER_LEN],
            header_length: 0,
            use_header_buffer: false,
            n_bytes_to_read: 0,
        }
    }

    #[inline]
    pub fn got_element_end(&self) -> bool {
        self.got_element_end
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Re-arm for the next element.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn start_value(&mut self, length: u64) {
        if length == 0 {
            // a zero-length top-level element is already complete
            self.got_element_end = true;
        } else {
            self.level = 1;
            self.n_bytes_to_read = length as usize;
            self.state = State::ReadBytes;
        }
    }

    /// Consume bytes from `input` (the new chunk only). Returns `true`
    /// when the element is complete; `offset()` is then one past its end.
    pub fn find_element_end(&mut self, input: &[u8]) -> Result<bool, CodecError> {
        let mut i = 0usize;
        loop {
            if self.got_element_end {
                return Ok(true);
            }
            match self.state {
                State::ReadHeaderOrClose => {
                    if !self.use_header_buffer {
                        match try_decode_header(&input[i..]) {
                            Some((length, used)) => {
                                i += used;
                                self.offset += used;
                                self.start_value(length);
                            },
                            None => {
                                // header split across chunks: stash the tail
                                let avail = input.len() - i;
                                self.header_buffer[..avail]
                                    .copy_from_slice(&input[i..]);
                                self.header_length = avail;
                                self.use_header_buffer = true;
                                self.offset += avail;
                                return Ok(false);
                            },
                        }
                    } else {
                        loop {
                            if let Some((length, used)) = try_decode_header(
                                &self.header_buffer[..self.header_length],
                            ) {
                                debug_assert_eq!(used, self.header_length);
                                self.use_header_buffer = false;
                                self.header_length = 0;
                                self.start_value(length);
                                break;
                            }
                            if i >= input.len() {
                                return Ok(false);
                            }
                            if self.header_length >= MAX_HEADER_LEN {
                                return Err(CodecError::InvalidEncoding(
                                    "TLV header longer than 18 bytes".to_string(),
                                ));
                            }
                            self.header_buffer[self.header_length] = input[i];
                            self.header_length += 1;
                            i += 1;
                            self.offset += 1;
                        }
                    }
                },
                State::ReadBytes => {
                    let avail = input.len() - i;
                    if avail == 0 {
                        return Ok(false);
                    }
                    let take = avail.min(self.n_bytes_to_read);
                    i += take;
                    self.offset += take;
                    self.n_bytes_to_read -= take;
                    if self.n_bytes_to_read == 0 {
                        self.level = 0;
                        self.got_element_end = true;
                        return Ok(true);
                    }
                    return Ok(false);
                },
            }
        }
    }
}

/// Decode `type || length` from the front of `buf`; `None` while
/// incomplete. Returns the length value and the header width.
fn try_decode_header(buf: &[u8]) -> Option<(u64, usize)> {
    let (_ty, n_type) = var_number::try_decode(buf)?;
    let (length, n_length) = var_number::try_decode(&buf[n_type..])?;
    Some((length, n_type + n_length))
}
