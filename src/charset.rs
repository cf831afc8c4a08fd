//! Encoding labels and streaming decoders.
//!
//! WHATWG encodings are handled by `encoding_rs`. ASCII and UTF-32 are
//! decoded in-crate because `encoding_rs` does not provide them.

use std::char::REPLACEMENT_CHARACTER;
use std::fmt;
use std::str::FromStr;

use encoding_rs::{DecoderResult, Encoding, UTF_16LE, UTF_8};

use crate::error::{Result, TranscodeError};

/// How malformed input bytes are handled while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Fail on the first malformed sequence.
    #[default]
    Strict,
    /// Substitute U+FFFD for malformed sequences.
    Replace,
}

impl FromStr for DecodePolicy {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(DecodePolicy::Strict),
            "replace" => Ok(DecodePolicy::Replace),
            _ => Err(TranscodeError::InvalidConfig(format!(
                "unknown input error policy '{s}' (expected strict or replace)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Ascii,
    Web(&'static Encoding),
    Utf32 { big_endian: bool },
}

/// A resolved text encoding.
///
/// Charsets compare by name, ignoring ASCII case.
#[derive(Debug, Clone, Copy)]
pub struct Charset {
    name: &'static str,
    kind: Kind,
    bom: bool,
}

impl Charset {
    const fn new(name: &'static str, kind: Kind, bom: bool) -> Self {
        Self { name, kind, bom }
    }

    /// UTF-8 without BOM handling.
    pub fn utf8() -> Self {
        Self::new("utf-8", Kind::Web(UTF_8), false)
    }

    /// UTF-8 that drops a leading BOM on decode and writes one on encode.
    pub fn utf8_sig() -> Self {
        Self::new("utf-8-sig", Kind::Web(UTF_8), true)
    }

    /// UTF-16 with byte order taken from the BOM (little-endian when absent).
    pub fn utf16() -> Self {
        Self::new("utf-16", Kind::Web(UTF_16LE), true)
    }

    /// UTF-32 with byte order taken from the BOM (little-endian when absent).
    pub const fn utf32() -> Self {
        Self::new("utf-32", Kind::Utf32 { big_endian: false }, true)
    }

    /// 7-bit ASCII.
    pub const fn ascii() -> Self {
        Self::new("ascii", Kind::Ascii, false)
    }

    /// Resolve an encoding label, ignoring case.
    ///
    /// Besides the Unicode and ASCII names this accepts every WHATWG label
    /// known to `encoding_rs` (`latin1`, `windows-1252`, `shift_jis`, ...).
    pub fn for_label(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        let normalized = trimmed.to_ascii_lowercase().replace('_', "-");
        let charset = match normalized.as_str() {
            "utf-8-sig" | "utf8-sig" => Self::utf8_sig(),
            "utf-16" | "utf16" => Self::utf16(),
            "utf-32" | "utf32" => Self::utf32(),
            "utf-32le" | "utf-32-le" | "utf32le" => {
                Self::new("utf-32le", Kind::Utf32 { big_endian: false }, false)
            }
            "utf-32be" | "utf-32-be" | "utf32be" => {
                Self::new("utf-32be", Kind::Utf32 { big_endian: true }, false)
            }
            "utf-16-le" => Self::web(UTF_16LE),
            "utf-16-be" => Self::web(encoding_rs::UTF_16BE),
            "ascii" | "us-ascii" | "646" => Self::ascii(),
            "utf-8" | "utf8" => Self::utf8(),
            _ => Encoding::for_label_no_replacement(trimmed.as_bytes())
                .map(Self::web)
                .ok_or_else(|| TranscodeError::UnknownEncoding(trimmed.to_string()))?,
        };
        Ok(charset)
    }

    fn web(encoding: &'static Encoding) -> Self {
        Self::new(encoding.name(), Kind::Web(encoding), false)
    }

    /// Canonical name of this charset.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this charset strips a leading BOM on decode and writes one on encode.
    pub const fn uses_bom(&self) -> bool {
        self.bom
    }

    /// Case-insensitive name comparison.
    pub fn same_as(&self, other: &Charset) -> bool {
        self.name.eq_ignore_ascii_case(other.name)
    }

    pub(crate) const fn kind(&self) -> Kind {
        self.kind
    }

    /// Plain UTF-8 input can be used without transcoding.
    pub(crate) fn is_plain_utf8(&self) -> bool {
        !self.bom && self.kind == Kind::Web(UTF_8)
    }

    pub(crate) fn new_decoder(&self) -> Decoder {
        match self.kind {
            Kind::Ascii => Decoder::Ascii,
            Kind::Web(encoding) if self.bom && encoding == UTF_8 => {
                Decoder::Web(encoding.new_decoder_with_bom_removal())
            }
            // BOM sniffing picks the UTF-16 byte order and drops the BOM.
            Kind::Web(encoding) if self.bom => Decoder::Web(encoding.new_decoder()),
            Kind::Web(encoding) => Decoder::Web(encoding.new_decoder_without_bom_handling()),
            Kind::Utf32 { big_endian } => Decoder::Utf32(if self.bom {
                Utf32Decoder::sniffing()
            } else {
                Utf32Decoder::fixed(big_endian)
            }),
        }
    }
}

impl PartialEq for Charset {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Charset {}

impl Default for Charset {
    fn default() -> Self {
        Self::utf8()
    }
}

impl FromStr for Charset {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::for_label(s)
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A malformed sequence; `offset` is relative to the start of the chunk
/// being decoded (saturating at 0 when the sequence began earlier).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Malformed {
    pub(crate) offset: usize,
}

/// Incremental decoder producing UTF-8.
pub(crate) enum Decoder {
    Web(encoding_rs::Decoder),
    Ascii,
    Utf32(Utf32Decoder),
}

impl Decoder {
    /// Decode `src` into `dst`, returning the number of bytes consumed.
    ///
    /// `last` signals end of input so that trailing partial sequences are
    /// reported (strict) or replaced.
    pub(crate) fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        last: bool,
        policy: DecodePolicy,
    ) -> std::result::Result<usize, Malformed> {
        match self {
            Decoder::Web(decoder) => match policy {
                DecodePolicy::Replace => {
                    if let Some(needed) = decoder.max_utf8_buffer_length(src.len()) {
                        dst.reserve(needed);
                    }
                    let (_, read, _) = decoder.decode_to_string(src, dst, last);
                    Ok(read)
                }
                DecodePolicy::Strict => {
                    if let Some(needed) =
                        decoder.max_utf8_buffer_length_without_replacement(src.len())
                    {
                        dst.reserve(needed);
                    }
                    let (result, read) = decoder.decode_to_string_without_replacement(src, dst, last);
                    match result {
                        DecoderResult::Malformed(bad, after) => Err(Malformed {
                            offset: read.saturating_sub(bad as usize + after as usize),
                        }),
                        DecoderResult::InputEmpty | DecoderResult::OutputFull => Ok(read),
                    }
                }
            },
            Decoder::Ascii => {
                dst.reserve(src.len());
                for (i, &byte) in src.iter().enumerate() {
                    if byte.is_ascii() {
                        dst.push(byte as char);
                    } else if policy == DecodePolicy::Replace {
                        dst.push(REPLACEMENT_CHARACTER);
                    } else {
                        return Err(Malformed { offset: i });
                    }
                }
                Ok(src.len())
            }
            Decoder::Utf32(decoder) => decoder.decode(src, dst, last, policy),
        }
    }
}

/// UTF-32 decoder carrying partial code units across chunks.
pub(crate) struct Utf32Decoder {
    /// `None` until the first unit has been inspected for a BOM.
    big_endian: Option<bool>,
    carry: [u8; 4],
    carry_len: usize,
}

impl Utf32Decoder {
    fn sniffing() -> Self {
        Self {
            big_endian: None,
            carry: [0; 4],
            carry_len: 0,
        }
    }

    fn fixed(big_endian: bool) -> Self {
        Self {
            big_endian: Some(big_endian),
            ..Self::sniffing()
        }
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        last: bool,
        policy: DecodePolicy,
    ) -> std::result::Result<usize, Malformed> {
        dst.reserve(src.len());
        let mut pos = 0;
        while pos < src.len() {
            let take = (4 - self.carry_len).min(src.len() - pos);
            self.carry[self.carry_len..self.carry_len + take].copy_from_slice(&src[pos..pos + take]);
            self.carry_len += take;
            pos += take;
            if self.carry_len < 4 {
                break;
            }
            self.carry_len = 0;
            let unit = self.carry;
            if !self.push_unit(unit, dst, policy) {
                return Err(Malformed {
                    offset: pos.saturating_sub(4),
                });
            }
        }

        if last && self.carry_len > 0 {
            let partial = self.carry_len;
            self.carry_len = 0;
            match policy {
                DecodePolicy::Replace => dst.push(REPLACEMENT_CHARACTER),
                DecodePolicy::Strict => {
                    return Err(Malformed {
                        offset: src.len().saturating_sub(partial),
                    });
                }
            }
        }
        Ok(src.len())
    }

    /// Returns false when the unit is not a Unicode scalar value under the
    /// strict policy.
    fn push_unit(&mut self, unit: [u8; 4], dst: &mut String, policy: DecodePolicy) -> bool {
        let big_endian = match self.big_endian {
            Some(order) => order,
            None => match unit {
                [0xFF, 0xFE, 0x00, 0x00] => {
                    self.big_endian = Some(false);
                    return true;
                }
                [0x00, 0x00, 0xFE, 0xFF] => {
                    self.big_endian = Some(true);
                    return true;
                }
                _ => {
                    self.big_endian = Some(false);
                    false
                }
            },
        };

        let value = if big_endian {
            u32::from_be_bytes(unit)
        } else {
            u32::from_le_bytes(unit)
        };
        match char::from_u32(value) {
            Some(c) => dst.push(c),
            None if policy == DecodePolicy::Replace => dst.push(REPLACEMENT_CHARACTER),
            None => return false,
        }
        true
    }
}
