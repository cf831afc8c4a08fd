//! Byte-order-mark sniffing.
//!
//! Only encodings announced by a leading BOM are detected. Everything else
//! falls back to the caller-supplied default.

use std::fmt;

use crate::charset::Charset;

/// UTF-8 BOM: EF BB BF
pub const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];
/// UTF-16 little-endian BOM: FF FE
pub const BOM_UTF16_LE: &[u8] = &[0xFF, 0xFE];
/// UTF-16 big-endian BOM: FE FF
pub const BOM_UTF16_BE: &[u8] = &[0xFE, 0xFF];
/// UTF-32 little-endian BOM: FF FE 00 00
pub const BOM_UTF32_LE: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
/// UTF-32 big-endian BOM: 00 00 FE FF
pub const BOM_UTF32_BE: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];

/// Longest BOM signature, the minimum useful sniffing window.
pub const MAX_BOM_LEN: usize = 4;

/// Encoding announced by a byte-order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncodingTag {
    /// UTF-8 preceded by EF BB BF.
    Utf8Bom,
    /// UTF-16, little-endian.
    Utf16Le,
    /// UTF-16, big-endian.
    Utf16Be,
    /// UTF-32, little-endian.
    Utf32Le,
    /// UTF-32, big-endian.
    Utf32Be,
    /// No BOM present.
    #[default]
    Unspecified,
}

/// Signatures in match order.
///
/// The UTF-32LE signature starts with the UTF-16LE one, so the 4-byte
/// signatures must be tried before the 2-byte ones.
const SIGNATURES: &[(&[u8], EncodingTag)] = &[
    (BOM_UTF32_LE, EncodingTag::Utf32Le),
    (BOM_UTF32_BE, EncodingTag::Utf32Be),
    (BOM_UTF8, EncodingTag::Utf8Bom),
    (BOM_UTF16_LE, EncodingTag::Utf16Le),
    (BOM_UTF16_BE, EncodingTag::Utf16Be),
];

/// Detect the encoding signaled by a leading BOM in `window`.
///
/// The window is only inspected; callers obtain it with a peek so the
/// stream position is unaffected.
pub fn detect_bom(window: &[u8]) -> EncodingTag {
    SIGNATURES
        .iter()
        .find(|(bom, _)| window.starts_with(bom))
        .map_or(EncodingTag::Unspecified, |&(_, tag)| tag)
}

impl EncodingTag {
    /// Length of the BOM in bytes (0 for `Unspecified`).
    pub const fn bom_len(&self) -> usize {
        match self {
            EncodingTag::Utf8Bom => 3,
            EncodingTag::Utf16Le | EncodingTag::Utf16Be => 2,
            EncodingTag::Utf32Le | EncodingTag::Utf32Be => 4,
            EncodingTag::Unspecified => 0,
        }
    }

    /// Returns true if a BOM was found.
    pub const fn is_detected(&self) -> bool {
        !matches!(self, EncodingTag::Unspecified)
    }

    /// The charset used to decode a stream carrying this BOM.
    ///
    /// The returned charsets strip the BOM while decoding; UTF-16 and UTF-32
    /// take their byte order from it.
    pub fn charset(&self) -> Option<Charset> {
        match self {
            EncodingTag::Utf8Bom => Some(Charset::utf8_sig()),
            EncodingTag::Utf16Le | EncodingTag::Utf16Be => Some(Charset::utf16()),
            EncodingTag::Utf32Le | EncodingTag::Utf32Be => Some(Charset::utf32()),
            EncodingTag::Unspecified => None,
        }
    }
}

impl fmt::Display for EncodingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncodingTag::Utf8Bom => "UTF-8-BOM",
            EncodingTag::Utf16Le => "UTF-16LE",
            EncodingTag::Utf16Be => "UTF-16BE",
            EncodingTag::Utf32Le => "UTF-32LE",
            EncodingTag::Utf32Be => "UTF-32BE",
            EncodingTag::Unspecified => "unspecified",
        };
        f.write_str(name)
    }
}
