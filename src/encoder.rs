//! Output encoding with per-character error policies.

use std::fmt;
use std::str::FromStr;

use encoding_rs::{EncoderResult, UTF_16BE, UTF_16LE, UTF_8};

use crate::charset::{Charset, Kind};
use crate::error::{Result, TranscodeError};

/// What to do with a character the output charset cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorPolicy {
    /// Abort the run.
    #[default]
    Strict,
    /// Write `?` instead.
    Replace,
    /// Drop the character.
    Ignore,
    /// Write `\xNN`, `\uNNNN` or `\UNNNNNNNN`.
    Escape,
}

impl ErrorPolicy {
    /// The text written in place of `c`, or `None` under `Strict`.
    pub fn substitute(&self, c: char) -> Option<String> {
        match self {
            ErrorPolicy::Strict => None,
            ErrorPolicy::Replace => Some("?".to_string()),
            ErrorPolicy::Ignore => Some(String::new()),
            ErrorPolicy::Escape => Some(match c as u32 {
                code @ 0..=0xFF => format!("\\x{code:02x}"),
                code @ 0x100..=0xFFFF => format!("\\u{code:04x}"),
                code => format!("\\U{code:08x}"),
            }),
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(ErrorPolicy::Strict),
            "replace" => Ok(ErrorPolicy::Replace),
            "ignore" => Ok(ErrorPolicy::Ignore),
            "escape" | "backslashreplace" => Ok(ErrorPolicy::Escape),
            _ => Err(TranscodeError::InvalidConfig(format!(
                "unknown output error policy '{s}' (expected strict, replace, ignore or escape)"
            ))),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorPolicy::Strict => "strict",
            ErrorPolicy::Replace => "replace",
            ErrorPolicy::Ignore => "ignore",
            ErrorPolicy::Escape => "escape",
        };
        f.write_str(name)
    }
}

/// A character rejected under the strict policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unmappable {
    /// The rejected character.
    pub character: char,
    /// Byte offset of the character in the text passed to `encode`.
    pub offset: usize,
}

enum Backend {
    Utf8,
    Utf16 { big_endian: bool },
    Utf32 { big_endian: bool },
    Ascii,
    Web(encoding_rs::Encoder),
}

/// Encodes UTF-8 text into the output charset.
///
/// Charsets that carry a BOM get it in front of the first non-empty text.
pub struct OutputEncoder {
    policy: ErrorPolicy,
    backend: Backend,
    bom_pending: bool,
}

impl OutputEncoder {
    /// Create an encoder for `charset` applying `policy` to unmappable characters.
    pub fn new(charset: Charset, policy: ErrorPolicy) -> Self {
        let backend = match charset.kind() {
            Kind::Ascii => Backend::Ascii,
            Kind::Utf32 { big_endian } => Backend::Utf32 { big_endian },
            Kind::Web(encoding) if encoding == UTF_8 => Backend::Utf8,
            Kind::Web(encoding) if encoding == UTF_16LE => Backend::Utf16 { big_endian: false },
            Kind::Web(encoding) if encoding == UTF_16BE => Backend::Utf16 { big_endian: true },
            Kind::Web(encoding) => Backend::Web(encoding.new_encoder()),
        };
        Self {
            policy,
            backend,
            bom_pending: charset.uses_bom(),
        }
    }

    /// Append the encoding of `text` to `out`.
    ///
    /// On a strict failure `out` may hold a partial encoding of `text`;
    /// callers discard it.
    pub fn encode(&mut self, text: &str, out: &mut Vec<u8>) -> std::result::Result<(), Unmappable> {
        if text.is_empty() {
            return Ok(());
        }
        if self.bom_pending {
            self.bom_pending = false;
            encode_unicode(&self.backend, '\u{FEFF}', out);
        }

        let policy = self.policy;
        match &mut self.backend {
            Backend::Utf8 => out.extend_from_slice(text.as_bytes()),
            backend @ (Backend::Utf16 { .. } | Backend::Utf32 { .. }) => {
                for c in text.chars() {
                    encode_unicode(backend, c, out);
                }
            }
            Backend::Ascii => {
                for (offset, c) in text.char_indices() {
                    if c.is_ascii() {
                        out.push(c as u8);
                    } else {
                        let substitute = policy
                            .substitute(c)
                            .ok_or(Unmappable { character: c, offset })?;
                        out.extend_from_slice(substitute.as_bytes());
                    }
                }
            }
            Backend::Web(encoder) => encode_web(encoder, text, out, policy)?,
        }
        Ok(())
    }

    /// Flush encoder state (stateful encodings such as ISO-2022-JP return
    /// to ASCII here).
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if let Backend::Web(encoder) = &mut self.backend {
            let mut extra = encoder
                .max_buffer_length_from_utf8_without_replacement(0)
                .unwrap_or(16)
                .max(16);
            loop {
                out.reserve(extra);
                match encoder.encode_from_utf8_to_vec_without_replacement("", out, true) {
                    (EncoderResult::OutputFull, _) => extra *= 2,
                    // Empty input has nothing left to map.
                    (EncoderResult::InputEmpty | EncoderResult::Unmappable(_), _) => break,
                }
            }
        }
    }
}

/// Encode a character with a Unicode backend.
fn encode_unicode(backend: &Backend, c: char, out: &mut Vec<u8>) {
    match backend {
        Backend::Utf8 => {
            let mut buf = [0; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
        Backend::Utf16 { big_endian } => {
            let mut buf = [0; 2];
            for unit in c.encode_utf16(&mut buf) {
                let bytes = if *big_endian {
                    unit.to_be_bytes()
                } else {
                    unit.to_le_bytes()
                };
                out.extend_from_slice(&bytes);
            }
        }
        Backend::Utf32 { big_endian } => {
            let bytes = if *big_endian {
                (c as u32).to_be_bytes()
            } else {
                (c as u32).to_le_bytes()
            };
            out.extend_from_slice(&bytes);
        }
        // BOM-carrying charsets are all Unicode.
        Backend::Ascii | Backend::Web(_) => {}
    }
}

fn encode_web(
    encoder: &mut encoding_rs::Encoder,
    text: &str,
    out: &mut Vec<u8>,
    policy: ErrorPolicy,
) -> std::result::Result<(), Unmappable> {
    let mut rest = text;
    loop {
        if let Some(needed) = encoder.max_buffer_length_from_utf8_without_replacement(rest.len()) {
            out.reserve(needed);
        }
        let consumed_before = text.len() - rest.len();
        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(rest, out, false);
        rest = &rest[read..];
        match result {
            EncoderResult::InputEmpty => return Ok(()),
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(c) => {
                let substitute = policy.substitute(c).ok_or(Unmappable {
                    character: c,
                    offset: consumed_before + read - c.len_utf8(),
                })?;
                // Substitutes are ASCII, which every WHATWG encoder can map.
                encode_web(encoder, &substitute, out, ErrorPolicy::Strict)?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(label: &str, policy: ErrorPolicy, text: &str) -> std::result::Result<Vec<u8>, Unmappable> {
        let mut encoder = OutputEncoder::new(Charset::for_label(label).unwrap(), policy);
        let mut out = Vec::new();
        encoder.encode(text, &mut out)?;
        encoder.finish(&mut out);
        Ok(out)
    }

    #[test]
    fn test_utf8_passthrough() {
        assert_eq!(encode("utf-8", ErrorPolicy::Strict, "é|x").unwrap(), "é|x".as_bytes());
    }

    #[test]
    fn test_bom_written_once() {
        let mut encoder = OutputEncoder::new(Charset::utf8_sig(), ErrorPolicy::Strict);
        let mut out = Vec::new();
        encoder.encode("", &mut out).unwrap();
        assert!(out.is_empty());
        encoder.encode("a\n", &mut out).unwrap();
        encoder.encode("b\n", &mut out).unwrap();
        assert_eq!(out, b"\xEF\xBB\xBFa\nb\n");
    }

    #[test]
    fn test_utf16_output() {
        assert_eq!(encode("utf-16", ErrorPolicy::Strict, "a").unwrap(), [0xFF, 0xFE, b'a', 0x00]);
        assert_eq!(encode("utf-16be", ErrorPolicy::Strict, "a").unwrap(), [0x00, b'a']);
        assert_eq!(
            encode("utf-16le", ErrorPolicy::Strict, "😀").unwrap(),
            [0x3D, 0xD8, 0x00, 0xDE]
        );
    }

    #[test]
    fn test_utf32_output() {
        assert_eq!(
            encode("utf-32", ErrorPolicy::Strict, "a").unwrap(),
            [0xFF, 0xFE, 0x00, 0x00, b'a', 0x00, 0x00, 0x00]
        );
        assert_eq!(encode("utf-32be", ErrorPolicy::Strict, "a").unwrap(), [0, 0, 0, b'a']);
    }

    #[test]
    fn test_ascii_policies() {
        assert_eq!(
            encode("ascii", ErrorPolicy::Strict, "café"),
            Err(Unmappable {
                character: 'é',
                offset: 3
            })
        );
        assert_eq!(encode("ascii", ErrorPolicy::Replace, "café").unwrap(), b"caf?");
        assert_eq!(encode("ascii", ErrorPolicy::Ignore, "café").unwrap(), b"caf");
        assert_eq!(encode("ascii", ErrorPolicy::Escape, "café").unwrap(), b"caf\\xe9");
    }

    #[test]
    fn test_legacy_encoding_policies() {
        assert_eq!(encode("latin1", ErrorPolicy::Strict, "café").unwrap(), b"caf\xE9");
        let err = encode("latin1", ErrorPolicy::Strict, "a日b").unwrap_err();
        assert_eq!(err.character, '日');
        assert_eq!(err.offset, 1);
        assert_eq!(encode("latin1", ErrorPolicy::Replace, "a日b").unwrap(), b"a?b");
        assert_eq!(encode("latin1", ErrorPolicy::Ignore, "a日b").unwrap(), b"ab");
        assert_eq!(encode("latin1", ErrorPolicy::Escape, "a日b").unwrap(), b"a\\u65e5b");
    }

    #[test]
    fn test_finish_resets_stateful_encoding() {
        let out = encode("iso-2022-jp", ErrorPolicy::Strict, "日").unwrap();
        assert!(out.starts_with(b"\x1B$B"));
        assert!(out.ends_with(b"\x1B(B"));
    }

    #[test]
    fn test_escape_forms() {
        assert_eq!(ErrorPolicy::Escape.substitute('é').unwrap(), "\\xe9");
        assert_eq!(ErrorPolicy::Escape.substitute('€').unwrap(), "\\u20ac");
        assert_eq!(ErrorPolicy::Escape.substitute('😀').unwrap(), "\\U0001f600");
        assert!(ErrorPolicy::Strict.substitute('é').is_none());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("IGNORE".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Ignore);
        assert_eq!("backslashreplace".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Escape);
        assert!("lenient".parse::<ErrorPolicy>().is_err());
    }
}
