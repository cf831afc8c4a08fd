use std::borrow::Cow;

use simdutf8::basic::from_utf8;

use crate::charset::{Charset, DecodePolicy};

/// Default number of bytes peeked for BOM and dialect sniffing.
pub const DEFAULT_WINDOW_SIZE: usize = 64 * 1024;

/// Decode a peeked window for sniffing.
///
/// The window is decoded leniently with a fresh decoder; a character cut
/// off at the end of the window is left out. A leading BOM is dropped when
/// `charset` strips one.
pub fn decode_window<'a>(window: &'a [u8], charset: &Charset) -> Cow<'a, str> {
    if charset.is_plain_utf8() {
        if let Ok(text) = from_utf8(window) {
            return Cow::Borrowed(text);
        }
    }

    let mut decoder = charset.new_decoder();
    let mut text = String::new();
    let mut rest = window;
    while !rest.is_empty() {
        match decoder.decode(rest, &mut text, false, DecodePolicy::Replace) {
            Ok(0) | Err(_) => break,
            Ok(read) => rest = &rest[read..],
        }
    }
    Cow::Owned(text)
}

/// The text before the first `\r` or `\n`.
pub fn first_line(text: &str) -> &str {
    text.find(['\r', '\n']).map_or(text, |end| &text[..end])
}
