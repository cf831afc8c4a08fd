//! utfcsv: normalize delimited text of unknown encoding and dialect
//!
//! Reads delimited text, works out its encoding from a leading byte-order
//! mark and its delimiter from the first line, then re-emits every record in
//! a fixed output dialect and encoding.
//!
//! # Quick Start
//!
//! ```no_run
//! use utfcsv::Transcoder;
//!
//! let mut transcoder = Transcoder::new();
//! transcoder.skip_header(true);
//!
//! let stdout = std::io::stdout();
//! let report = transcoder.transcode_path("data.csv", stdout.lock()).unwrap();
//!
//! println!("BOM: {}", report.bom);
//! println!("Decoded as: {}", report.input_encoding);
//! println!("Records: {}", report.records);
//! ```
//!
//! # Building blocks
//!
//! Each stage is usable on its own:
//!
//! ```
//! use utfcsv::{detect_bom, rebind, Charset, DialectSniff, EncodingTag, FrequencySniffer, TextStream};
//! use std::io::Read;
//!
//! let data: &[u8] = b"\xEF\xBB\xBFname,age\nalice,30\n";
//! assert_eq!(detect_bom(data), EncodingTag::Utf8Bom);
//!
//! let stream = TextStream::new(data, Charset::utf8());
//! let mut stream = rebind(stream, Charset::utf8_sig()).unwrap();
//! let mut text = String::new();
//! stream.read_to_string(&mut text).unwrap();
//! assert_eq!(text, "name,age\nalice,30\n");
//!
//! let dialect = FrequencySniffer.sniff("name,age", b"|,\t").unwrap();
//! assert_eq!(dialect.delimiter, b',');
//! ```
//!
//! # Pipeline
//!
//! 1. Peek the first bytes and look for a BOM ([`detect_bom`])
//! 2. Rebind the byte stream to the announced charset, or to the configured
//!    default ([`rebind`])
//! 3. Decode a peeked window and sniff the dialect of its first line
//!    ([`DialectSniff`])
//! 4. Copy records from the input dialect to the output dialect and
//!    encoding ([`transcode`])

mod charset;
mod dialect;
mod encoder;
mod encoding;
mod error;
mod pipeline;
mod sample;
mod sniffer;
mod stream;
mod transcode;

pub use error::{Result, TranscodeError};
pub use pipeline::{Report, Transcoder};

pub use charset::{Charset, DecodePolicy};
pub use dialect::{detect_line_terminator, Dialect, LineTerminator, NamedDialect, Quoting};
pub use encoder::{ErrorPolicy, OutputEncoder, Unmappable};
pub use encoding::{detect_bom, EncodingTag, MAX_BOM_LEN};
pub use sample::{first_line, DEFAULT_WINDOW_SIZE};
pub use sniffer::{
    parse_delimiters, DialectSniff, FirstMatchSniffer, FrequencySniffer, SniffStrategy,
    DEFAULT_DELIMITERS,
};
pub use stream::{rebind, ByteSource, PeekSource, TextStream};
pub use transcode::transcode;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api() {
        let _transcoder = Transcoder::new();
        let _charset = Charset::utf8_sig();
        let _dialect = NamedDialect::ExcelTab.dialect();
        let _policy = ErrorPolicy::Escape;
        let _strategy = SniffStrategy::FirstMatch;
        let _tag = EncodingTag::Unspecified;
    }

    #[test]
    fn test_transcode_simple_csv() {
        let mut out = Vec::new();
        let report = Transcoder::new()
            .transcode_reader(&b"a,b,c\n1,2,3\n"[..], &mut out)
            .unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(out, b"a|b|c\n1|2|3\n");
    }

    #[test]
    fn test_builder_pattern() {
        let mut transcoder = Transcoder::new();
        transcoder
            .skip_header(true)
            .delimiters(b";,")
            .input_encoding(Charset::ascii())
            .input_errors(DecodePolicy::Replace)
            .output_encoding(Charset::utf16())
            .output_errors(ErrorPolicy::Ignore)
            .output_dialect(Dialect::unix())
            .strategy(SniffStrategy::FirstMatch)
            .window_size(1024);

        let mut out = Vec::new();
        transcoder
            .transcode_reader(&b"h1;h2\nx;1\n"[..], &mut out)
            .unwrap();
        let expected: Vec<u8> = [0xFF, 0xFE]
            .into_iter()
            .chain("\"x\",\"1\"\n".encode_utf16().flat_map(u16::to_le_bytes))
            .collect();
        assert_eq!(out, expected);
    }
}
