//! The `Transcoder` builder wiring BOM sniffing, rebinding, dialect
//! sniffing and record transcoding together.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::charset::{Charset, DecodePolicy};
use crate::dialect::{detect_line_terminator, Dialect, NamedDialect};
use crate::encoder::ErrorPolicy;
use crate::encoding::{detect_bom, EncodingTag, MAX_BOM_LEN};
use crate::error::{Result, TranscodeError};
use crate::sample::{decode_window, first_line, DEFAULT_WINDOW_SIZE};
use crate::sniffer::{DialectSniff, SniffStrategy, DEFAULT_DELIMITERS};
use crate::stream::{rebind, ByteSource, PeekSource, TextStream};
use crate::transcode::transcode;

/// Converts delimited text of unknown encoding and dialect into a fixed
/// output encoding and dialect.
///
/// # Example
///
/// ```no_run
/// use utfcsv::{Charset, NamedDialect, Transcoder};
///
/// let mut transcoder = Transcoder::new();
/// transcoder
///     .skip_header(true)
///     .output_encoding(Charset::utf8_sig())
///     .output_dialect(NamedDialect::Excel.dialect());
///
/// let stdout = std::io::stdout();
/// let report = transcoder.transcode_path("data.csv", stdout.lock()).unwrap();
/// println!("{} records", report.records);
/// ```
#[derive(Debug, Clone)]
pub struct Transcoder {
    /// Drop the first input record.
    skip_header: bool,
    /// Candidate delimiters, in priority order.
    delimiters: Vec<u8>,
    /// Charset used when the input has no BOM.
    input_encoding: Charset,
    input_errors: DecodePolicy,
    output_encoding: Charset,
    output_errors: ErrorPolicy,
    output_dialect: Dialect,
    strategy: SniffStrategy,
    /// Bytes peeked for BOM and dialect sniffing.
    window_size: usize,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder {
    /// Create a transcoder producing UTF-8, pipe-delimited output.
    pub fn new() -> Self {
        Self {
            skip_header: false,
            delimiters: DEFAULT_DELIMITERS.to_vec(),
            input_encoding: Charset::utf8(),
            input_errors: DecodePolicy::Strict,
            output_encoding: Charset::utf8(),
            output_errors: ErrorPolicy::Strict,
            output_dialect: NamedDialect::Pipe.dialect(),
            strategy: SniffStrategy::Frequency,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    pub fn skip_header(&mut self, skip_header: bool) -> &mut Self {
        self.skip_header = skip_header;
        self
    }

    /// Set the candidate delimiters, highest priority first.
    pub fn delimiters(&mut self, delimiters: &[u8]) -> &mut Self {
        self.delimiters = delimiters.to_vec();
        self
    }

    /// Set the charset assumed when the input carries no BOM.
    pub fn input_encoding(&mut self, charset: Charset) -> &mut Self {
        self.input_encoding = charset;
        self
    }

    pub fn input_errors(&mut self, policy: DecodePolicy) -> &mut Self {
        self.input_errors = policy;
        self
    }

    pub fn output_encoding(&mut self, charset: Charset) -> &mut Self {
        self.output_encoding = charset;
        self
    }

    pub fn output_errors(&mut self, policy: ErrorPolicy) -> &mut Self {
        self.output_errors = policy;
        self
    }

    pub fn output_dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.output_dialect = dialect;
        self
    }

    /// Choose the dialect sniffing strategy.
    pub fn strategy(&mut self, strategy: SniffStrategy) -> &mut Self {
        self.strategy = strategy;
        self
    }

    /// Set the number of bytes peeked for sniffing (at least 4).
    pub fn window_size(&mut self, window_size: usize) -> &mut Self {
        self.window_size = window_size;
        self
    }

    /// Transcode the file at `path` into `output`.
    pub fn transcode_path<P: AsRef<Path>, W: Write>(&self, path: P, output: W) -> Result<Report> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TranscodeError::ResourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        self.transcode_reader(file, output)
    }

    /// Transcode everything `input` yields into `output`.
    pub fn transcode_reader<R: Read, W: Write>(&self, input: R, output: W) -> Result<Report> {
        self.validate()?;
        let source = ByteSource::with_capacity(self.window_size, input);
        let stream = TextStream::with_policy(source, Charset::utf8(), self.input_errors);
        self.transcode_stream(stream, output)
    }

    /// Transcode an already-opened text stream.
    ///
    /// The stream must not have been read from; its charset is replaced by
    /// the one announced by a BOM or by the configured input encoding.
    pub fn transcode_stream<S: PeekSource, W: Write>(
        &self,
        mut stream: TextStream<S>,
        output: W,
    ) -> Result<Report> {
        self.validate()?;

        let window = stream.peek_bytes(MAX_BOM_LEN)?;
        let bom = detect_bom(window);
        let input_encoding = match bom.charset() {
            Some(charset) => {
                info!("Detected Unicode BOM: {bom} (decoding as {charset})");
                charset
            }
            None => {
                info!("No Unicode BOM, defaulting to {}", self.input_encoding);
                self.input_encoding
            }
        };
        info!("Output encoding: {}", self.output_encoding);

        let mut stream = rebind(stream, input_encoding)?;

        let window = stream.peek_bytes(self.window_size)?;
        let reached_end = window.len() < self.window_size;
        let text = decode_window(window, &input_encoding);
        if text.is_empty() && reached_end {
            debug!("input is empty");
            return Ok(Report {
                bom,
                input_encoding,
                output_encoding: self.output_encoding,
                input_dialect: None,
                records: 0,
            });
        }

        let mut input_dialect = self.strategy.sniff(first_line(&text), &self.delimiters)?;
        input_dialect.line_terminator = detect_line_terminator(text.as_bytes());
        debug!("input dialect: {input_dialect}");

        let records = transcode(
            stream,
            &input_dialect,
            output,
            &self.output_dialect,
            &self.output_encoding,
            self.output_errors,
            self.skip_header,
        )?;

        Ok(Report {
            bom,
            input_encoding,
            output_encoding: self.output_encoding,
            input_dialect: Some(input_dialect),
            records,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.window_size < MAX_BOM_LEN {
            return Err(TranscodeError::InvalidConfig(format!(
                "sniffing window must be at least {MAX_BOM_LEN} bytes, got {}",
                self.window_size
            )));
        }
        if self.delimiters.is_empty() {
            return Err(TranscodeError::InvalidConfig(
                "at least one candidate delimiter is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a run detected and produced.
#[derive(Debug, Clone)]
pub struct Report {
    /// BOM found at the start of the input.
    pub bom: EncodingTag,
    /// Charset the input was decoded with.
    pub input_encoding: Charset,
    pub output_encoding: Charset,
    /// Sniffed input dialect; `None` for empty input.
    pub input_dialect: Option<Dialect>,
    /// Records written, header excluded.
    pub records: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Write};
    use std::sync::{Arc, Mutex};

    fn run(transcoder: &Transcoder, input: &[u8]) -> Result<(Report, Vec<u8>)> {
        let mut out = Vec::new();
        let report = transcoder.transcode_reader(Cursor::new(input.to_vec()), &mut out)?;
        Ok((report, out))
    }

    #[test]
    fn test_utf8_bom_input() {
        let mut transcoder = Transcoder::new();
        transcoder.skip_header(true);
        let (report, out) = run(&transcoder, b"\xEF\xBB\xBFa,b,c\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(out, b"1|2|3\n4|5|6\n");
        assert_eq!(report.bom, EncodingTag::Utf8Bom);
        assert_eq!(report.input_encoding.name(), "utf-8-sig");
        assert_eq!(report.records, 2);
        assert_eq!(report.input_dialect.unwrap().delimiter, b',');
    }

    #[test]
    fn test_default_encoding_used_without_bom() {
        let mut transcoder = Transcoder::new();
        transcoder.input_encoding(Charset::for_label("latin1").unwrap());
        let (report, out) = run(&transcoder, b"caf\xE9\tx\n").unwrap();
        assert_eq!(report.bom, EncodingTag::Unspecified);
        assert_eq!(out, "café|x\n".as_bytes());
    }

    #[test]
    fn test_small_window() {
        let mut transcoder = Transcoder::new();
        transcoder.window_size(3);
        assert!(matches!(
            run(&transcoder, b"a,b\n"),
            Err(TranscodeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_window_smaller_than_input() {
        let mut transcoder = Transcoder::new();
        transcoder.window_size(8);
        let (report, out) = run(&transcoder, b"a,b\nc,d\ne,f\ng,h\n").unwrap();
        assert_eq!(report.records, 4);
        assert_eq!(out, b"a|b\nc|d\ne|f\ng|h\n");
    }

    #[test]
    fn test_custom_delimiters() {
        let mut transcoder = Transcoder::new();
        transcoder.delimiters(b";").strategy(SniffStrategy::FirstMatch);
        let (_, out) = run(&transcoder, b"a;b\n").unwrap();
        assert_eq!(out, b"a|b\n");
        assert!(run(&transcoder, b"a,b\n").is_err());
    }

    #[test]
    fn test_crlf_input() {
        let (report, out) = run(&Transcoder::new(), b"a,b\r\n1,2\r\n").unwrap();
        assert_eq!(out, b"a|b\n1|2\n");
        assert_eq!(
            report.input_dialect.unwrap().line_terminator,
            crate::dialect::LineTerminator::CRLF
        );
    }

    #[test]
    fn test_empty_and_bom_only_input() {
        for input in [&b""[..], &b"\xEF\xBB\xBF"[..], &b"\xFF\xFE"[..]] {
            let (report, out) = run(&Transcoder::new(), input).unwrap();
            assert_eq!(report.records, 0);
            assert!(report.input_dialect.is_none());
            assert!(out.is_empty());
        }
    }

    #[test]
    fn test_undetermined_dialect_writes_nothing() {
        let mut out = Vec::new();
        let err = Transcoder::new()
            .transcode_reader(Cursor::new(b"abc\ndef\n".to_vec()), &mut out)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::DialectUndetermined(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = Transcoder::new()
            .transcode_path("/nonexistent/input.csv", Vec::new())
            .unwrap_err();
        assert!(matches!(err, TranscodeError::ResourceUnavailable { .. }));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged(transcoder: &Transcoder, input: &[u8]) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::with_default(subscriber, || run(transcoder, input).unwrap());
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_logs_detected_bom() {
        let mut transcoder = Transcoder::new();
        transcoder.output_encoding(Charset::for_label("latin1").unwrap());
        let log = logged(&transcoder, b"\xEF\xBB\xBFa,b\n");

        let bom = log
            .find("Detected Unicode BOM: UTF-8-BOM (decoding as utf-8-sig)")
            .unwrap();
        let output = log.find("Output encoding: windows-1252").unwrap();
        assert!(bom < output);
        assert!(!log.contains("No Unicode BOM"));
    }

    #[test]
    fn test_logs_default_encoding() {
        let log = logged(&Transcoder::new(), b"a,b\n");

        let default = log.find("No Unicode BOM, defaulting to utf-8").unwrap();
        let output = log.find("Output encoding: utf-8").unwrap();
        assert!(default < output);
        assert!(!log.contains("Detected Unicode BOM"));
    }
}
