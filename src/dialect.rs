use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use csv::{QuoteStyle, StringRecord, Terminator};

use crate::error::{Result, TranscodeError};

/// Quoting convention of a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quoting {
    /// Quote characters are ordinary data; output is never quoted.
    None,
    /// Quote only fields that need it.
    #[default]
    Minimal,
    /// Quote every field.
    All,
    /// Quote every non-numeric field.
    NonNumeric,
}

impl Quoting {
    const fn quote_style(&self) -> QuoteStyle {
        match self {
            Quoting::None => QuoteStyle::Never,
            Quoting::Minimal => QuoteStyle::Necessary,
            Quoting::All => QuoteStyle::Always,
            Quoting::NonNumeric => QuoteStyle::NonNumeric,
        }
    }
}

impl fmt::Display for Quoting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quoting::None => write!(f, "none"),
            Quoting::Minimal => write!(f, "minimal"),
            Quoting::All => write!(f, "all"),
            Quoting::NonNumeric => write!(f, "non-numeric"),
        }
    }
}

/// Line terminator sequences.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineTerminator {
    /// Unix-style line ending (\n).
    #[default]
    LF,
    /// Windows-style line ending (\r\n).
    CRLF,
    /// Old Mac-style line ending (\r).
    CR,
}

impl LineTerminator {
    /// Returns the escaped string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LineTerminator::LF => "\\n",
            LineTerminator::CRLF => "\\r\\n",
            LineTerminator::CR => "\\r",
        }
    }

    const fn csv_terminator(&self) -> Terminator {
        match self {
            LineTerminator::LF => Terminator::Any(b'\n'),
            LineTerminator::CRLF => Terminator::CRLF,
            LineTerminator::CR => Terminator::Any(b'\r'),
        }
    }
}

/// Detect the most likely line terminator from data.
pub fn detect_line_terminator(data: &[u8]) -> LineTerminator {
    let mut crlf_count = 0;
    let mut lf_count = 0;
    let mut cr_count = 0;

    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\r' {
            if i + 1 < data.len() && data[i + 1] == b'\n' {
                crlf_count += 1;
                i += 2;
                continue;
            }
            cr_count += 1;
        } else if data[i] == b'\n' {
            lf_count += 1;
        }
        i += 1;
    }

    // Prefer CRLF if present (Windows), then LF (Unix), then CR (old Mac)
    if crlf_count > 0 && crlf_count >= lf_count && crlf_count >= cr_count {
        LineTerminator::CRLF
    } else if lf_count >= cr_count {
        LineTerminator::LF
    } else {
        LineTerminator::CR
    }
}

/// How text is split into records and fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dialect {
    /// Field delimiter character.
    pub delimiter: u8,
    /// Quote character.
    pub quote: u8,
    /// Quoting convention.
    pub quoting: Quoting,
    /// Whether a doubled quote inside a quoted field stands for one quote.
    pub double_quote: bool,
    /// Escape character used instead of doubling quotes.
    pub escape: Option<u8>,
    /// Drop spaces that directly follow a delimiter when reading.
    pub skip_initial_space: bool,
    /// Record terminator.
    pub line_terminator: LineTerminator,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::pipe()
    }
}

impl Dialect {
    /// Create a dialect with double-quote escaping and no escape character.
    pub const fn new(
        delimiter: u8,
        quote: u8,
        quoting: Quoting,
        line_terminator: LineTerminator,
    ) -> Self {
        Self {
            delimiter,
            quote,
            quoting,
            double_quote: true,
            escape: None,
            skip_initial_space: false,
            line_terminator,
        }
    }

    /// `|`-delimited, never quoted, `\n` terminated.
    pub const fn pipe() -> Self {
        Self::new(b'|', b'"', Quoting::None, LineTerminator::LF)
    }

    /// Comma-delimited, minimal quoting, `\r\n` terminated.
    pub const fn excel() -> Self {
        Self::new(b',', b'"', Quoting::Minimal, LineTerminator::CRLF)
    }

    /// Tab-delimited, minimal quoting, `\r\n` terminated.
    pub const fn excel_tab() -> Self {
        Self::new(b'\t', b'"', Quoting::Minimal, LineTerminator::CRLF)
    }

    /// Comma-delimited, every field quoted, `\n` terminated.
    pub const fn unix() -> Self {
        Self::new(b',', b'"', Quoting::All, LineTerminator::LF)
    }

    /// A `csv` reader configuration for this dialect.
    ///
    /// Records may have any number of fields and no header is assumed.
    /// `skip_initial_space` is not expressible here; apply
    /// [`Dialect::strip_initial_space`] to each record read.
    pub fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .quoting(self.quoting != Quoting::None)
            .double_quote(self.double_quote)
            .escape(self.escape);
        builder
    }

    /// Copy `record` into `out`, dropping the spaces that follow each
    /// delimiter. The first field keeps its leading spaces.
    ///
    /// The reader sees a quote after such spaces as data, so a field that
    /// is quoted once its spaces are gone is unquoted here. A delimiter
    /// inside that field has already split it and is not recovered.
    pub fn strip_initial_space(&self, record: &StringRecord, out: &mut StringRecord) {
        out.clear();
        for (i, field) in record.iter().enumerate() {
            let trimmed = field.trim_start_matches(' ');
            if i == 0 {
                out.push_field(field);
            } else if trimmed.len() < field.len() && self.quoting != Quoting::None {
                out.push_field(&self.unquote(trimmed));
            } else {
                out.push_field(trimmed);
            }
        }
    }

    fn unquote<'a>(&self, field: &'a str) -> Cow<'a, str> {
        let quote = self.quote as char;
        match field
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            Some(inner) if self.double_quote => {
                Cow::Owned(inner.replace(&format!("{quote}{quote}"), &quote.to_string()))
            }
            Some(inner) => Cow::Borrowed(inner),
            None => Cow::Borrowed(field),
        }
    }

    /// A `csv` writer configuration for this dialect.
    pub fn writer_builder(&self) -> csv::WriterBuilder {
        let mut builder = csv::WriterBuilder::new();
        builder
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .quote_style(self.quoting.quote_style())
            .double_quote(self.double_quote)
            .terminator(self.line_terminator.csv_terminator());
        if let Some(escape) = self.escape {
            builder.escape(escape);
        }
        builder
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delimiter={:?} quote={:?} quoting={} terminator={}",
            self.delimiter as char,
            self.quote as char,
            self.quoting,
            self.line_terminator.as_str()
        )?;
        if let Some(escape) = self.escape {
            write!(f, " escape={:?}", escape as char)?;
        }
        if self.skip_initial_space {
            write!(f, " skipinitialspace")?;
        }
        Ok(())
    }
}

/// Output dialects selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NamedDialect {
    #[default]
    Pipe,
    Excel,
    ExcelTab,
    Unix,
}

impl NamedDialect {
    /// The dialect this name stands for.
    pub const fn dialect(&self) -> Dialect {
        match self {
            NamedDialect::Pipe => Dialect::pipe(),
            NamedDialect::Excel => Dialect::excel(),
            NamedDialect::ExcelTab => Dialect::excel_tab(),
            NamedDialect::Unix => Dialect::unix(),
        }
    }
}

impl FromStr for NamedDialect {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pipe" => Ok(NamedDialect::Pipe),
            "excel" | "csv" => Ok(NamedDialect::Excel),
            "excel-tab" | "tsv" => Ok(NamedDialect::ExcelTab),
            "unix" => Ok(NamedDialect::Unix),
            _ => Err(TranscodeError::InvalidConfig(format!(
                "unknown dialect '{s}' (expected pipe, excel, excel-tab or unix)"
            ))),
        }
    }
}

impl fmt::Display for NamedDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NamedDialect::Pipe => "pipe",
            NamedDialect::Excel => "excel",
            NamedDialect::ExcelTab => "excel-tab",
            NamedDialect::Unix => "unix",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_rows(dialect: &Dialect, rows: &[&[&str]]) -> String {
        let mut writer = dialect.writer_builder().from_writer(Vec::new());
        for row in rows {
            writer.write_record(*row).unwrap();
        }
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_detect_line_terminator() {
        assert_eq!(detect_line_terminator(b"a,b\nc,d\n"), LineTerminator::LF);
        assert_eq!(detect_line_terminator(b"a,b\r\nc,d\r\n"), LineTerminator::CRLF);
        assert_eq!(detect_line_terminator(b"a,b\rc,d\r"), LineTerminator::CR);
        assert_eq!(detect_line_terminator(b"a,b"), LineTerminator::LF);
    }

    #[test]
    fn test_pipe_never_quotes() {
        let out = write_rows(&Dialect::pipe(), &[&["a", "b \"c\"", ""], &["1"]]);
        assert_eq!(out, "a|b \"c\"|\n1\n");
    }

    #[test]
    fn test_named_dialects() {
        assert_eq!(write_rows(&Dialect::excel(), &[&["a,b", "c"]]), "\"a,b\",c\r\n");
        assert_eq!(write_rows(&Dialect::excel_tab(), &[&["a", "b"]]), "a\tb\r\n");
        assert_eq!(write_rows(&Dialect::unix(), &[&["a", "1"]]), "\"a\",\"1\"\n");
    }

    #[test]
    fn test_reader_is_flexible() {
        let mut reader = Dialect::excel()
            .reader_builder()
            .from_reader("a,b,c\n1\n\"x,y\",z\n".as_bytes());
        let lens: Vec<usize> = reader.records().map(|r| r.unwrap().len()).collect();
        assert_eq!(lens, vec![3, 1, 2]);
    }

    #[test]
    fn test_named_dialect_from_str() {
        assert_eq!("PIPE".parse::<NamedDialect>().unwrap(), NamedDialect::Pipe);
        assert_eq!("excel-tab".parse::<NamedDialect>().unwrap().dialect(), Dialect::excel_tab());
        assert!("json".parse::<NamedDialect>().is_err());
    }

    #[test]
    fn test_strip_initial_space() {
        let record = StringRecord::from(vec![" a", "  b", "c ", "", " \"q \"\"x\"\"\""]);
        let mut out = StringRecord::new();
        Dialect::excel().strip_initial_space(&record, &mut out);
        assert_eq!(
            out.iter().collect::<Vec<_>>(),
            vec![" a", "b", "c ", "", "q \"x\""]
        );

        Dialect::pipe().strip_initial_space(&record, &mut out);
        assert_eq!(out.get(4), Some("\"q \"\"x\"\"\""));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Dialect::pipe().to_string(),
            "delimiter='|' quote='\"' quoting=none terminator=\\n"
        );
    }
}
