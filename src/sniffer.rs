//! Dialect sniffing from a single sample line.
//!
//! Two strategies are provided behind the [`DialectSniff`] trait. Both only
//! look at the candidate delimiters they are given, in the order given, so
//! the same line always yields the same dialect.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::dialect::{Dialect, LineTerminator, Quoting};
use crate::error::{Result, TranscodeError};

/// Default candidate delimiters, in priority order: pipe, comma, tab.
pub const DEFAULT_DELIMITERS: &[u8] = b"|,\t";

/// Quote characters to test, in priority order.
pub const QUOTES: &[u8] = b"\"'";

/// Infers a [`Dialect`] from one line of decoded text.
pub trait DialectSniff {
    /// Sniff the dialect of `sample`, choosing the delimiter among `candidates`.
    ///
    /// Fails with [`TranscodeError::DialectUndetermined`] when no candidate
    /// can be chosen.
    fn sniff(&self, sample: &str, candidates: &[u8]) -> Result<Dialect>;
}

/// Picks the quoted-field or occurrence-count winner among the candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrequencySniffer;

/// Picks the first candidate that occurs in the sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatchSniffer;

impl DialectSniff for FrequencySniffer {
    fn sniff(&self, sample: &str, candidates: &[u8]) -> Result<Dialect> {
        check_candidates(sample, candidates)?;

        if let Some((quote, delimiter)) = guess_quote_and_delimiter(sample, candidates) {
            return Ok(build_dialect(sample, delimiter, Some(quote)));
        }

        let bytes = sample.as_bytes();
        let mut best: Option<(u8, usize)> = None;
        for &delimiter in candidates {
            let count = bytecount::count(bytes, delimiter);
            if count > 0 && best.is_none_or(|(_, top)| count > top) {
                best = Some((delimiter, count));
            }
        }

        best.map(|(delimiter, _)| build_dialect(sample, delimiter, None))
            .ok_or_else(|| undetermined(candidates))
    }
}

impl DialectSniff for FirstMatchSniffer {
    fn sniff(&self, sample: &str, candidates: &[u8]) -> Result<Dialect> {
        check_candidates(sample, candidates)?;

        let delimiter = candidates
            .iter()
            .copied()
            .find(|&d| bytecount::count(sample.as_bytes(), d) > 0)
            .ok_or_else(|| undetermined(candidates))?;
        let quote = QUOTES
            .iter()
            .copied()
            .find(|&q| count_quoted_fields(sample, quoted_field_regex(q), delimiter) > 0);
        Ok(build_dialect(sample, delimiter, quote))
    }
}

/// Selects a sniffing strategy by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SniffStrategy {
    #[default]
    Frequency,
    FirstMatch,
}

impl DialectSniff for SniffStrategy {
    fn sniff(&self, sample: &str, candidates: &[u8]) -> Result<Dialect> {
        match self {
            SniffStrategy::Frequency => FrequencySniffer.sniff(sample, candidates),
            SniffStrategy::FirstMatch => FirstMatchSniffer.sniff(sample, candidates),
        }
    }
}

impl FromStr for SniffStrategy {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "frequency" => Ok(SniffStrategy::Frequency),
            "first-match" | "first" => Ok(SniffStrategy::FirstMatch),
            _ => Err(TranscodeError::InvalidConfig(format!(
                "unknown sniffer '{s}' (expected frequency or first-match)"
            ))),
        }
    }
}

impl fmt::Display for SniffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SniffStrategy::Frequency => write!(f, "frequency"),
            SniffStrategy::FirstMatch => write!(f, "first-match"),
        }
    }
}

/// Parse a delimiter list such as `|,\t`.
///
/// Backslash escapes `\t`, `\|` and `\\` are understood. Duplicates are
/// dropped, keeping the first occurrence.
pub fn parse_delimiters(spec: &str) -> Result<Vec<u8>> {
    let mut delimiters = Vec::new();
    let mut chars = spec.chars();
    while let Some(c) = chars.next() {
        let c = match c {
            '\\' => match chars.next() {
                Some('t') => '\t',
                Some(escaped @ ('|' | '\\' | ',' | ';' | ' ')) => escaped,
                Some(other) => {
                    return Err(TranscodeError::InvalidConfig(format!(
                        "unknown delimiter escape '\\{other}'"
                    )));
                }
                None => '\\',
            },
            c => c,
        };
        if !c.is_ascii() || matches!(c, '\r' | '\n' | '"' | '\'') {
            return Err(TranscodeError::InvalidConfig(format!(
                "delimiter {c:?} must be a single ASCII character other than a quote or line break"
            )));
        }
        if !delimiters.contains(&(c as u8)) {
            delimiters.push(c as u8);
        }
    }
    if delimiters.is_empty() {
        return Err(TranscodeError::InvalidConfig(
            "at least one candidate delimiter is required".to_string(),
        ));
    }
    Ok(delimiters)
}

fn undetermined(candidates: &[u8]) -> TranscodeError {
    let shown: Vec<String> = candidates.iter().map(|&d| format!("{:?}", d as char)).collect();
    TranscodeError::DialectUndetermined(format!(
        "none of the candidates [{}] occur in the sample line",
        shown.join(", ")
    ))
}

fn check_candidates(sample: &str, candidates: &[u8]) -> Result<()> {
    if let Some(&bad) = candidates.iter().find(|d| !d.is_ascii()) {
        return Err(TranscodeError::DialectUndetermined(format!(
            "candidate byte 0x{bad:02X} is not an ASCII character"
        )));
    }
    if sample.is_empty() {
        return Err(TranscodeError::DialectUndetermined(
            "the sample line is empty".to_string(),
        ));
    }
    Ok(())
}

/// A quoted field, allowing doubled or backslash-escaped quotes.
static DOUBLE_QUOTED_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"\\]|""|\\.)*""#).expect("Invalid double-quoted field pattern")
});

static SINGLE_QUOTED_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'(?:[^'\\]|''|\\.)*'").expect("Invalid single-quoted field pattern")
});

fn quoted_field_regex(quote: u8) -> &'static Regex {
    if quote == b'\'' {
        &SINGLE_QUOTED_FIELD
    } else {
        &DOUBLE_QUOTED_FIELD
    }
}

/// Count quoted fields bounded by `delimiter` or the ends of the line.
fn count_quoted_fields(sample: &str, re: &Regex, delimiter: u8) -> usize {
    let bytes = sample.as_bytes();
    re.find_iter(sample)
        .filter(|m| {
            let before = bytes[..m.start()].iter().rev().find(|&&b| b != b' ');
            let after = bytes[m.end()..].iter().find(|&&b| b != b' ');
            before.is_none_or(|&b| b == delimiter) && after.is_none_or(|&b| b == delimiter)
        })
        .count()
}

/// The (quote, delimiter) pair with the most delimited quoted fields.
fn guess_quote_and_delimiter(sample: &str, candidates: &[u8]) -> Option<(u8, u8)> {
    let bytes = sample.as_bytes();
    let mut best: Option<(u8, u8, usize)> = None;
    for &quote in QUOTES {
        if !bytes.contains(&quote) {
            continue;
        }
        let re = quoted_field_regex(quote);
        for &delimiter in candidates {
            if bytecount::count(bytes, delimiter) == 0 {
                continue;
            }
            let count = count_quoted_fields(sample, re, delimiter);
            if count > 0 && best.is_none_or(|(_, _, top)| count > top) {
                best = Some((quote, delimiter, count));
            }
        }
    }
    best.map(|(quote, delimiter, _)| (quote, delimiter))
}

/// One field of the sample as it appeared in the raw text.
struct RawField<'a> {
    text: &'a str,
    quoted: bool,
}

/// Split the sample on `delimiter`, keeping track of which fields were quoted.
fn split_fields(sample: &str, delimiter: u8, quote: u8) -> Vec<RawField<'_>> {
    let bytes = sample.as_bytes();
    let mut fields = Vec::new();
    let mut i = 0;
    loop {
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == quote {
            let start = i + 1;
            i = start;
            while i < bytes.len() {
                if bytes[i] == b'\\' {
                    i += 2;
                } else if bytes[i] == quote {
                    if bytes.get(i + 1) == Some(&quote) {
                        i += 2;
                    } else {
                        break;
                    }
                } else {
                    i += 1;
                }
            }
            let end = i.min(bytes.len());
            fields.push(RawField {
                text: &sample[start..end],
                quoted: true,
            });
            while i < bytes.len() && bytes[i] != delimiter {
                i += 1;
            }
        } else {
            let start = i;
            while i < bytes.len() && bytes[i] != delimiter {
                i += 1;
            }
            fields.push(RawField {
                text: &sample[start..i],
                quoted: false,
            });
        }
        if i >= bytes.len() {
            return fields;
        }
        // Skip the delimiter.
        i += 1;
    }
}

/// Build the dialect for `delimiter`, inferring the quoting convention.
fn build_dialect(sample: &str, delimiter: u8, quote: Option<u8>) -> Dialect {
    let mut dialect = match quote {
        Some(quote) => quoted_dialect(sample, delimiter, quote),
        None => Dialect::new(delimiter, b'"', Quoting::Minimal, LineTerminator::LF),
    };
    dialect.skip_initial_space = spaced_after_delimiter(sample, delimiter);
    dialect
}

fn quoted_dialect(sample: &str, delimiter: u8, quote: u8) -> Dialect {
    let fields = split_fields(sample, delimiter, quote);
    let unquoted: Vec<&RawField<'_>> = fields.iter().filter(|f| !f.quoted).collect();
    let quoting = if unquoted.is_empty() {
        Quoting::All
    } else if unquoted
        .iter()
        .all(|f| !f.text.trim().is_empty() && f.text.trim().parse::<f64>().is_ok())
    {
        Quoting::NonNumeric
    } else {
        Quoting::Minimal
    };

    let mut dialect = Dialect::new(delimiter, quote, quoting, LineTerminator::LF);
    let escaped_quote = format!("\\{}", quote as char);
    if fields.iter().any(|f| f.quoted && f.text.contains(&escaped_quote)) {
        dialect.escape = Some(b'\\');
        dialect.double_quote = false;
    }
    dialect
}

/// True when every occurrence of `delimiter` is followed by a space.
fn spaced_after_delimiter(sample: &str, delimiter: u8) -> bool {
    if delimiter == b' ' {
        return false;
    }
    let bytes = sample.as_bytes();
    let total = bytecount::count(bytes, delimiter);
    total > 0
        && bytes
            .windows(2)
            .filter(|pair| pair[0] == delimiter && pair[1] == b' ')
            .count()
            == total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_comma() {
        let dialect = FrequencySniffer.sniff("a,b,c", DEFAULT_DELIMITERS).unwrap();
        assert_eq!(dialect.delimiter, b',');
        assert_eq!(dialect.quoting, Quoting::Minimal);
        assert_eq!(dialect.quote, b'"');
    }

    #[test]
    fn test_sniff_tab_and_pipe() {
        assert_eq!(FrequencySniffer.sniff("a\tb", DEFAULT_DELIMITERS).unwrap().delimiter, b'\t');
        assert_eq!(FrequencySniffer.sniff("a|b|c", DEFAULT_DELIMITERS).unwrap().delimiter, b'|');
    }

    #[test]
    fn test_highest_count_wins() {
        let dialect = FrequencySniffer.sniff("a|b,c,d", DEFAULT_DELIMITERS).unwrap();
        assert_eq!(dialect.delimiter, b',');
    }

    #[test]
    fn test_tie_goes_to_priority() {
        let dialect = FrequencySniffer.sniff("a,b|c", DEFAULT_DELIMITERS).unwrap();
        assert_eq!(dialect.delimiter, b'|');
        let dialect = FrequencySniffer.sniff("a,b|c", b",|").unwrap();
        assert_eq!(dialect.delimiter, b',');
    }

    #[test]
    fn test_quoted_fields_decide_delimiter() {
        // The pipe inside quotes must not win over the comma.
        let dialect = FrequencySniffer
            .sniff(r#""x|y|z",plain,"q|r""#, DEFAULT_DELIMITERS)
            .unwrap();
        assert_eq!(dialect.delimiter, b',');
        assert_eq!(dialect.quote, b'"');
        assert_eq!(dialect.quoting, Quoting::Minimal);
    }

    #[test]
    fn test_quoting_all() {
        let dialect = FrequencySniffer
            .sniff(r#""name","value""#, DEFAULT_DELIMITERS)
            .unwrap();
        assert_eq!(dialect.delimiter, b',');
        assert_eq!(dialect.quoting, Quoting::All);
    }

    #[test]
    fn test_quoting_non_numeric() {
        let dialect = FrequencySniffer
            .sniff(r#""alice",30,"nyc",1.5"#, DEFAULT_DELIMITERS)
            .unwrap();
        assert_eq!(dialect.quoting, Quoting::NonNumeric);
    }

    #[test]
    fn test_single_quotes() {
        let dialect = FrequencySniffer.sniff("'a';'b'", b";,").unwrap();
        assert_eq!(dialect.delimiter, b';');
        assert_eq!(dialect.quote, b'\'');
        assert_eq!(dialect.quoting, Quoting::All);
    }

    #[test]
    fn test_escape_detected() {
        let dialect = FrequencySniffer
            .sniff(r#""say \"hi\"",x"#, DEFAULT_DELIMITERS)
            .unwrap();
        assert_eq!(dialect.escape, Some(b'\\'));
        assert!(!dialect.double_quote);
    }

    #[test]
    fn test_skip_initial_space() {
        let dialect = FrequencySniffer.sniff("a, b, c", DEFAULT_DELIMITERS).unwrap();
        assert_eq!(dialect.delimiter, b',');
        assert!(dialect.skip_initial_space);

        let dialect = FirstMatchSniffer.sniff("\"a\", \"b\"", DEFAULT_DELIMITERS).unwrap();
        assert!(dialect.skip_initial_space);

        assert!(!FrequencySniffer.sniff("a, b,c", DEFAULT_DELIMITERS).unwrap().skip_initial_space);
        assert!(!FrequencySniffer.sniff("a,b,c", DEFAULT_DELIMITERS).unwrap().skip_initial_space);
    }

    #[test]
    fn test_undetermined() {
        let err = FrequencySniffer.sniff("abc", DEFAULT_DELIMITERS).unwrap_err();
        assert!(matches!(err, TranscodeError::DialectUndetermined(_)));
        assert!(FrequencySniffer.sniff("", DEFAULT_DELIMITERS).is_err());
        assert!(FirstMatchSniffer.sniff("a;b", DEFAULT_DELIMITERS).is_err());
        assert!(FrequencySniffer.sniff("a\u{e9}b", &[0xE9]).is_err());
    }

    #[test]
    fn test_first_match_uses_priority() {
        let dialect = FirstMatchSniffer.sniff("a,b,c|d", DEFAULT_DELIMITERS).unwrap();
        assert_eq!(dialect.delimiter, b'|');
        let dialect = FrequencySniffer.sniff("a,b,c|d", DEFAULT_DELIMITERS).unwrap();
        assert_eq!(dialect.delimiter, b',');
    }

    #[test]
    fn test_sniff_is_deterministic() {
        let sample = r#""a,b"|c,d	e|'f'"#;
        for strategy in [SniffStrategy::Frequency, SniffStrategy::FirstMatch] {
            let first = strategy.sniff(sample, DEFAULT_DELIMITERS).unwrap();
            for _ in 0..10 {
                assert_eq!(strategy.sniff(sample, DEFAULT_DELIMITERS).unwrap(), first);
            }
        }
    }

    #[test]
    fn test_parse_delimiters() {
        assert_eq!(parse_delimiters(r"|,\t").unwrap(), b"|,\t");
        assert_eq!(parse_delimiters(";;,").unwrap(), b";,");
        assert_eq!(parse_delimiters(r"\|\\").unwrap(), b"|\\");
        assert!(parse_delimiters("").is_err());
        assert!(parse_delimiters("é").is_err());
        assert!(parse_delimiters("\"").is_err());
        assert!(parse_delimiters(r"\q").is_err());
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("first-match".parse::<SniffStrategy>().unwrap(), SniffStrategy::FirstMatch);
        assert_eq!(SniffStrategy::default().to_string(), "frequency");
        assert!("magic".parse::<SniffStrategy>().is_err());
    }
}
