use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for transcoding operations.
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// IO error while reading input or writing output.
    #[error("IO error: {0}")]
    Io(#[source] io::Error),

    /// CSV parsing or serialization error.
    #[error("CSV error: {0}")]
    Csv(#[source] csv::Error),

    /// No field delimiter could be chosen from the sample line.
    #[error("Could not determine delimiter: {0}")]
    DialectUndetermined(String),

    /// A text stream cannot be rebound without losing its read position.
    #[error("Incompatible stream state: {0}")]
    IncompatibleStreamState(String),

    /// A character cannot be represented in the output encoding.
    #[error("Cannot encode {character:?} as {encoding} in record {record}, field {field}")]
    Encoding {
        character: char,
        encoding: &'static str,
        record: u64,
        /// 1-based index of the field holding the character.
        field: usize,
    },

    /// A field cannot be written under an output dialect without quoting.
    #[error("Cannot write field {field} of record {record} without quoting: {reason}")]
    Unescapable {
        record: u64,
        field: usize,
        reason: &'static str,
    },

    /// The input contains a byte sequence that is malformed for its encoding.
    #[error("Cannot decode input as {encoding}: malformed sequence at byte {offset}")]
    Decode { encoding: &'static str, offset: u64 },

    /// The input resource cannot be opened.
    #[error("Cannot open {}: {source}", .path.display())]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The encoding label is not known.
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for transcoding operations.
pub type Result<T> = std::result::Result<T, TranscodeError>;

/// Malformed input reported through `io::Error` so that it can cross
/// `Read` boundaries such as `csv::Reader`.
#[derive(Error, Debug, Clone, Copy)]
#[error("malformed {encoding} sequence at byte {offset}")]
pub(crate) struct MalformedInput {
    pub(crate) encoding: &'static str,
    pub(crate) offset: u64,
}

impl MalformedInput {
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, self)
    }

    fn find(err: &io::Error) -> Option<Self> {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<MalformedInput>())
            .copied()
    }
}

impl From<io::Error> for TranscodeError {
    fn from(err: io::Error) -> Self {
        match MalformedInput::find(&err) {
            Some(m) => TranscodeError::Decode {
                encoding: m.encoding,
                offset: m.offset,
            },
            None => TranscodeError::Io(err),
        }
    }
}

impl From<csv::Error> for TranscodeError {
    fn from(err: csv::Error) -> Self {
        if let csv::ErrorKind::Io(io) = err.kind() {
            if let Some(m) = MalformedInput::find(io) {
                return TranscodeError::Decode {
                    encoding: m.encoding,
                    offset: m.offset,
                };
            }
        }
        TranscodeError::Csv(err)
    }
}
