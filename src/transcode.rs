//! Record-by-record copy from one dialect and charset to another.

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

use csv::StringRecord;
use tracing::debug;

use crate::charset::Charset;
use crate::dialect::{Dialect, Quoting};
use crate::encoder::{ErrorPolicy, OutputEncoder};
use crate::error::{Result, TranscodeError};

/// Serialised bytes of the record in progress, shared with the `csv::Writer`
/// that produces them.
#[derive(Clone, Default)]
struct LineBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for LineBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Copy every record of `input` to `output`, returning the number written.
///
/// `input` must yield UTF-8 (a [`TextStream`](crate::stream::TextStream)
/// or any UTF-8 reader). Each record is serialised and encoded in memory
/// before anything reaches `output`, so a record is written completely or
/// not at all. With `skip_header` the first record is read and dropped.
///
/// An output dialect without quoting cannot represent a field holding its
/// delimiter or a line break, nor a record made of one empty field; such a
/// record fails the run with [`TranscodeError::Unescapable`].
pub fn transcode<R: Read, W: Write>(
    input: R,
    input_dialect: &Dialect,
    mut output: W,
    output_dialect: &Dialect,
    output_encoding: &Charset,
    output_errors: ErrorPolicy,
    skip_header: bool,
) -> Result<u64> {
    let mut reader = input_dialect.reader_builder().from_reader(input);
    let line = LineBuffer::default();
    let mut writer = output_dialect.writer_builder().from_writer(line.clone());
    let mut encoder = OutputEncoder::new(*output_encoding, output_errors);
    let mut encoded = Vec::new();
    let mut raw = StringRecord::new();
    let mut stripped = StringRecord::new();

    if skip_header && reader.read_record(&mut raw)? {
        debug!("discarded header record with {} fields", raw.len());
    }

    let mut count = 0u64;

    while reader.read_record(&mut raw)? {
        let record = if input_dialect.skip_initial_space {
            input_dialect.strip_initial_space(&raw, &mut stripped);
            &stripped
        } else {
            &raw
        };
        let number = count + 1;

        if output_dialect.quoting == Quoting::None {
            check_unquoted(record, output_dialect.delimiter, number)?;
        }

        writer.write_record(record)?;
        writer.flush()?;
        {
            let mut bytes = line.0.borrow_mut();
            let text = std::str::from_utf8(&bytes)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            encoder.encode(text, &mut encoded).map_err(|unmappable| {
                TranscodeError::Encoding {
                    character: unmappable.character,
                    encoding: output_encoding.name(),
                    record: number,
                    field: field_containing(record, unmappable.character),
                }
            })?;
            bytes.clear();
        }
        output.write_all(&encoded)?;
        encoded.clear();
        count = number;
    }

    encoder.finish(&mut encoded);
    output.write_all(&encoded)?;
    output.flush()?;

    debug!("transcoded {count} records");
    Ok(count)
}

/// Reject fields that would change the record's shape when written unquoted.
fn check_unquoted(record: &StringRecord, delimiter: u8, number: u64) -> Result<()> {
    if record.len() == 1 && record[0].is_empty() {
        return Err(TranscodeError::Unescapable {
            record: number,
            field: 1,
            reason: "a record with a single empty field must be quoted",
        });
    }
    match record
        .iter()
        .position(|field| field.bytes().any(|b| b == delimiter || b == b'\n' || b == b'\r'))
    {
        Some(index) => Err(TranscodeError::Unescapable {
            record: number,
            field: index + 1,
            reason: "field contains the delimiter or a line break",
        }),
        None => Ok(()),
    }
}

/// 1-based index of the first field holding `c`.
///
/// Fields are encoded left to right, so the first one holding the
/// character is the one that failed.
fn field_containing(record: &StringRecord, c: char) -> usize {
    record
        .iter()
        .position(|field| field.contains(c))
        .map_or(0, |index| index + 1)
}
