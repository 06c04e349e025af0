//! Encoding-resolving CSV reader
//!
//! Turns raw upload bytes into a [`Table`]. The text encoding is unknown, so
//! each entry of [`CANDIDATES`] is tried in order and the first one that
//! decodes the whole input is used. No header row is inferred and no type
//! inference is done: every non-blank field becomes a text cell.
//!
//! Records with more fields than the first record are skipped (and reported in
//! [`Table::skipped`]) rather than failing the read. Shorter records are kept
//! as-is.

mod encoding;

pub use encoding::{Candidate, CANDIDATES};

use crate::error::{ConvertError, ConvertResult};
use crate::types::{CellValue, SkippedRow, Table};
use csv::ReaderBuilder;
use tracing::{debug, warn};

const DELIMITER: u8 = b',';
const QUOTE: u8 = b'"';

/// Decode `bytes` with the first working candidate encoding and parse them.
pub fn read_table(bytes: &[u8]) -> ConvertResult<Table> {
    let mut tried = Vec::with_capacity(CANDIDATES.len());

    for candidate in CANDIDATES {
        let Some(text) = candidate.decode(bytes) else {
            debug!(encoding = candidate.name(), "candidate encoding rejected");
            tried.push(candidate.name());
            continue;
        };

        debug!(encoding = candidate.name(), bytes = bytes.len(), "decoded CSV");
        let mut table = parse_text(&text)?;
        table.encoding = Some(candidate.name());
        return Ok(table);
    }

    Err(ConvertError::DecodingExhausted { tried })
}

/// Parse already-decoded CSV text.
pub fn parse_text(text: &str) -> ConvertResult<Table> {
    if let Some(line) = unterminated_quote(text.as_bytes()) {
        return Err(ConvertError::MalformedInput(format!(
            "quoted field opened on line {} is never closed",
            line
        )));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(DELIMITER)
        .quote(QUOTE)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut skipped = Vec::new();
    let mut expected: Option<usize> = None;

    for (idx, result) in reader.records().enumerate() {
        let number = idx as u64 + 1;
        let record = result.map_err(|e| {
            debug!(record = number, error = %e, "CSV tokenizer error");
            ConvertError::MalformedInput(format!("record {} could not be parsed", number))
        })?;

        let width = *expected.get_or_insert(record.len());
        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or(number);
            warn!(
                line,
                fields = record.len(),
                expected = width,
                "skipping CSV row with too many fields"
            );
            skipped.push(SkippedRow {
                record: number,
                line,
                fields: record.len(),
                expected: width,
            });
            continue;
        }

        rows.push(record.iter().map(CellValue::from_field).collect());
    }

    Ok(Table {
        rows,
        encoding: None,
        skipped,
    })
}

/// Line on which a quoted field opens without ever closing, if any.
///
/// Follows the same field rules as the `csv` tokenizer: a quote only starts a
/// quoted field at the beginning of a field, `""` inside quotes is an escaped
/// quote, and quotes in the middle of an unquoted field are literal.
fn unterminated_quote(bytes: &[u8]) -> Option<u64> {
    #[derive(Clone, Copy)]
    enum State {
        FieldStart,
        Unquoted,
        Quoted,
        QuoteInQuoted,
    }

    let mut state = State::FieldStart;
    let mut line: u64 = 1;
    let mut opened_on = 0;

    for &b in bytes {
        state = match (state, b) {
            (State::FieldStart, QUOTE) => {
                opened_on = line;
                State::Quoted
            }
            (State::Quoted, QUOTE) => State::QuoteInQuoted,
            (State::Quoted, _) => State::Quoted,
            (State::QuoteInQuoted, QUOTE) => State::Quoted,
            (_, DELIMITER | b'\n' | b'\r') => State::FieldStart,
            _ => State::Unquoted,
        };
        if b == b'\n' {
            line += 1;
        }
    }

    match state {
        State::Quoted => Some(opened_on),
        _ => None,
    }
}
