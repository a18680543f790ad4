//! Row-oriented metrics tables: `File,<metric>,<metric>,...`.
//!
//! The same format is produced by the analyzer and stored as the cache
//! artifact, so both go through this parser.

use std::io;

use crate::models::metrics::FILE_COLUMN;
use crate::models::{FileMetrics, MetricSet};

/// Parsed rows plus a count of the lines that had to be dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub rows: Vec<FileMetrics>,
    /// Rows whose field count did not match, or that could not be decoded.
    pub malformed: usize,
}

/// Parse a metrics table.
///
/// A row is accepted only when it has exactly one field per declared
/// metric plus the file path. Header rows are recognised and skipped;
/// any other row with the wrong shape is dropped and counted, and parsing
/// carries on. Only I/O failures abort.
pub fn parse_metrics_table<R: io::Read>(reader: R, metrics: &MetricSet) -> Result<ParsedTable, csv::Error> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let width = metrics.row_width();
    let mut table = ParsedTable::default();

    for (index, record) in csv.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => {
                tracing::debug!("dropping undecodable row {}: {e}", index + 1);
                table.malformed += 1;
                continue;
            }
        };

        if record.len() != width {
            tracing::debug!(
                "dropping row {} with {} field(s), expected {width}",
                index + 1,
                record.len()
            );
            table.malformed += 1;
            continue;
        }
        if is_header(&record, metrics) {
            continue;
        }

        let mut fields = record.iter().map(str::to_string);
        let file = fields.next().unwrap_or_default();
        if file.is_empty() {
            table.malformed += 1;
            continue;
        }
        table.rows.push(FileMetrics {
            file,
            values: fields.collect(),
        });
    }

    Ok(table)
}

fn is_header(record: &csv::StringRecord, metrics: &MetricSet) -> bool {
    let mut fields = record.iter();
    let first_is_file = fields
        .next()
        .is_some_and(|f| f.eq_ignore_ascii_case(FILE_COLUMN));
    first_is_file
        && fields
            .zip(metrics.names())
            .all(|(field, name)| field.eq_ignore_ascii_case(name))
}

/// Whether the first line of a table is exactly the header for `metrics`.
///
/// An empty table has no header and does not match.
pub fn has_header<R: io::Read>(reader: R, metrics: &MetricSet) -> Result<bool, csv::Error> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let Some(first) = csv.records().next().transpose()? else {
        return Ok(false);
    };
    Ok(first.len() == metrics.row_width() && is_header(&first, metrics))
}

/// Write rows in the table format, header first.
pub fn write_metrics_table<W: io::Write>(
    writer: W,
    metrics: &MetricSet,
    rows: &[FileMetrics],
) -> Result<(), csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(metrics.table_header())?;
    for row in rows {
        csv.write_record(std::iter::once(&row.file).chain(&row.values))?;
    }
    csv.flush()?;
    Ok(())
}
