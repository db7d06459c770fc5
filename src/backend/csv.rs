//! CSV reading and writing. Part of the core; needs no backend activation.

use std::io::{Read, Write};
use std::path::Path;

use crate::backend::{FormatHandler, Operation};
use crate::dispatch::{ReadOptions, WriteOptions};
use crate::error::{TableIoError, TableIoResult};
use crate::format::FormatVariant;
use crate::types::{infer_data_type, DataSet, DataType, Field, Schema, Value};

/// Handler for [`FormatVariant::DelimitedText`].
#[derive(Debug, Default)]
pub struct CsvHandler;

impl FormatHandler for CsvHandler {
    fn formats(&self) -> &[FormatVariant] {
        &[FormatVariant::DelimitedText]
    }

    fn supports(&self, _operation: Operation) -> bool {
        true
    }

    fn read_path(&self, _format: FormatVariant, path: &Path, options: &ReadOptions) -> TableIoResult<DataSet> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        read_csv_records(&mut rdr, options.schema.as_ref())
    }

    fn read_buffer(&self, _format: FormatVariant, bytes: &[u8], options: &ReadOptions) -> TableIoResult<DataSet> {
        read_csv(bytes, options.schema.as_ref())
    }

    fn write_path(
        &self,
        _format: FormatVariant,
        path: &Path,
        table: &DataSet,
        _options: &WriteOptions,
    ) -> TableIoResult<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        write_csv_records(&mut wtr, table)
    }
}

/// Read CSV with a header row from any reader.
///
/// With a schema, headers must contain every schema field (order can differ) and each value is
/// parsed as the field's type. Without one, column types are inferred.
pub fn read_csv<R: Read>(input: R, schema: Option<&Schema>) -> TableIoResult<DataSet> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(input);
    read_csv_records(&mut rdr, schema)
}

/// Read CSV data from an existing CSV reader.
pub fn read_csv_records<R: Read>(rdr: &mut csv::Reader<R>, schema: Option<&Schema>) -> TableIoResult<DataSet> {
    let headers = rdr.headers()?.clone();
    let records = rdr.records().collect::<Result<Vec<_>, _>>()?;

    let (schema, col_idxs) = match schema {
        Some(schema) => {
            // Map schema fields -> CSV column indexes (allows re-ordered CSV columns).
            let mut col_idxs = Vec::with_capacity(schema.fields.len());
            for field in &schema.fields {
                match headers.iter().position(|h| h == field.name) {
                    Some(idx) => col_idxs.push(idx),
                    None => {
                        return Err(TableIoError::SchemaMismatch {
                            message: format!(
                                "missing required column '{field}'. headers={:?}",
                                headers.iter().collect::<Vec<_>>(),
                                field = field.name
                            ),
                        });
                    }
                }
            }
            (schema.clone(), col_idxs)
        }
        None => {
            let fields = headers
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let data_type = infer_data_type(records.iter().map(|r| r.get(idx).unwrap_or("")));
                    Field::new(name, data_type)
                })
                .collect();
            (Schema::new(fields), (0..headers.len()).collect())
        }
    };

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(records.len());
    for (row_idx0, record) in records.iter().enumerate() {
        // Report 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &csv_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let raw = record.get(csv_idx).unwrap_or("");
            row.push(parse_typed_value(user_row, &field.name, &field.data_type, raw)?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema, rows))
}

/// Write `table` as CSV with a header row and `\n` line endings.
pub fn write_csv<W: Write>(output: W, table: &DataSet) -> TableIoResult<()> {
    let mut wtr = csv::Writer::from_writer(output);
    write_csv_records(&mut wtr, table)
}

fn write_csv_records<W: Write>(wtr: &mut csv::Writer<W>, table: &DataSet) -> TableIoResult<()> {
    wtr.write_record(table.schema.field_names())?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(Value::to_text))?;
    }
    wtr.flush()?;
    Ok(())
}

fn parse_typed_value(row: usize, column: &str, data_type: &DataType, raw: &str) -> TableIoResult<Value> {
    // Text keeps its surrounding spaces; the other types are parsed from the trimmed cell.
    let trimmed = raw.trim();
    if raw.is_empty() || (trimmed.is_empty() && *data_type != DataType::Utf8) {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(raw.to_owned())),
        DataType::Int64 => trimmed.parse::<i64>().map(Value::Int64).map_err(|e| TableIoError::ParseError {
            row,
            column: column.to_owned(),
            raw: raw.to_owned(),
            message: e.to_string(),
        }),
        DataType::Float64 => trimmed.parse::<f64>().map(Value::Float64).map_err(|e| TableIoError::ParseError {
            row,
            column: column.to_owned(),
            raw: raw.to_owned(),
            message: e.to_string(),
        }),
        DataType::Bool => parse_bool(trimmed).map(Value::Bool).map_err(|message| TableIoError::ParseError {
            row,
            column: column.to_owned(),
            raw: raw.to_owned(),
            message,
        }),
    }
}

pub(crate) fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inferred_columns_keep_header_order() {
        let ds = read_csv("b,a\nx,1\ny,\n".as_bytes(), None).unwrap();
        assert_eq!(ds.schema.field_names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(ds.schema.fields[1].data_type, DataType::Int64);
        assert_eq!(ds.rows[1][1], Value::Null);
    }

    #[test]
    fn writes_header_and_lf_endings() {
        let ds = read_csv("a,b\n1,2.5\n".as_bytes(), None).unwrap();
        let mut out = Vec::new();
        write_csv(&mut out, &ds).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a,b\n1,2.5\n");
    }
}
