//! Excel workbooks: read with `calamine`, write with `rust_xlsxwriter`.

use std::path::Path;
use std::sync::Arc;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;

use crate::backend::csv::parse_bool;
use crate::backend::{Backend, FormatHandler, LoadError, Operation};
use crate::dispatch::{ReadOptions, SheetSelection, WriteOptions};
use crate::error::{TableIoError, TableIoResult};
use crate::format::{Capability, FormatVariant};
use crate::types::{unify_value_types, DataSet, DataType, Field, Schema, Value};

/// Provides [`Capability::Xlsx`].
#[derive(Debug, Default)]
pub struct ExcelBackend;

impl Backend for ExcelBackend {
    fn capability(&self) -> Capability {
        Capability::Xlsx
    }

    fn load(&self) -> Result<Vec<Arc<dyn FormatHandler>>, LoadError> {
        Ok(vec![Arc::new(ExcelHandler)])
    }
}

/// Handler for [`FormatVariant::Spreadsheet`]. Reads from paths only.
#[derive(Debug, Default)]
pub struct ExcelHandler;

impl FormatHandler for ExcelHandler {
    fn formats(&self) -> &[FormatVariant] {
        &[FormatVariant::Spreadsheet]
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(operation, Operation::ReadPath | Operation::Write)
    }

    fn read_path(&self, _format: FormatVariant, path: &Path, options: &ReadOptions) -> TableIoResult<DataSet> {
        let sheets: Option<Vec<&str>> = match &options.sheet {
            SheetSelection::First => return read_excel(path, None, options.schema.as_ref()),
            SheetSelection::Sheet(name) => Some(vec![name.as_str()]),
            SheetSelection::AllSheets => None,
            SheetSelection::Sheets(names) => Some(names.iter().map(String::as_str).collect()),
        };
        read_excel_workbook(path, sheets.as_deref(), options.schema.as_ref())
    }

    fn write_path(
        &self,
        _format: FormatVariant,
        path: &Path,
        table: &DataSet,
        options: &WriteOptions,
    ) -> TableIoResult<()> {
        write_excel(path, options.sheet_name.as_deref().unwrap_or("Sheet1"), table)
    }
}

/// Read one sheet (`sheet_name`, or the first sheet) into a [`DataSet`].
///
/// Behavior:
/// - Detects the first non-empty row as the header row
/// - Validates that all schema fields exist as headers (when a schema is given)
/// - Converts the remaining rows into typed `Value`s
pub fn read_excel(path: impl AsRef<Path>, sheet_name: Option<&str>, schema: Option<&Schema>) -> TableIoResult<DataSet> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = match sheet_name {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| TableIoError::SchemaMismatch {
                message: "workbook has no sheets".to_string(),
            })?,
    };
    let range = workbook.worksheet_range(&sheet)?;
    read_sheet_range(&sheet, &range, schema)
}

/// Read several sheets and concatenate their rows.
///
/// - If `sheet_names` is `None`, reads **all sheets** in workbook order.
/// - Every sheet must produce the same schema as the first one.
pub fn read_excel_workbook(
    path: impl AsRef<Path>,
    sheet_names: Option<&[&str]>,
    schema: Option<&Schema>,
) -> TableIoResult<DataSet> {
    let mut workbook = open_workbook_auto(path)?;

    let sheets: Vec<String> = match sheet_names {
        Some(names) => names.iter().map(|s| s.to_string()).collect(),
        None => workbook.sheet_names().to_vec(),
    };
    if sheets.is_empty() {
        return Err(TableIoError::SchemaMismatch {
            message: "workbook has no sheets".to_string(),
        });
    }

    let mut combined: Option<DataSet> = None;
    for sheet in sheets {
        let range = workbook.worksheet_range(&sheet)?;
        let mut ds = read_sheet_range(&sheet, &range, schema.or(combined.as_ref().map(|c| &c.schema)))?;
        match combined.as_mut() {
            None => combined = Some(ds),
            Some(acc) => acc.rows.append(&mut ds.rows),
        }
    }

    combined.ok_or_else(|| TableIoError::SchemaMismatch {
        message: "workbook has no sheets".to_string(),
    })
}

fn read_sheet_range(sheet: &str, range: &calamine::Range<Data>, schema: Option<&Schema>) -> TableIoResult<DataSet> {
    let (header_row_idx, header_cells) =
        find_header_row(range).map_err(|e| wrap_schema_err_with_sheet(sheet, e))?;

    let body: Vec<&[Data]> = range.rows().skip(header_row_idx + 1).collect();

    let (schema, col_idxs) = match schema {
        Some(schema) => {
            let idxs = project_schema(&header_cells, schema).map_err(|e| wrap_schema_err_with_sheet(sheet, e))?;
            (schema.clone(), idxs)
        }
        None => {
            let fields = header_cells
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let natural: Vec<Value> = body
                        .iter()
                        .map(|row| natural_value(row.get(idx).unwrap_or(&Data::Empty)))
                        .collect();
                    Field::new(name.trim(), unify_value_types(&natural))
                })
                .collect();
            (Schema::new(fields), (0..header_cells.len()).collect())
        }
    };

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(body.len());
    for (offset, row) in body.iter().enumerate() {
        // Report 1-based row number (Excel-like).
        let user_row = header_row_idx + offset + 2;

        let mut out_row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &col_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let cell = row.get(col_idx).unwrap_or(&Data::Empty);
            let col_label = format!("{sheet}:{name}", name = field.name);
            out_row.push(convert_cell(user_row, &col_label, &field.data_type, cell)?);
        }
        rows.push(out_row);
    }

    Ok(DataSet::new(schema, rows))
}

fn wrap_schema_err_with_sheet(sheet: &str, err: TableIoError) -> TableIoError {
    match err {
        TableIoError::SchemaMismatch { message } => TableIoError::SchemaMismatch {
            message: format!("sheet '{sheet}': {message}"),
        },
        other => other,
    }
}

fn find_header_row(range: &calamine::Range<Data>) -> TableIoResult<(usize, Vec<String>)> {
    range
        .rows()
        .enumerate()
        .find(|(_, row)| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|(idx0, row)| (idx0, row.iter().map(cell_to_header_string).collect()))
        .ok_or_else(|| TableIoError::SchemaMismatch {
            message: "sheet has no non-empty rows (no header row found)".to_string(),
        })
}

fn project_schema(header_cells: &[String], schema: &Schema) -> TableIoResult<Vec<usize>> {
    schema
        .fields
        .iter()
        .map(|f| {
            header_cells
                .iter()
                .position(|h| h.trim() == f.name)
                .ok_or_else(|| TableIoError::SchemaMismatch {
                    message: format!("missing required column '{}'. headers={:?}", f.name, header_cells),
                })
        })
        .collect()
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(f) => f.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => "".to_string(),
    }
}

/// A cell's value without a target type. Whole-number floats count as integers, since
/// spreadsheets store every number as a float.
fn natural_value(c: &Data) -> Value {
    match c {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::Int64(*f as i64),
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) if s.trim().is_empty() => Value::Null,
        other => Value::Utf8(cell_to_string(other)),
    }
}

fn convert_cell(row: usize, column: &str, data_type: &DataType, c: &Data) -> TableIoResult<Value> {
    if matches!(c, Data::Empty) {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(cell_to_string(c))),
        DataType::Bool => parse_bool_cell(row, column, c).map(Value::Bool),
        DataType::Int64 => parse_i64_cell(row, column, c).map(Value::Int64),
        DataType::Float64 => parse_f64_cell(row, column, c).map(Value::Float64),
    }
}

fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        _ => c.to_string(),
    }
}

fn parse_bool_cell(row: usize, column: &str, c: &Data) -> TableIoResult<bool> {
    match c {
        Data::Bool(b) => Ok(*b),
        Data::Int(i) => Ok(*i != 0),
        Data::Float(f) => Ok(*f != 0.0),
        Data::String(s) => parse_bool(s).map_err(|message| TableIoError::ParseError {
            row,
            column: column.to_string(),
            raw: s.clone(),
            message,
        }),
        _ => Err(TableIoError::ParseError {
            row,
            column: column.to_string(),
            raw: c.to_string(),
            message: "expected bool".to_string(),
        }),
    }
}

fn parse_i64_cell(row: usize, column: &str, c: &Data) -> TableIoResult<i64> {
    match c {
        Data::Int(i) => Ok(*i),
        Data::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        Data::Float(_) => Err(TableIoError::ParseError {
            row,
            column: column.to_string(),
            raw: c.to_string(),
            message: "expected integer (got non-integer float)".to_string(),
        }),
        Data::String(s) => s.trim().parse::<i64>().map_err(|e| TableIoError::ParseError {
            row,
            column: column.to_string(),
            raw: s.clone(),
            message: e.to_string(),
        }),
        _ => Err(TableIoError::ParseError {
            row,
            column: column.to_string(),
            raw: c.to_string(),
            message: "expected integer".to_string(),
        }),
    }
}

fn parse_f64_cell(row: usize, column: &str, c: &Data) -> TableIoResult<f64> {
    match c {
        Data::Float(f) => Ok(*f),
        Data::Int(i) => Ok(*i as f64),
        Data::String(s) => s.trim().parse::<f64>().map_err(|e| TableIoError::ParseError {
            row,
            column: column.to_string(),
            raw: s.clone(),
            message: e.to_string(),
        }),
        _ => Err(TableIoError::ParseError {
            row,
            column: column.to_string(),
            raw: c.to_string(),
            message: "expected number".to_string(),
        }),
    }
}

/// Write `table` to a new workbook with a single sheet: a header row, then one row per record.
/// Null cells are left empty.
pub fn write_excel(path: impl AsRef<Path>, sheet_name: &str, table: &DataSet) -> TableIoResult<()> {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    ws.set_name(sheet_name)?;

    for (col, name) in table.schema.field_names().enumerate() {
        ws.write_string(0, col as u16, name)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let xl_row = (r + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            let col = col as u16;
            match value {
                Value::Null => {}
                Value::Int64(v) => {
                    ws.write_number(xl_row, col, *v as f64)?;
                }
                Value::Float64(v) => {
                    ws.write_number(xl_row, col, *v)?;
                }
                Value::Bool(v) => {
                    ws.write_boolean(xl_row, col, *v)?;
                }
                Value::Utf8(s) => {
                    ws.write_string(xl_row, col, s)?;
                }
            }
        }
    }

    workbook.save(path.as_ref())?;
    Ok(())
}
