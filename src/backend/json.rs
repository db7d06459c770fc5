//! JSON row tables.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! With an explicit schema, nested fields can be addressed with dot paths (e.g. `user.name`).
//! Without one, columns are the top-level keys in first-seen order. Output is always an array
//! of objects.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::backend::{Backend, FormatHandler, LoadError, Operation};
use crate::dispatch::{ReadOptions, WriteOptions};
use crate::error::{TableIoError, TableIoResult};
use crate::format::{Capability, FormatVariant};
use crate::types::{coerce_value, unify_value_types, DataSet, DataType, Field, Schema, Tabular, Value};

/// Provides [`Capability::Json`].
#[derive(Debug, Default)]
pub struct JsonBackend;

impl Backend for JsonBackend {
    fn capability(&self) -> Capability {
        Capability::Json
    }

    fn load(&self) -> Result<Vec<Arc<dyn FormatHandler>>, LoadError> {
        Ok(vec![Arc::new(JsonHandler)])
    }
}

/// Handler for [`FormatVariant::JsonTable`].
#[derive(Debug, Default)]
pub struct JsonHandler;

impl FormatHandler for JsonHandler {
    fn formats(&self) -> &[FormatVariant] {
        &[FormatVariant::JsonTable]
    }

    fn supports(&self, _operation: Operation) -> bool {
        true
    }

    fn read_path(&self, _format: FormatVariant, path: &Path, options: &ReadOptions) -> TableIoResult<DataSet> {
        let text = fs::read_to_string(path)?;
        read_json_str(&text, options.schema.as_ref())
    }

    fn read_buffer(&self, _format: FormatVariant, bytes: &[u8], options: &ReadOptions) -> TableIoResult<DataSet> {
        let text = std::str::from_utf8(bytes).map_err(|e| TableIoError::SchemaMismatch {
            message: format!("json input is not utf-8: {e}"),
        })?;
        read_json_str(text, options.schema.as_ref())
    }

    fn write_path(
        &self,
        _format: FormatVariant,
        path: &Path,
        table: &DataSet,
        _options: &WriteOptions,
    ) -> TableIoResult<()> {
        let mut out = BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer(&mut out, &to_json_rows(table))?;
        out.flush()?;
        Ok(())
    }
}

/// Read JSON (array, single object, or NDJSON) from a string.
pub fn read_json_str(input: &str, schema: Option<&Schema>) -> TableIoResult<DataSet> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TableIoError::SchemaMismatch {
            message: "json input is empty".to_string(),
        });
    }

    // First try parsing as a single JSON value (array or object).
    let values = if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match v {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(_) => vec![v],
            _ => {
                return Err(TableIoError::SchemaMismatch {
                    message: "json must be an object, an array of objects, or NDJSON".to_string(),
                });
            }
        }
    } else {
        // Fall back to NDJSON.
        let mut values = Vec::new();
        for (i, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| TableIoError::SchemaMismatch {
                message: format!("invalid ndjson at line {}: {}", i + 1, e),
            })?;
            values.push(v);
        }
        values
    };

    match schema {
        Some(schema) => read_json_values(&values, schema),
        None => infer_json_values(&values),
    }
}

fn read_json_values(values: &[serde_json::Value], schema: &Schema) -> TableIoResult<DataSet> {
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(values.len());

    for (idx0, v) in values.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = v.as_object().ok_or_else(|| TableIoError::SchemaMismatch {
            message: format!("row {row_num} is not a json object"),
        })?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let jv = get_by_dot_path(obj, &field.name).ok_or_else(|| TableIoError::SchemaMismatch {
                message: format!("row {row_num} missing required field '{}'", field.name),
            })?;
            row.push(convert_json_value(row_num, &field.name, &field.data_type, jv)?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema.clone(), rows))
}

/// Build a dataset from row objects without a schema.
///
/// Columns are the top-level keys in first-seen order; keys missing from a row are null.
fn infer_json_values(values: &[serde_json::Value]) -> TableIoResult<DataSet> {
    let mut names: Vec<String> = Vec::new();
    let mut raw_rows: Vec<&serde_json::Map<String, serde_json::Value>> = Vec::with_capacity(values.len());
    for (idx0, v) in values.iter().enumerate() {
        let obj = v.as_object().ok_or_else(|| TableIoError::SchemaMismatch {
            message: format!("row {} is not a json object", idx0 + 1),
        })?;
        for key in obj.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
        raw_rows.push(obj);
    }

    let mut columns: Vec<Vec<Value>> = Vec::with_capacity(names.len());
    for name in &names {
        let mut col = Vec::with_capacity(raw_rows.len());
        for (idx0, obj) in raw_rows.iter().enumerate() {
            col.push(match obj.get(name) {
                Some(v) => scalar_from_json(idx0 + 1, name, v)?,
                None => Value::Null,
            });
        }
        columns.push(col);
    }

    let types: Vec<DataType> = columns.iter().map(|c| unify_value_types(c)).collect();
    let rows = (0..raw_rows.len())
        .map(|r| {
            columns
                .iter_mut()
                .zip(&types)
                .map(|(col, &t)| coerce_value(std::mem::replace(&mut col[r], Value::Null), t))
                .collect()
        })
        .collect();
    let fields = names.into_iter().zip(types).map(|(n, t)| Field::new(n, t)).collect();

    Ok(DataSet::new(Schema::new(fields), rows))
}

fn scalar_from_json(row: usize, column: &str, v: &serde_json::Value) -> TableIoResult<Value> {
    match v {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::String(s) => Ok(Value::Utf8(s.clone())),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int64(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float64(f))
            } else {
                Err(TableIoError::ParseError {
                    row,
                    column: column.to_string(),
                    raw: n.to_string(),
                    message: "number out of range".to_string(),
                })
            }
        }
        // Nested values are kept as their JSON text.
        other => Ok(Value::Utf8(other.to_string())),
    }
}

fn get_by_dot_path<'a>(
    root: &'a serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Option<&'a serde_json::Value> {
    // An exact key wins over a nested path.
    if let Some(v) = root.get(path) {
        return Some(v);
    }

    let mut segments = path.split('.');
    let mut current: &serde_json::Value = root.get(segments.next()?)?;
    for segment in segments {
        match current {
            serde_json::Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn convert_json_value(row: usize, column: &str, data_type: &DataType, v: &serde_json::Value) -> TableIoResult<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => v.as_str().map(|s| Value::Utf8(s.to_string())).ok_or_else(|| TableIoError::ParseError {
            row,
            column: column.to_string(),
            raw: v.to_string(),
            message: "expected string".to_string(),
        }),
        DataType::Bool => v.as_bool().map(Value::Bool).ok_or_else(|| TableIoError::ParseError {
            row,
            column: column.to_string(),
            raw: v.to_string(),
            message: "expected bool".to_string(),
        }),
        DataType::Int64 => {
            if let Some(n) = v.as_i64() {
                Ok(Value::Int64(n))
            } else if let Some(n) = v.as_u64() {
                i64::try_from(n).map(Value::Int64).map_err(|_| TableIoError::ParseError {
                    row,
                    column: column.to_string(),
                    raw: v.to_string(),
                    message: "u64 out of range for i64".to_string(),
                })
            } else {
                Err(TableIoError::ParseError {
                    row,
                    column: column.to_string(),
                    raw: v.to_string(),
                    message: "expected integer number".to_string(),
                })
            }
        }
        DataType::Float64 => v.as_f64().map(Value::Float64).ok_or_else(|| TableIoError::ParseError {
            row,
            column: column.to_string(),
            raw: v.to_string(),
            message: "expected number".to_string(),
        }),
    }
}

fn to_json_value(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Int64(i) => serde_json::Value::from(*i),
        // Non-finite floats have no JSON representation.
        Value::Float64(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Utf8(s) => serde_json::Value::String(s.clone()),
    }
}

fn to_json_rows(table: &DataSet) -> serde_json::Value {
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let obj: serde_json::Map<String, serde_json::Value> = table
                .schema
                .field_names()
                .zip(row)
                .map(|(name, v)| (name.to_string(), to_json_value(v)))
                .collect();
            serde_json::Value::Object(obj)
        })
        .collect();
    serde_json::Value::Array(rows)
}

/// JSON values with a table shape: an array of row objects, or an object mapping column names
/// to equal-length arrays. Every other JSON value is not a table.
///
/// Columns and their types follow the same rules as reading a `.json` file without a schema.
impl Tabular for serde_json::Value {
    fn schema(&self) -> Option<Schema> {
        json_table(self).map(|ds| ds.schema)
    }

    fn for_each_row(&self, visit: &mut dyn FnMut(&[Value])) {
        if let Some(ds) = json_table(self) {
            for row in &ds.rows {
                visit(row);
            }
        }
    }
}

fn json_table(v: &serde_json::Value) -> Option<DataSet> {
    match v {
        serde_json::Value::Array(items) => infer_json_values(items).ok(),
        serde_json::Value::Object(columns) => {
            let mut arrays = columns.values().map(serde_json::Value::as_array);
            let len = arrays.next()??.len();
            if !arrays.all(|a| a.is_some_and(|a| a.len() == len)) {
                return None;
            }
            let rows: Vec<serde_json::Value> = (0..len)
                .map(|i| {
                    serde_json::Value::Object(
                        columns
                            .iter()
                            .map(|(name, col)| (name.clone(), col[i].clone()))
                            .collect(),
                    )
                })
                .collect();
            infer_json_values(&rows).ok()
        }
        _ => None,
    }
}
