//! Core data model types.
//!
//! Every backend reads into and writes from an in-memory [`DataSet`]. A [`Schema`] can be
//! supplied by the caller; otherwise backends infer one with [`infer_data_type`].

use std::collections::HashSet;

use crate::error::{TableIoError, TableIoResult};

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of fields describing the columns of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single typed value in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// The data type of a non-null value.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::Bool(_) => Some(DataType::Bool),
            Value::Utf8(_) => Some(DataType::Utf8),
        }
    }

    /// Text rendering used by text-based writers.
    ///
    /// Nulls render as the empty string. Floats always keep a fractional part or exponent so
    /// they are read back as floats.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int64(v) => v.to_string(),
            Value::Float64(v) => format!("{v:?}"),
            Value::Bool(v) => v.to_string(),
            Value::Utf8(s) => s.clone(),
        }
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// All values of a named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let idx = self.schema.index_of(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    /// Fail with [`TableIoError::SchemaMismatch`] unless every row has one value per field.
    pub fn check_row_widths(&self) -> TableIoResult<()> {
        let width = self.schema.len();
        match self.rows.iter().position(|row| row.len() != width) {
            Some(idx) => Err(TableIoError::SchemaMismatch {
                message: format!("row {} has {} values, expected {width}", idx + 1, self.rows[idx].len()),
            }),
            None => Ok(()),
        }
    }
}

/// The row/column contract a value must satisfy to be written as a table.
///
/// Implementors return `None` from [`Tabular::schema`] when they have no tabular shape, which
/// `write_table` reports as [`TableIoError::InvalidTable`].
pub trait Tabular {
    /// Column schema, or `None` if the value is not a table.
    fn schema(&self) -> Option<Schema>;

    /// Visit every row in order. Rows must follow [`Tabular::schema`].
    fn for_each_row(&self, visit: &mut dyn FnMut(&[Value]));
}

impl Tabular for DataSet {
    fn schema(&self) -> Option<Schema> {
        Some(self.schema.clone())
    }

    fn for_each_row(&self, visit: &mut dyn FnMut(&[Value])) {
        for row in &self.rows {
            visit(row);
        }
    }
}

/// Copy a [`Tabular`] value into a validated [`DataSet`].
///
/// Checks that a schema exists, column names are non-empty and unique, every row has one value
/// per column, and every non-null value matches its column type.
pub fn materialize(table: &dyn Tabular) -> TableIoResult<DataSet> {
    let schema = table.schema().ok_or_else(|| TableIoError::InvalidTable {
        message: "value does not expose a row/column schema".to_string(),
    })?;
    if schema.is_empty() {
        return Err(TableIoError::InvalidTable {
            message: "table has no columns".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for field in &schema.fields {
        if field.name.is_empty() {
            return Err(TableIoError::InvalidTable {
                message: "column names must not be empty".to_string(),
            });
        }
        if !seen.insert(field.name.as_str()) {
            return Err(TableIoError::InvalidTable {
                message: format!("duplicate column '{}'", field.name),
            });
        }
    }

    let mut rows = Vec::new();
    let mut problem: Option<String> = None;
    table.for_each_row(&mut |row| {
        if problem.is_some() {
            return;
        }
        let row_num = rows.len() + 1;
        if row.len() != schema.len() {
            problem = Some(format!(
                "row {row_num} has {} values, expected {}",
                row.len(),
                schema.len()
            ));
            return;
        }
        for (field, value) in schema.fields.iter().zip(row) {
            if let Some(actual) = value.data_type() {
                if actual != field.data_type {
                    problem = Some(format!(
                        "row {row_num} column '{}' holds {actual:?}, expected {:?}",
                        field.name, field.data_type
                    ));
                    return;
                }
            }
        }
        rows.push(row.to_vec());
    });

    match problem {
        Some(message) => Err(TableIoError::InvalidTable { message }),
        None => Ok(DataSet::new(schema, rows)),
    }
}

/// Infer the narrowest type that fits every non-empty text cell of a column.
///
/// Tried in order: `Int64`, `Float64`, `Bool`, then `Utf8`. A cell only counts as a number or a
/// boolean when [`Value::to_text`] would render that value back as the same text, so `"02139"`,
/// `" 7"` and `"TRUE"` keep the column as `Utf8`. A column with no non-empty cells is `Utf8`.
pub fn infer_data_type<'a>(cells: impl IntoIterator<Item = &'a str>) -> DataType {
    let mut int_ok = true;
    let mut float_ok = true;
    let mut bool_ok = true;
    let mut any = false;

    for cell in cells {
        if cell.is_empty() {
            continue;
        }
        any = true;
        int_ok = int_ok && cell.parse::<i64>().is_ok_and(|v| v.to_string() == cell);
        float_ok = float_ok && cell.parse::<f64>().is_ok_and(|v| format!("{v:?}") == cell);
        bool_ok = bool_ok && (cell == "true" || cell == "false");
        if !int_ok && !float_ok && !bool_ok {
            return DataType::Utf8;
        }
    }

    match (any, int_ok, float_ok, bool_ok) {
        (false, ..) => DataType::Utf8,
        (true, true, _, _) => DataType::Int64,
        (true, _, true, _) => DataType::Float64,
        (true, _, _, true) => DataType::Bool,
        _ => DataType::Utf8,
    }
}

/// Unify the types of already-typed values in one column.
///
/// Mixed integers and floats widen to `Float64`; any other mix becomes `Utf8`.
pub fn unify_value_types<'a>(values: impl IntoIterator<Item = &'a Value>) -> DataType {
    let mut current: Option<DataType> = None;
    for v in values {
        let Some(t) = v.data_type() else { continue };
        current = Some(match (current, t) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(DataType::Int64), DataType::Float64) | (Some(DataType::Float64), DataType::Int64) => {
                DataType::Float64
            }
            _ => DataType::Utf8,
        });
    }
    current.unwrap_or(DataType::Utf8)
}

/// Convert a value into `data_type` after [`unify_value_types`] widened its column.
pub fn coerce_value(value: Value, data_type: DataType) -> Value {
    match (value, data_type) {
        (Value::Null, _) => Value::Null,
        (Value::Int64(v), DataType::Float64) => Value::Float64(v as f64),
        (v, DataType::Utf8) if !matches!(v, Value::Utf8(_)) => Value::Utf8(v.to_text()),
        (v, _) => v,
    }
}
