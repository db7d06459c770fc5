//! Arrow IPC files.

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType as ArrowType, Field as ArrowField, Schema as ArrowSchema};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;

use crate::backend::{Backend, FormatHandler, LoadError, Operation};
use crate::dispatch::{ReadOptions, WriteOptions};
use crate::error::{TableIoError, TableIoResult};
use crate::format::{Capability, FormatVariant};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Provides [`Capability::Arrow`].
#[derive(Debug, Default)]
pub struct ArrowBackend;

impl Backend for ArrowBackend {
    fn capability(&self) -> Capability {
        Capability::Arrow
    }

    fn load(&self) -> Result<Vec<Arc<dyn FormatHandler>>, LoadError> {
        Ok(vec![Arc::new(ArrowHandler)])
    }
}

/// Handler for [`FormatVariant::ColumnarInterchange`].
#[derive(Debug, Default)]
pub struct ArrowHandler;

impl FormatHandler for ArrowHandler {
    fn formats(&self) -> &[FormatVariant] {
        &[FormatVariant::ColumnarInterchange]
    }

    fn supports(&self, _operation: Operation) -> bool {
        true
    }

    fn read_path(&self, _format: FormatVariant, path: &Path, options: &ReadOptions) -> TableIoResult<DataSet> {
        read_arrow(File::open(path)?, options.schema.as_ref())
    }

    fn read_buffer(&self, _format: FormatVariant, bytes: &[u8], options: &ReadOptions) -> TableIoResult<DataSet> {
        read_arrow(Cursor::new(bytes), options.schema.as_ref())
    }

    fn write_path(
        &self,
        _format: FormatVariant,
        path: &Path,
        table: &DataSet,
        _options: &WriteOptions,
    ) -> TableIoResult<()> {
        write_arrow(BufWriter::new(File::create(path)?), table)
    }
}

/// Read every record batch of an Arrow IPC file.
///
/// Integer columns of any width become `Int64`, float columns `Float64`, and string columns
/// `Utf8`. With a schema, the listed columns are selected by name and cast to its types.
pub fn read_arrow<R: Read + Seek>(input: R, schema: Option<&Schema>) -> TableIoResult<DataSet> {
    let reader = FileReader::try_new(input, None)?;
    let file_schema = reader.schema();

    let mut out_fields = Vec::new();
    let mut projection = Vec::new();
    match schema {
        Some(schema) => {
            for field in &schema.fields {
                let idx = file_schema.index_of(&field.name).map_err(|_| TableIoError::SchemaMismatch {
                    message: format!("missing required column '{}'", field.name),
                })?;
                projection.push(idx);
                out_fields.push(field.clone());
            }
        }
        None => {
            for (idx, f) in file_schema.fields().iter().enumerate() {
                let data_type = match natural_type(f.data_type()) {
                    Some(t) => t,
                    None => {
                        return Err(TableIoError::SchemaMismatch {
                            message: format!("column '{}' has unsupported arrow type {}", f.name(), f.data_type()),
                        });
                    }
                };
                projection.push(idx);
                out_fields.push(Field::new(f.name().as_str(), data_type));
            }
        }
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for batch in reader {
        let batch = batch?;
        let mut columns: Vec<Vec<Value>> = Vec::with_capacity(out_fields.len());
        for (field, &idx) in out_fields.iter().zip(&projection) {
            columns.push(column_values(batch.column(idx), field)?);
        }
        for r in 0..batch.num_rows() {
            rows.push(columns.iter_mut().map(|c| std::mem::replace(&mut c[r], Value::Null)).collect());
        }
    }

    Ok(DataSet::new(Schema::new(out_fields), rows))
}

fn natural_type(t: &ArrowType) -> Option<DataType> {
    match t {
        ArrowType::Int8
        | ArrowType::Int16
        | ArrowType::Int32
        | ArrowType::Int64
        | ArrowType::UInt8
        | ArrowType::UInt16
        | ArrowType::UInt32
        | ArrowType::UInt64 => Some(DataType::Int64),
        ArrowType::Float16 | ArrowType::Float32 | ArrowType::Float64 => Some(DataType::Float64),
        ArrowType::Boolean => Some(DataType::Bool),
        ArrowType::Utf8 | ArrowType::LargeUtf8 | ArrowType::Utf8View => Some(DataType::Utf8),
        ArrowType::Null => Some(DataType::Utf8),
        _ => None,
    }
}

fn column_values(array: &ArrayRef, field: &Field) -> TableIoResult<Vec<Value>> {
    let target = arrow_type(field.data_type);
    let array = cast(array, &target)?;
    let n = array.len();

    let values = match field.data_type {
        DataType::Int64 => {
            let a = downcast::<Int64Array>(&array, field)?;
            (0..n).map(|i| if a.is_null(i) { Value::Null } else { Value::Int64(a.value(i)) }).collect()
        }
        DataType::Float64 => {
            let a = downcast::<Float64Array>(&array, field)?;
            (0..n).map(|i| if a.is_null(i) { Value::Null } else { Value::Float64(a.value(i)) }).collect()
        }
        DataType::Bool => {
            let a = downcast::<BooleanArray>(&array, field)?;
            (0..n).map(|i| if a.is_null(i) { Value::Null } else { Value::Bool(a.value(i)) }).collect()
        }
        DataType::Utf8 => {
            let a = downcast::<StringArray>(&array, field)?;
            (0..n)
                .map(|i| if a.is_null(i) { Value::Null } else { Value::Utf8(a.value(i).to_string()) })
                .collect()
        }
    };
    Ok(values)
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, field: &Field) -> TableIoResult<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| TableIoError::SchemaMismatch {
        message: format!("column '{}' could not be read as {:?}", field.name, field.data_type),
    })
}

fn arrow_type(t: DataType) -> ArrowType {
    match t {
        DataType::Int64 => ArrowType::Int64,
        DataType::Float64 => ArrowType::Float64,
        DataType::Bool => ArrowType::Boolean,
        DataType::Utf8 => ArrowType::Utf8,
    }
}

/// Write `table` as an Arrow IPC file with a single record batch.
pub fn write_arrow<W: std::io::Write>(output: W, table: &DataSet) -> TableIoResult<()> {
    table.check_row_widths()?;
    let fields: Vec<ArrowField> = table
        .schema
        .fields
        .iter()
        .map(|f| ArrowField::new(f.name.as_str(), arrow_type(f.data_type), true))
        .collect();
    let schema = Arc::new(ArrowSchema::new(fields));

    let columns: Vec<ArrayRef> = table
        .schema
        .fields
        .iter()
        .enumerate()
        .map(|(idx, f)| {
            let cells = table.rows.iter().map(|row| &row[idx]);
            let array: ArrayRef = match f.data_type {
                DataType::Int64 => Arc::new(Int64Array::from(
                    cells.map(|v| if let Value::Int64(i) = v { Some(*i) } else { None }).collect::<Vec<_>>(),
                )),
                DataType::Float64 => Arc::new(Float64Array::from(
                    cells.map(|v| if let Value::Float64(x) = v { Some(*x) } else { None }).collect::<Vec<_>>(),
                )),
                DataType::Bool => Arc::new(BooleanArray::from(
                    cells.map(|v| if let Value::Bool(b) = v { Some(*b) } else { None }).collect::<Vec<_>>(),
                )),
                DataType::Utf8 => Arc::new(StringArray::from(
                    cells
                        .map(|v| if let Value::Utf8(s) = v { Some(s.as_str()) } else { None })
                        .collect::<Vec<_>>(),
                )),
            };
            array
        })
        .collect();

    let batch = RecordBatch::try_new(Arc::clone(&schema), columns)?;
    let mut writer = FileWriter::try_new(output, &schema)?;
    writer.write(&batch)?;
    writer.finish()?;
    Ok(())
}
