//! Parquet reading and writing.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parquet::basic::{ConvertedType, LogicalType, Repetition, Type as PhysicalType};
use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{ChunkReader, FileReader};
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::file::writer::SerializedFileWriter;
use parquet::record::{Field as ParquetField, Row};
use parquet::schema::types::Type;

use crate::backend::{Backend, FormatHandler, LoadError, Operation};
use crate::dispatch::{ReadOptions, WriteOptions};
use crate::error::{TableIoError, TableIoResult};
use crate::format::{Capability, FormatVariant};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Provides [`Capability::Parquet`].
#[derive(Debug, Default)]
pub struct ParquetBackend;

impl Backend for ParquetBackend {
    fn capability(&self) -> Capability {
        Capability::Parquet
    }

    fn load(&self) -> Result<Vec<Arc<dyn FormatHandler>>, LoadError> {
        Ok(vec![Arc::new(ParquetHandler)])
    }
}

/// Handler for [`FormatVariant::ColumnarStandard`]. Reads from paths only.
#[derive(Debug, Default)]
pub struct ParquetHandler;

impl FormatHandler for ParquetHandler {
    fn formats(&self) -> &[FormatVariant] {
        &[FormatVariant::ColumnarStandard]
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(operation, Operation::ReadPath | Operation::Write)
    }

    fn read_path(&self, _format: FormatVariant, path: &Path, options: &ReadOptions) -> TableIoResult<DataSet> {
        read_parquet(path, options.schema.as_ref())
    }

    fn write_path(
        &self,
        _format: FormatVariant,
        path: &Path,
        table: &DataSet,
        _options: &WriteOptions,
    ) -> TableIoResult<()> {
        write_parquet(path, table)
    }
}

/// Read a Parquet file into a [`DataSet`].
///
/// Uses the record API (`RowIter`). Columns are the file's leaf paths, with nested group leaves
/// named `parent.child`. With a schema, every field must exist as such a column; without one, the
/// schema is derived from the file, with dates, timestamps and other annotated columns as `Utf8`.
pub fn read_parquet(path: impl AsRef<Path>, schema: Option<&Schema>) -> TableIoResult<DataSet> {
    let reader = SerializedFileReader::try_from(path.as_ref())?;

    let file_schema = parquet_file_schema(&reader);
    let schema = match schema {
        Some(schema) => {
            for field in &schema.fields {
                if file_schema.index_of(&field.name).is_none() {
                    return Err(TableIoError::SchemaMismatch {
                        message: format!("missing required column '{}'", field.name),
                    });
                }
            }
            schema.clone()
        }
        None => file_schema,
    };

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx0, row_res) in reader.into_iter().enumerate() {
        let row_num = idx0 + 1;
        let row = row_res?;

        let mut map: HashMap<String, &ParquetField> = HashMap::new();
        flatten_row("", &row, &mut map);

        let mut out_row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for f in &schema.fields {
            let value = match map.get(f.name.as_str()) {
                Some(v) => convert_parquet_field(row_num, &f.name, &f.data_type, v)?,
                None if has_null_parent(&map, &f.name) => Value::Null,
                None => {
                    return Err(TableIoError::SchemaMismatch {
                        message: format!("row {row_num} missing required column '{}'", f.name),
                    });
                }
            };
            out_row.push(value);
        }
        rows.push(out_row);
    }

    Ok(DataSet::new(schema, rows))
}

/// Index a record by dotted leaf path, descending into struct groups.
fn flatten_row<'a>(prefix: &str, row: &'a Row, out: &mut HashMap<String, &'a ParquetField>) {
    for (name, field) in row.get_column_iter() {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match field {
            ParquetField::Group(inner) => flatten_row(&path, inner, out),
            other => {
                out.insert(path, other);
            }
        }
    }
}

// An absent leaf under a null group is null, not missing.
fn has_null_parent(map: &HashMap<String, &ParquetField>, name: &str) -> bool {
    name.match_indices('.')
        .any(|(idx, _)| matches!(map.get(&name[..idx]), Some(ParquetField::Null)))
}

/// One column per leaf path. LIST and MAP groups are kept whole as a single column.
fn parquet_file_schema<R: ChunkReader + 'static>(reader: &SerializedFileReader<R>) -> Schema {
    let root = reader.metadata().file_metadata().schema_descr().root_schema();
    let mut fields = Vec::new();
    for child in root.get_fields() {
        collect_leaf_fields("", child, &mut fields);
    }
    Schema::new(fields)
}

fn collect_leaf_fields(prefix: &str, node: &Type, out: &mut Vec<Field>) {
    let path = if prefix.is_empty() {
        node.name().to_string()
    } else {
        format!("{prefix}.{}", node.name())
    };
    let info = node.get_basic_info();

    if !node.is_group() {
        let data_type = leaf_data_type(node.get_physical_type(), info.logical_type_ref(), info.converted_type());
        out.push(Field::new(path, data_type));
        return;
    }

    let collection = matches!(info.logical_type_ref(), Some(LogicalType::List | LogicalType::Map))
        || matches!(
            info.converted_type(),
            ConvertedType::LIST | ConvertedType::MAP | ConvertedType::MAP_KEY_VALUE
        );
    if collection {
        out.push(Field::new(path, DataType::Utf8));
    } else {
        for child in node.get_fields() {
            collect_leaf_fields(&path, child, out);
        }
    }
}

/// Type of a primitive column read without a schema.
///
/// Only plain numbers keep a numeric type. Annotated columns (dates, times, timestamps,
/// decimals, INT96) come back as `Utf8` holding the record API's rendering, e.g. `2022-01-08`.
fn leaf_data_type(physical: PhysicalType, logical: Option<&LogicalType>, converted: ConvertedType) -> DataType {
    let plain_integer = match logical {
        Some(LogicalType::Integer { .. }) => true,
        Some(_) => false,
        None => matches!(
            converted,
            ConvertedType::NONE
                | ConvertedType::INT_8
                | ConvertedType::INT_16
                | ConvertedType::INT_32
                | ConvertedType::INT_64
                | ConvertedType::UINT_8
                | ConvertedType::UINT_16
                | ConvertedType::UINT_32
                | ConvertedType::UINT_64
        ),
    };

    match physical {
        PhysicalType::BOOLEAN => DataType::Bool,
        PhysicalType::INT32 | PhysicalType::INT64 if plain_integer => DataType::Int64,
        PhysicalType::FLOAT | PhysicalType::DOUBLE if logical.is_none() => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn convert_parquet_field(row: usize, column: &str, data_type: &DataType, f: &ParquetField) -> TableIoResult<Value> {
    if matches!(f, ParquetField::Null) {
        return Ok(Value::Null);
    }

    let mismatch = |message: &str| TableIoError::ParseError {
        row,
        column: column.to_string(),
        raw: f.to_string(),
        message: message.to_string(),
    };

    match data_type {
        DataType::Utf8 => match f {
            ParquetField::Str(s) => Ok(Value::Utf8(s.clone())),
            ParquetField::Bytes(b) => b
                .as_utf8()
                .map(|s| Value::Utf8(s.to_string()))
                .map_err(|_| mismatch("expected utf-8 string")),
            other => Ok(Value::Utf8(other.to_string())),
        },
        DataType::Bool => match f {
            ParquetField::Bool(b) => Ok(Value::Bool(*b)),
            _ => Err(mismatch("expected bool")),
        },
        DataType::Int64 => match f {
            ParquetField::Byte(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::Short(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::Int(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::Long(v) => Ok(Value::Int64(*v)),
            ParquetField::UByte(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::UShort(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::UInt(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::ULong(v) => i64::try_from(*v)
                .map(Value::Int64)
                .map_err(|_| mismatch("u64 out of range for i64")),
            _ => Err(mismatch("expected integer")),
        },
        DataType::Float64 => match f {
            ParquetField::Float(v) => Ok(Value::Float64(f64::from(*v))),
            ParquetField::Double(v) => Ok(Value::Float64(*v)),
            _ => Err(mismatch("expected number")),
        },
    }
}

/// Write `table` as a single row group with one OPTIONAL column per field.
pub fn write_parquet(path: impl AsRef<Path>, table: &DataSet) -> TableIoResult<()> {
    table.check_row_widths()?;

    let mut columns = Vec::with_capacity(table.schema.fields.len());
    for field in &table.schema.fields {
        let builder = match field.data_type {
            DataType::Int64 => Type::primitive_type_builder(&field.name, PhysicalType::INT64),
            DataType::Float64 => Type::primitive_type_builder(&field.name, PhysicalType::DOUBLE),
            DataType::Bool => Type::primitive_type_builder(&field.name, PhysicalType::BOOLEAN),
            DataType::Utf8 => Type::primitive_type_builder(&field.name, PhysicalType::BYTE_ARRAY)
                .with_logical_type(Some(LogicalType::String)),
        };
        columns.push(Arc::new(builder.with_repetition(Repetition::OPTIONAL).build()?));
    }
    let schema = Type::group_type_builder("schema").with_fields(columns).build()?;

    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path)?;
    let mut writer = SerializedFileWriter::new(file, Arc::new(schema), props)?;

    let mut rg = writer.next_row_group()?;
    let mut col_idx: usize = 0;
    while let Some(mut col) = rg.next_column()? {
        let values = table.rows.iter().map(|row| &row[col_idx]);
        let def_levels: Vec<i16> = values.clone().map(|v| i16::from(*v != Value::Null)).collect();
        match col.untyped() {
            ColumnWriter::Int64ColumnWriter(w) => {
                let data: Vec<i64> = values
                    .filter_map(|v| match v {
                        Value::Int64(i) => Some(*i),
                        _ => None,
                    })
                    .collect();
                w.write_batch(&data, Some(&def_levels), None)?;
            }
            ColumnWriter::DoubleColumnWriter(w) => {
                let data: Vec<f64> = values
                    .filter_map(|v| match v {
                        Value::Float64(f) => Some(*f),
                        _ => None,
                    })
                    .collect();
                w.write_batch(&data, Some(&def_levels), None)?;
            }
            ColumnWriter::BoolColumnWriter(w) => {
                let data: Vec<bool> = values
                    .filter_map(|v| match v {
                        Value::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect();
                w.write_batch(&data, Some(&def_levels), None)?;
            }
            ColumnWriter::ByteArrayColumnWriter(w) => {
                let data: Vec<ByteArray> = values
                    .filter_map(|v| match v {
                        Value::Utf8(s) => Some(ByteArray::from(s.as_str())),
                        _ => None,
                    })
                    .collect();
                w.write_batch(&data, Some(&def_levels), None)?;
            }
            _ => {
                return Err(TableIoError::SchemaMismatch {
                    message: format!("unexpected parquet column writer for column {col_idx}"),
                });
            }
        }
        col.close()?;
        col_idx += 1;
    }
    rg.close()?;
    writer.close()?;
    Ok(())
}
