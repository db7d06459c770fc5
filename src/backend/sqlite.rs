//! SQLite database files.
//!
//! Reading selects every row of `ReadOptions::table`. Writing drops and recreates
//! `WriteOptions::table` inside one transaction. Booleans are stored as `0`/`1` integers and
//! come back as `Int64`.

use std::path::Path;
use std::sync::Arc;

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags};

use crate::backend::{Backend, FormatHandler, LoadError, Operation};
use crate::dispatch::{ReadOptions, WriteOptions};
use crate::error::{TableIoError, TableIoResult};
use crate::format::{Capability, FormatVariant};
use crate::sql::{select_all, validate_identifier, SqlConnection};
use crate::types::{coerce_value, unify_value_types, DataSet, DataType, Field, Schema, Value};

/// Provides [`Capability::Sqlite`].
#[derive(Debug, Default)]
pub struct SqliteBackend;

impl Backend for SqliteBackend {
    fn capability(&self) -> Capability {
        Capability::Sqlite
    }

    fn load(&self) -> Result<Vec<Arc<dyn FormatHandler>>, LoadError> {
        Ok(vec![Arc::new(SqliteHandler)])
    }
}

/// Handler for [`FormatVariant::RelationalDb`]. Reads from paths only.
#[derive(Debug, Default)]
pub struct SqliteHandler;

impl FormatHandler for SqliteHandler {
    fn formats(&self) -> &[FormatVariant] {
        &[FormatVariant::RelationalDb]
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(operation, Operation::ReadPath | Operation::Write)
    }

    fn read_path(&self, _format: FormatVariant, path: &Path, options: &ReadOptions) -> TableIoResult<DataSet> {
        let table = required_table(options.table.as_deref())?;
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let ds = conn.query_table(&select_all(table))?;
        match options.schema.as_ref() {
            Some(schema) => project(ds, schema),
            None => Ok(ds),
        }
    }

    fn write_path(
        &self,
        _format: FormatVariant,
        path: &Path,
        table: &DataSet,
        options: &WriteOptions,
    ) -> TableIoResult<()> {
        let name = required_table(options.table.as_deref())?;
        let mut conn = Connection::open(path)?;
        write_sqlite_table(&mut conn, name, table)
    }
}

fn required_table(table: Option<&str>) -> TableIoResult<&str> {
    let table = table.ok_or_else(|| TableIoError::InvalidOptions {
        message: "database formats need a table name (set `table` in the options)".to_string(),
    })?;
    validate_identifier(table)
}

impl SqlConnection for Connection {
    fn query_table(&self, query: &str) -> TableIoResult<DataSet> {
        let mut stmt = self.prepare(query)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = names.len();

        let mut raw_rows: Vec<Vec<Value>> = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut out = Vec::with_capacity(width);
            for idx in 0..width {
                out.push(match row.get_ref(idx)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(i) => Value::Int64(i),
                    ValueRef::Real(f) => Value::Float64(f),
                    ValueRef::Text(t) => Value::Utf8(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(b) => {
                        return Err(TableIoError::SchemaMismatch {
                            message: format!(
                                "column '{}' holds a {}-byte blob; blobs are not supported",
                                names[idx],
                                b.len()
                            ),
                        });
                    }
                });
            }
            raw_rows.push(out);
        }

        // SQLite columns are dynamically typed; settle on one type per column.
        let types: Vec<DataType> = (0..width)
            .map(|idx| unify_value_types(raw_rows.iter().map(|r| &r[idx])))
            .collect();
        let rows = raw_rows
            .into_iter()
            .map(|row| row.into_iter().zip(&types).map(|(v, &t)| coerce_value(v, t)).collect())
            .collect();
        let fields = names.into_iter().zip(types).map(|(n, t)| Field::new(n, t)).collect();

        Ok(DataSet::new(Schema::new(fields), rows))
    }
}

/// Select and type-check the schema's columns from a query result.
fn project(ds: DataSet, schema: &Schema) -> TableIoResult<DataSet> {
    let mut idxs = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        let idx = ds.schema.index_of(&field.name).ok_or_else(|| TableIoError::SchemaMismatch {
            message: format!("missing required column '{}'", field.name),
        })?;
        idxs.push(idx);
    }

    let mut rows = Vec::with_capacity(ds.rows.len());
    for (idx0, row) in ds.rows.into_iter().enumerate() {
        let mut out = Vec::with_capacity(idxs.len());
        for (field, &idx) in schema.fields.iter().zip(&idxs) {
            let v = coerce_value(row[idx].clone(), field.data_type);
            match v.data_type() {
                Some(t) if t != field.data_type => {
                    return Err(TableIoError::ParseError {
                        row: idx0 + 1,
                        column: field.name.clone(),
                        raw: v.to_text(),
                        message: format!("expected {:?}", field.data_type),
                    });
                }
                _ => out.push(v),
            }
        }
        rows.push(out);
    }
    Ok(DataSet::new(schema.clone(), rows))
}

/// Replace table `name` in `conn` with the contents of `table`.
pub fn write_sqlite_table(conn: &mut Connection, name: &str, table: &DataSet) -> TableIoResult<()> {
    let name = validate_identifier(name)?;
    let columns: Vec<String> = table
        .schema
        .fields
        .iter()
        .map(|f| format!("\"{}\" {}", f.name.replace('"', "\"\""), sql_type(f.data_type)))
        .collect();
    let placeholders = vec!["?"; table.schema.fields.len()].join(", ");

    let tx = conn.transaction()?;
    tx.execute(&format!("DROP TABLE IF EXISTS \"{name}\""), [])?;
    tx.execute(&format!("CREATE TABLE \"{name}\" ({})", columns.join(", ")), [])?;
    {
        let mut insert = tx.prepare(&format!("INSERT INTO \"{name}\" VALUES ({placeholders})"))?;
        for row in &table.rows {
            insert.execute(params_from_iter(row.iter().map(to_sql_value)))?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn sql_type(t: DataType) -> &'static str {
    match t {
        DataType::Int64 | DataType::Bool => "INTEGER",
        DataType::Float64 => "REAL",
        DataType::Utf8 => "TEXT",
    }
}

fn to_sql_value(v: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match v {
        Value::Null => Sql::Null,
        Value::Int64(i) => Sql::Integer(*i),
        Value::Float64(f) => Sql::Real(*f),
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Utf8(s) => Sql::Text(s.clone()),
    }
}
