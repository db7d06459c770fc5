use std::fs;

use table_io::types::{DataSet, DataType, Field, Schema, Value};
use table_io::{read_table, write_table, ReadOptions, Upload, WriteOptions};

fn people_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64),
        Field::new("name", DataType::Utf8),
        Field::new("score", DataType::Float64),
        Field::new("active", DataType::Bool),
    ])
}

#[test]
fn read_csv_infers_integer_columns() {
    let ds = read_table("tests/fixtures/fixture.csv", &ReadOptions::default()).unwrap();

    assert_eq!(ds.schema.field_names().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(ds.column("a").unwrap(), vec![Value::Int64(1), Value::Int64(3)]);
    assert_eq!(ds.column("b").unwrap(), vec![Value::Int64(2), Value::Int64(4)]);
}

#[test]
fn csv_round_trip_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("copy.csv");

    let ds = read_table("tests/fixtures/fixture.csv", &ReadOptions::default()).unwrap();
    write_table(&out, &ds, &WriteOptions::default()).unwrap();

    assert_eq!(fs::read(&out).unwrap(), fs::read("tests/fixtures/fixture.csv").unwrap());
}

#[test]
fn column_mapping_writes_the_fixture_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");

    write_table(&out, &serde_json::json!({"a": [1, 3], "b": [2, 4]}), &WriteOptions::default()).unwrap();

    assert_eq!(fs::read(&out).unwrap(), fs::read("tests/fixtures/fixture.csv").unwrap());
}

#[test]
fn read_csv_with_schema_and_nulls() {
    let opts = ReadOptions {
        schema: Some(people_schema()),
        ..Default::default()
    };
    let ds = read_table("tests/fixtures/people.csv", &opts).unwrap();

    assert_eq!(ds.row_count(), 2);
    assert_eq!(
        ds.rows[0],
        vec![
            Value::Int64(1),
            Value::Utf8("Ada".to_string()),
            Value::Float64(98.5),
            Value::Bool(true),
        ]
    );
    assert_eq!(ds.rows[1][2], Value::Null);
}

#[test]
fn extension_lookup_ignores_case() {
    let dir = tempfile::tempdir().unwrap();
    let upper = dir.path().join("DATA.CSV");
    fs::copy("tests/fixtures/fixture.csv", &upper).unwrap();

    let a = read_table(&upper, &ReadOptions::default()).unwrap();
    let b = read_table("tests/fixtures/fixture.csv", &ReadOptions::default()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn csv_upload_is_read_from_memory() {
    let upload = Upload::new("inline.csv", fs::read("tests/fixtures/fixture.csv").unwrap());
    let ds = read_table(upload, &ReadOptions::default()).unwrap();
    assert_eq!(ds.row_count(), 2);
    assert_eq!(ds.rows[1], vec![Value::Int64(3), Value::Int64(4)]);
}

#[test]
fn missing_schema_column_is_a_schema_mismatch() {
    let opts = ReadOptions {
        schema: Some(Schema::new(vec![Field::new("c", DataType::Int64)])),
        ..Default::default()
    };
    let err = read_table("tests/fixtures/fixture.csv", &opts).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("schema mismatch"));
    assert!(msg.contains("missing required column 'c'"));
}

#[test]
fn unparsable_value_reports_row_and_column() {
    let upload = Upload::new("bad.csv", "id\n1\nnot_an_int\n");
    let opts = ReadOptions {
        schema: Some(Schema::new(vec![Field::new("id", DataType::Int64)])),
        ..Default::default()
    };
    let err = read_table(upload, &opts).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("failed to parse value at row 3"));
    assert!(msg.contains("column 'id'"));
}

#[test]
fn text_columns_survive_a_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("text.csv");
    let ds = DataSet::new(
        Schema::new(vec![
            Field::new("zip", DataType::Utf8),
            Field::new("label", DataType::Utf8),
            Field::new("flag", DataType::Utf8),
        ]),
        vec![
            vec![
                Value::Utf8("02139".to_string()),
                Value::Utf8(" padded ".to_string()),
                Value::Utf8("TRUE".to_string()),
            ],
            vec![
                Value::Utf8("10001".to_string()),
                Value::Utf8("plain".to_string()),
                Value::Utf8("no".to_string()),
            ],
        ],
    );

    write_table(&out, &ds, &WriteOptions::default()).unwrap();
    assert_eq!(read_table(&out, &ReadOptions::default()).unwrap(), ds);
}

#[test]
fn typed_columns_survive_a_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("typed.csv");
    let ds = DataSet::new(
        Schema::new(vec![
            Field::new("n", DataType::Int64),
            Field::new("x", DataType::Float64),
            Field::new("ok", DataType::Bool),
        ]),
        vec![
            vec![Value::Int64(-7), Value::Float64(1.0), Value::Bool(true)],
            vec![Value::Null, Value::Float64(0.1), Value::Null],
        ],
    );

    write_table(&out, &ds, &WriteOptions::default()).unwrap();
    assert_eq!(read_table(&out, &ReadOptions::default()).unwrap(), ds);
}

#[test]
fn empty_text_cell_reads_back_as_null() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("blank.csv");
    let ds = DataSet::new(
        Schema::new(vec![Field::new("s", DataType::Utf8)]),
        vec![vec![Value::Utf8("x".to_string())], vec![Value::Utf8(String::new())]],
    );

    write_table(&out, &ds, &WriteOptions::default()).unwrap();
    let back = read_table(&out, &ReadOptions::default()).unwrap();
    assert_eq!(back.rows, vec![vec![Value::Utf8("x".to_string())], vec![Value::Null]]);
}

#[test]
fn zero_row_columns_read_back_as_text() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("empty.csv");
    let ds = DataSet::new(Schema::new(vec![Field::new("n", DataType::Int64)]), Vec::new());

    write_table(&out, &ds, &WriteOptions::default()).unwrap();
    let back = read_table(&out, &ReadOptions::default()).unwrap();
    assert_eq!(back.schema.fields, vec![Field::new("n", DataType::Utf8)]);
    assert_eq!(back.row_count(), 0);

    let typed = ReadOptions {
        schema: Some(ds.schema.clone()),
        ..Default::default()
    };
    assert_eq!(read_table(&out, &typed).unwrap(), ds);
}
