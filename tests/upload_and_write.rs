use serde_json::json;

use table_io::types::{DataSet, DataType, Field, Schema, Value};
use table_io::{read_table, write_table, Dispatcher, ReadOptions, TableIoError, Upload, WriteOptions};

fn sample() -> DataSet {
    DataSet::new(
        Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("name", DataType::Utf8),
            Field::new("score", DataType::Float64),
        ]),
        vec![
            vec![Value::Int64(1), Value::Utf8("Ada".to_string()), Value::Float64(98.5)],
            vec![Value::Int64(2), Value::Utf8("Grace".to_string()), Value::Null],
        ],
    )
}

#[test]
fn empty_upload_is_rejected() {
    let err = read_table(Upload::new("x.parquet", Vec::new()), &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, TableIoError::EmptyInput { ref name } if name == "x.parquet"));

    // Emptiness is checked before the extension.
    let err = read_table(Upload::new("x.unknown", Vec::new()), &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, TableIoError::EmptyInput { .. }));
}

#[test]
fn upload_with_unknown_extension_is_rejected() {
    let err = read_table(Upload::new("notes.txt", b"hello".to_vec()), &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, TableIoError::UnknownFormat { .. }));
}

#[test]
fn upload_deserializes_from_picker_json() {
    let upload: Upload = serde_json::from_value(json!({"name": "t.csv", "data": [97, 10, 49, 10]})).unwrap();
    let ds = read_table(upload, &ReadOptions::default()).unwrap();
    assert_eq!(ds.column("a").unwrap(), vec![Value::Int64(1)]);
}

#[cfg(feature = "parquet")]
#[test]
fn parquet_upload_is_spooled_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.parquet");
    write_table(&path, &sample(), &WriteOptions::default()).unwrap();

    // The declared name carries directories; only the file name is used for the spool file.
    let upload = Upload::new("../../uploads/report.parquet", std::fs::read(&path).unwrap());
    let ds = read_table(upload, &ReadOptions::default()).unwrap();
    assert_eq!(ds, sample());
}

#[test]
fn non_tabular_value_fails_before_touching_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");

    let err = write_table(&out, &json!(42), &WriteOptions::default()).unwrap_err();
    assert!(matches!(err, TableIoError::InvalidTable { .. }));
    assert!(!out.exists());

    let err = write_table(&out, &json!([1, 2, 3]), &WriteOptions::default()).unwrap_err();
    assert!(matches!(err, TableIoError::InvalidTable { .. }));
    assert!(!out.exists());
}

#[test]
fn ragged_dataset_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");
    let mut ds = sample();
    ds.rows[1].pop();

    let err = write_table(&out, &ds, &WriteOptions::default()).unwrap_err();
    assert!(matches!(err, TableIoError::InvalidTable { .. }));
    assert!(!out.exists());
}

#[test]
fn json_rows_are_written_as_a_table() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("from_json.csv");
    let rows = json!([
        {"id": 1, "name": "Ada"},
        {"id": 2, "name": "Grace", "score": 1.5}
    ]);

    write_table(&out, &rows, &WriteOptions::default()).unwrap();
    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "id,name,score\n1,Ada,\n2,Grace,1.5\n"
    );
}

#[test]
fn write_with_unknown_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.bin");
    let err = Dispatcher::new().write_table(&out, &sample(), &WriteOptions::default()).unwrap_err();
    assert!(matches!(err, TableIoError::UnknownFormat { .. }));
    assert!(!out.exists());
}

#[test]
fn json_files_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("people.json");
    write_table(&out, &sample(), &WriteOptions::default()).unwrap();

    let back = read_table(&out, &ReadOptions::default()).unwrap();
    assert_eq!(back, sample());
}

#[test]
fn json_fixture_supports_nested_paths() {
    let opts = ReadOptions {
        schema: Some(Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("team.name", DataType::Utf8),
        ])),
        ..Default::default()
    };
    let ds = read_table("tests/fixtures/people.json", &opts).unwrap();
    assert_eq!(
        ds.column("team.name").unwrap(),
        vec![Value::Utf8("engines".to_string()), Value::Utf8("compilers".to_string())]
    );
}
