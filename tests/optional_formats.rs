//! Round trips through the backends behind Cargo features. Run with `--features full`.

#[allow(unused_imports)]
use table_io::types::{DataSet, DataType, Field, Schema, Value};
#[allow(unused_imports)]
use table_io::{read_table, write_table, ReadOptions, TableIoError, Upload, WriteOptions};

#[allow(dead_code)]
fn sample() -> DataSet {
    DataSet::new(
        Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("name", DataType::Utf8),
            Field::new("score", DataType::Float64),
            Field::new("active", DataType::Bool),
        ]),
        vec![
            vec![
                Value::Int64(1),
                Value::Utf8("Ada".to_string()),
                Value::Float64(98.5),
                Value::Bool(true),
            ],
            vec![
                Value::Int64(2),
                Value::Utf8("Grace".to_string()),
                Value::Null,
                Value::Bool(false),
            ],
        ],
    )
}

#[cfg(feature = "excel")]
mod excel {
    use super::*;
    use table_io::SheetSelection;

    #[test]
    fn workbook_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xlsx");
        write_table(&path, &sample(), &WriteOptions::default()).unwrap();

        let back = read_table(&path, &ReadOptions::default()).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn named_sheet_is_written_and_selected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xlsx");
        let wopts = WriteOptions {
            sheet_name: Some("People".to_string()),
            ..Default::default()
        };
        write_table(&path, &sample(), &wopts).unwrap();

        let ropts = ReadOptions {
            sheet: SheetSelection::Sheet("People".to_string()),
            schema: Some(Schema::new(vec![Field::new("name", DataType::Utf8)])),
            ..Default::default()
        };
        let ds = read_table(&path, &ropts).unwrap();
        assert_eq!(
            ds.column("name").unwrap(),
            vec![Value::Utf8("Ada".to_string()), Value::Utf8("Grace".to_string())]
        );

        let missing = ReadOptions {
            sheet: SheetSelection::Sheet("Nope".to_string()),
            ..Default::default()
        };
        assert!(read_table(&path, &missing).is_err());
    }

    #[test]
    fn workbook_upload_is_spooled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xlsx");
        write_table(&path, &sample(), &WriteOptions::default()).unwrap();

        let upload = Upload::new("people.xlsx", std::fs::read(&path).unwrap());
        assert_eq!(read_table(upload, &ReadOptions::default()).unwrap().row_count(), 2);
    }
}

#[cfg(feature = "arrow")]
mod arrow {
    use super::*;

    #[test]
    fn ipc_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.arrow");
        write_table(&path, &sample(), &WriteOptions::default()).unwrap();

        assert_eq!(read_table(&path, &ReadOptions::default()).unwrap(), sample());
    }

    #[test]
    fn ipc_upload_is_read_from_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.arrow");
        write_table(&path, &sample(), &WriteOptions::default()).unwrap();

        let upload = Upload::new("people.arrow", std::fs::read(&path).unwrap());
        let opts = ReadOptions {
            schema: Some(Schema::new(vec![
                Field::new("score", DataType::Float64),
                Field::new("id", DataType::Int64),
            ])),
            ..Default::default()
        };
        let ds = read_table(upload, &opts).unwrap();
        assert_eq!(ds.rows[0], vec![Value::Float64(98.5), Value::Int64(1)]);
        assert_eq!(ds.rows[1], vec![Value::Null, Value::Int64(2)]);
    }

    #[test]
    fn ragged_rows_are_a_schema_mismatch() {
        let mut ds = sample();
        ds.rows[1].pop();

        let mut out = Vec::new();
        let err = table_io::backend::arrow::write_arrow(&mut out, &ds).unwrap_err();
        assert!(matches!(err, TableIoError::SchemaMismatch { .. }));
        assert!(out.is_empty());
    }
}

#[cfg(feature = "zip")]
mod zip {
    use super::*;

    #[test]
    fn zipped_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.zip");
        write_table(&path, &sample(), &WriteOptions::default()).unwrap();

        assert_eq!(read_table(&path, &ReadOptions::default()).unwrap(), sample());
    }

    #[test]
    fn named_entry_is_used_for_both_directions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        let wopts = WriteOptions {
            zip_entry: Some("inner/data.csv".to_string()),
            ..Default::default()
        };
        write_table(&path, &sample(), &wopts).unwrap();

        let ropts = ReadOptions {
            zip_entry: Some("inner/data.csv".to_string()),
            ..Default::default()
        };
        assert_eq!(read_table(&path, &ropts).unwrap().row_count(), 2);

        let wrong = ReadOptions {
            zip_entry: Some("other.csv".to_string()),
            ..Default::default()
        };
        assert!(matches!(read_table(&path, &wrong).unwrap_err(), TableIoError::Zip(_)));
    }
}
