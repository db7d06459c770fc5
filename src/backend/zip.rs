//! Zip archives holding one CSV table.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::backend::csv::{read_csv, write_csv};
use crate::backend::{Backend, FormatHandler, LoadError, Operation};
use crate::dispatch::{ReadOptions, WriteOptions};
use crate::error::{TableIoError, TableIoResult};
use crate::format::{Capability, FormatVariant};
use crate::types::DataSet;

/// Provides [`Capability::Zip`].
#[derive(Debug, Default)]
pub struct ZipBackend;

impl Backend for ZipBackend {
    fn capability(&self) -> Capability {
        Capability::Zip
    }

    fn load(&self) -> Result<Vec<Arc<dyn FormatHandler>>, LoadError> {
        Ok(vec![Arc::new(ZipHandler)])
    }
}

/// Handler for [`FormatVariant::Zipped`]. Reads from paths only.
#[derive(Debug, Default)]
pub struct ZipHandler;

impl FormatHandler for ZipHandler {
    fn formats(&self) -> &[FormatVariant] {
        &[FormatVariant::Zipped]
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(operation, Operation::ReadPath | Operation::Write)
    }

    fn read_path(&self, _format: FormatVariant, path: &Path, options: &ReadOptions) -> TableIoResult<DataSet> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let entry = match options.zip_entry.as_deref() {
            Some(name) => name.to_string(),
            None => single_csv_entry(&archive)?,
        };

        let mut bytes = Vec::new();
        archive.by_name(&entry)?.read_to_end(&mut bytes)?;
        read_csv(bytes.as_slice(), options.schema.as_ref())
    }

    fn write_path(
        &self,
        _format: FormatVariant,
        path: &Path,
        table: &DataSet,
        options: &WriteOptions,
    ) -> TableIoResult<()> {
        let entry = match options.zip_entry.as_deref() {
            Some(name) => name.to_string(),
            None => default_entry_name(path),
        };
        write_zip(File::create(path)?, &entry, table)
    }
}

/// The only `.csv` entry of the archive.
fn single_csv_entry<R: Read + std::io::Seek>(archive: &ZipArchive<R>) -> TableIoResult<String> {
    let candidates: Vec<&str> = archive
        .file_names()
        .filter(|n| !n.ends_with('/') && n.to_ascii_lowercase().ends_with(".csv"))
        .collect();
    match candidates.as_slice() {
        [only] => Ok((*only).to_string()),
        [] => Err(TableIoError::InvalidOptions {
            message: "zip archive has no .csv entry".to_string(),
        }),
        many => Err(TableIoError::InvalidOptions {
            message: format!(
                "zip archive has {} .csv entries ({}); set `zip_entry` to pick one",
                many.len(),
                many.join(", ")
            ),
        }),
    }
}

fn default_entry_name(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("table");
    format!("{stem}.csv")
}

/// Write `table` as a deflated CSV entry named `entry`.
pub fn write_zip<W: Write + std::io::Seek>(output: W, entry: &str, table: &DataSet) -> TableIoResult<()> {
    let mut csv_bytes = Vec::new();
    write_csv(&mut csv_bytes, table)?;

    let mut zip = ZipWriter::new(output);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry, options)?;
    zip.write_all(&csv_bytes)?;
    zip.finish()?;
    Ok(())
}
