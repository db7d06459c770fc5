//! Uploaded files (raw bytes plus a declared name) as table sources.

use serde::{Deserialize, Serialize};

use crate::error::{TableIoError, TableIoResult};
use crate::format::{self, FormatVariant};
use crate::input::{self, InputSource};

/// An uploaded file, as delivered by a file picker: `{"name": ..., "data": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    /// Declared file name; its extension selects the format.
    pub name: String,
    /// File contents.
    pub data: Vec<u8>,
}

impl Upload {
    /// Create an upload descriptor.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Turn an upload into a source a backend can read, resolving the format from its name.
///
/// Fails with [`TableIoError::EmptyInput`] if the upload has no bytes, before the name is
/// looked at.
pub fn from_upload(upload: Upload) -> TableIoResult<(String, InputSource)> {
    ensure_not_empty(&upload)?;
    let format = format::lookup(&upload.name)?;
    from_upload_as(upload, format)
}

/// [`from_upload`] with the format chosen by the caller.
pub fn from_upload_as(upload: Upload, format: FormatVariant) -> TableIoResult<(String, InputSource)> {
    ensure_not_empty(&upload)?;
    let Upload { name, data } = upload;
    let source = input::prepare(format, data, &name)?;
    Ok((name, source))
}

fn ensure_not_empty(upload: &Upload) -> TableIoResult<()> {
    if upload.data.is_empty() {
        return Err(TableIoError::EmptyInput {
            name: upload.name.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_upload_is_rejected_before_lookup() {
        let err = from_upload(Upload::new("f.unknown", Vec::new())).unwrap_err();
        assert!(matches!(err, TableIoError::EmptyInput { .. }));
    }

    #[test]
    fn deserializes_from_name_and_data_mapping() {
        let upload: Upload = serde_json::from_str(r#"{"name":"f.csv","data":[97,10,49,10]}"#).unwrap();
        let (name, source) = from_upload(upload).unwrap();
        assert_eq!(name, "f.csv");
        assert!(matches!(source, InputSource::Buffer(ref b) if b == b"a\n1\n"));
    }
}
