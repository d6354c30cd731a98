//! ZIP bundles of per-record artifacts, and their entry names.

use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::{EtiquetteError, Result};

fn archive_err(e: impl std::fmt::Display) -> EtiquetteError {
    EtiquetteError::Archive(e.to_string())
}

/// Replace every non-alphanumeric character with `_` and keep at most
/// `max_len` characters.
pub fn sanitize_field(value: &str, max_len: usize) -> String {
    value
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(max_len)
        .collect()
}

/// Deterministic entry name: `{prefix}_{index:04}[_{field}...].{ext}`.
///
/// Empty fields are left out.
pub fn entry_name(prefix: &str, index: usize, fields: &[&str], max_len: usize, ext: &str) -> String {
    let mut name = format!("{}_{:04}", sanitize_field(prefix, usize::MAX), index);
    for field in fields {
        let field = sanitize_field(field, max_len);
        if !field.is_empty() {
            name.push('_');
            name.push_str(&field);
        }
    }
    name.push('.');
    name.push_str(ext);
    name
}

/// Bundle `(name, bytes)` entries into a deflated ZIP, in the given order.
pub fn build_archive(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options).map_err(archive_err)?;
        zip.write_all(bytes)?;
    }

    let cursor = zip.finish().map_err(archive_err)?;
    Ok(cursor.into_inner())
}
