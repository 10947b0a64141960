//! Deterministic zip archiving of a source tree.
//!
//! Entries are written in sorted path order with a fixed modification time,
//! so identical trees always produce byte-identical archives. That keeps the
//! artifact keyed by fingerprint genuinely immutable: the same key always
//! holds the same bytes.

use std::fs;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PipelineError, Result};
use crate::fingerprint::SourceTree;

/// Build the source artifact for a tree as an in-memory zip.
pub fn write_archive(tree: &SourceTree) -> Result<Vec<u8>> {
    let io_err = |path: &std::path::Path, detail: String| PipelineError::Io {
        path: path.display().to_string(),
        detail,
    };

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for rel in tree.files() {
        let abs = tree.root().join(rel);
        let bytes = fs::read(&abs).map_err(|e| io_err(&abs, e.to_string()))?;

        // Zip entry names use forward slashes regardless of platform.
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        writer
            .start_file(name, options)
            .map_err(|e| io_err(&abs, e.to_string()))?;
        writer
            .write_all(&bytes)
            .map_err(|e| io_err(&abs, e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| io_err(tree.root(), e.to_string()))?;
    Ok(cursor.into_inner())
}
