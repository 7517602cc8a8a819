use log::{info, warn};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::chunker::{Chunk, Chunker, SourceDocument};
use crate::error::{RetrievalError, Result};

const SUPPORTED_EXTENSIONS: [&str; 1] = ["txt"];

/// Reads a supported document into memory.
///
/// Only UTF-8 `.txt` files are accepted; anything else is `UnsupportedFormat`.
pub fn load_file(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(RetrievalError::UnsupportedFormat(format!(
            "unsupported file type '.{}' for '{}'",
            extension,
            path.display()
        )));
    }

    let bytes = fs::read(path)?;
    String::from_utf8(bytes).map_err(|e| {
        RetrievalError::UnsupportedFormat(format!(
            "'{}' is not valid UTF-8: {}",
            path.display(),
            e.utf8_error()
        ))
    })
}

/// Walks `directory` and chunks every supported document in it.
///
/// Per-file failures are logged and skipped; the batch always continues.
pub fn process_directory(directory: &Path, chunker: &Chunker) -> Result<Vec<Chunk>> {
    if !directory.is_dir() {
        return Err(RetrievalError::DirectoryNotFound(directory.to_path_buf()));
    }

    info!("Processing documents in: {}", directory.display());

    let mut chunks = Vec::new();
    let mut processed_files = 0;

    for entry in WalkDir::new(directory)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        info!("Processing: {}", file_name);

        let text = match load_file(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping {}: {}", file_name, e);
                continue;
            }
        };

        if text.trim().is_empty() {
            warn!("File is empty: {}", file_name);
            continue;
        }

        let document = SourceDocument {
            text,
            source_id: file_name,
            origin_path: path.to_string_lossy().to_string(),
        };
        let file_chunks = chunker.chunk_document(&document);
        info!("Created {} chunks from {}", file_chunks.len(), document.source_id);

        chunks.extend(file_chunks);
        processed_files += 1;
    }

    info!(
        "Processed {} files, created {} chunks",
        processed_files,
        chunks.len()
    );

    Ok(chunks)
}
