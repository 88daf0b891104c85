//! Document loading and chunking.
//!
//! Supported inputs are plain text (`.txt`), markdown (`.md`) and CSV
//! (`.csv`, one section per row). Anything else is rejected with
//! `UnsupportedDocumentType`.

pub mod chunker;
pub mod parsers;

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::config::PerformanceConfig;
use crate::error::{AskragError, Result};

pub use chunker::{chunk_document, chunk_text, estimate_tokens, Chunk};
pub use parsers::{ParsedDocument, ParserRegistry, Section};

/// A loaded document plus the hash of the bytes it came from.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub filename: String,
    pub parsed: ParsedDocument,
    pub source_hash: String,
}

/// Lowercased extension of `path`, or an empty string.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Load and parse the file at `path`.
pub fn load_document(path: &Path, registry: &ParserRegistry) -> Result<LoadedDocument> {
    let extension = file_extension(path);
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    registry.check_supported(&filename, &extension)?;

    let bytes = std::fs::read(path)?;
    let source_hash = content_hash(&bytes);
    let content = String::from_utf8(bytes).map_err(|_| {
        AskragError::Parse(format!("{} is not valid UTF-8 text", filename))
    })?;

    let parsed = registry.parse(&content, &filename, &extension)?;
    log::debug!(
        "Loaded {} as {} ({} sections)",
        filename,
        parsed.doc_type,
        parsed.sections.len()
    );

    Ok(LoadedDocument {
        filename,
        parsed,
        source_hash,
    })
}

/// Load `path` and split it into chunks.
pub fn load_and_chunk(
    path: &Path,
    registry: &ParserRegistry,
    config: &PerformanceConfig,
) -> Result<(LoadedDocument, Vec<Chunk>)> {
    let document = load_document(path, registry)?;
    let chunks = chunk_document(&document.parsed, config);
    if chunks.is_empty() {
        return Err(AskragError::InvalidInput(format!(
            "{} contains no text to index",
            document.filename
        )));
    }
    Ok((document, chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config() -> PerformanceConfig {
        PerformanceConfig {
            chunk_size_tokens: 250,
            chunk_overlap_tokens: 25,
        }
    }

    #[test]
    fn test_load_txt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.TXT");
        fs::write(&path, "Paris is the capital of France.").unwrap();

        let (doc, chunks) = load_and_chunk(&path, &ParserRegistry::new(), &config()).unwrap();

        assert_eq!(doc.filename, "notes.TXT");
        assert_eq!(doc.source_hash, content_hash(b"Paris is the capital of France."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Paris is the capital of France.");
    }

    #[test]
    fn test_load_csv_one_chunk_per_row() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cities.csv");
        fs::write(&path, "city,country\nParis,France\nBerlin,Germany\nRome,Italy\n").unwrap();

        let (_, chunks) = load_and_chunk(&path, &ParserRegistry::new(), &config()).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].text, "city: Rome\ncountry: Italy");
    }

    #[test]
    fn test_unsupported_type_rejected_without_reading() {
        let temp_dir = TempDir::new().unwrap();
        // Never created: the extension alone decides.
        let path = temp_dir.path().join("scan.pdf");

        let err = load_document(&path, &ParserRegistry::new()).unwrap_err();
        assert!(matches!(err, AskragError::UnsupportedDocumentType(_)));
    }

    #[test]
    fn test_empty_document_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.txt");
        fs::write(&path, "   \n").unwrap();

        let err = load_and_chunk(&path, &ParserRegistry::new(), &config()).unwrap_err();
        assert!(matches!(err, AskragError::InvalidInput(_)));
    }

    #[test]
    fn test_non_utf8_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("binary.txt");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let err = load_document(&path, &ParserRegistry::new()).unwrap_err();
        assert!(matches!(err, AskragError::Parse(_)));
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
