pub mod csv;
pub mod markdown;
pub mod plaintext;

use crate::error::{AskragError, Result};

/// A parsed document with sections
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub content: String,
    pub sections: Vec<Section>,
    pub doc_type: String,
}

/// A section within a document. CSV rows and markdown headings each become one.
#[derive(Debug, Clone)]
pub struct Section {
    pub header: String,
    pub content: String,
}

/// Trait for document parsers
pub trait Parser: Send + Sync {
    /// Check if this parser can handle the given file extension
    fn can_parse(&self, extension: &str) -> bool;

    /// Parse document content into structured sections
    fn parse(&self, content: &str, path: &str) -> Result<ParsedDocument>;
}

/// Parser registry that selects a parser by extension.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        let mut registry = Self { parsers: Vec::new() };

        registry.register(Box::new(plaintext::PlainTextParser));
        registry.register(Box::new(markdown::MarkdownParser));
        registry.register(Box::new(csv::CsvParser));

        registry
    }

    pub fn register(&mut self, parser: Box<dyn Parser>) {
        self.parsers.push(parser);
    }

    pub fn find_parser(&self, extension: &str) -> Option<&dyn Parser> {
        let extension = extension.to_ascii_lowercase();
        self.parsers
            .iter()
            .find(|p| p.can_parse(&extension))
            .map(|p| p.as_ref())
    }

    /// Parse content using the parser registered for `extension`.
    ///
    /// Unknown extensions are an `UnsupportedDocumentType` error. A parser
    /// that fails on malformed input falls back to plain text.
    pub fn parse(&self, content: &str, path: &str, extension: &str) -> Result<ParsedDocument> {
        let parser = self
            .find_parser(extension)
            .ok_or_else(|| unsupported(path, extension))?;

        match parser.parse(content, path) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                log::warn!("Parser failed for {}, falling back to plain text: {}", path, e);
                plaintext::PlainTextParser.parse(content, path)
            }
        }
    }

    /// Whether some registered parser accepts `extension`.
    pub fn supports(&self, extension: &str) -> bool {
        self.find_parser(extension).is_some()
    }

    /// `UnsupportedDocumentType` unless some parser accepts `extension`.
    pub fn check_supported(&self, path: &str, extension: &str) -> Result<()> {
        if self.supports(extension) {
            Ok(())
        } else {
            Err(unsupported(path, extension))
        }
    }
}

fn unsupported(path: &str, extension: &str) -> AskragError {
    AskragError::UnsupportedDocumentType(if extension.is_empty() {
        format!("{} has no file extension", path)
    } else {
        format!(".{} ({})", extension, path)
    })
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
