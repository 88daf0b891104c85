use super::{ParsedDocument, Parser, Section};
use crate::error::Result;

/// Plain text parser. The whole file is one section.
///
/// Also the fallback when a structured parser rejects its input.
pub struct PlainTextParser;

impl Parser for PlainTextParser {
    fn can_parse(&self, extension: &str) -> bool {
        extension == "txt"
    }

    fn parse(&self, content: &str, _path: &str) -> Result<ParsedDocument> {
        Ok(ParsedDocument {
            content: content.to_string(),
            sections: vec![Section {
                header: "content".to_string(),
                content: content.to_string(),
            }],
            doc_type: "plaintext".to_string(),
        })
    }
}
