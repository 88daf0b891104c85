use super::{ParsedDocument, Parser, Section};
use crate::error::Result;
use pulldown_cmark::{Event, Parser as CmarkParser, Tag, TagEnd};

/// Markdown parser. Markup is stripped to plain text and each heading starts a
/// new section.
pub struct MarkdownParser;

struct SectionBuilder {
    header: String,
    body: String,
}

impl SectionBuilder {
    fn new(header: String) -> Self {
        Self { header, body: String::new() }
    }

    fn finish(self, sections: &mut Vec<Section>) {
        let body = self.body.trim();
        if body.is_empty() {
            return;
        }
        // Headings stay in the text so each chunk carries its topic.
        let content = if self.header.is_empty() {
            body.to_string()
        } else {
            format!("{}\n{}", self.header, body)
        };
        sections.push(Section {
            header: self.header,
            content,
        });
    }
}

impl Parser for MarkdownParser {
    fn can_parse(&self, extension: &str) -> bool {
        extension == "md" || extension == "markdown"
    }

    fn parse(&self, content: &str, _path: &str) -> Result<ParsedDocument> {
        let body = strip_frontmatter(content);

        let mut sections = Vec::new();
        let mut current = SectionBuilder::new(String::new());
        let mut heading: Option<String> = None;

        for event in CmarkParser::new(body) {
            match event {
                Event::Start(Tag::Heading { .. }) => {
                    heading = Some(String::new());
                }
                Event::End(TagEnd::Heading(_)) => {
                    let header = heading.take().unwrap_or_default().trim().to_string();
                    let previous = std::mem::replace(&mut current, SectionBuilder::new(header));
                    previous.finish(&mut sections);
                }
                Event::Text(text) | Event::Code(text) => match heading.as_mut() {
                    Some(h) => h.push_str(&text),
                    None => current.body.push_str(&text),
                },
                Event::SoftBreak => match heading.as_mut() {
                    Some(h) => h.push(' '),
                    None => current.body.push(' '),
                },
                Event::HardBreak
                | Event::End(TagEnd::Paragraph)
                | Event::End(TagEnd::Item)
                | Event::End(TagEnd::CodeBlock) => current.body.push('\n'),
                _ => {}
            }
        }
        current.finish(&mut sections);

        let plain = sections
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ParsedDocument {
            content: plain,
            sections,
            doc_type: "markdown".to_string(),
        })
    }
}

/// Drop a leading `---` YAML block.
fn strip_frontmatter(content: &str) -> &str {
    content
        .strip_prefix("---\n")
        .and_then(|rest| rest.find("\n---\n").map(|end| &rest[end + 5..]))
        .unwrap_or(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_parser_can_parse() {
        let parser = MarkdownParser;
        assert!(parser.can_parse("md"));
        assert!(!parser.can_parse("txt"));
    }

    #[test]
    fn test_sections_follow_headings() {
        let content = r#"
Intro paragraph.

# Title

This is **bold** content with `code`.

## Subsection

- first item
- second item
"#;

        let doc = MarkdownParser.parse(content, "test.md").unwrap();
        assert_eq!(doc.doc_type, "markdown");
        assert_eq!(doc.sections.len(), 3);

        assert_eq!(doc.sections[0].header, "");
        assert_eq!(doc.sections[0].content, "Intro paragraph.");

        let title = &doc.sections[1];
        assert_eq!(title.header, "Title");
        assert_eq!(title.content, "Title\nThis is bold content with code.");

        let sub = &doc.sections[2];
        assert!(sub.content.contains("first item"));
        assert!(sub.content.contains("second item"));
        assert!(!doc.content.contains("**"));
    }

    #[test]
    fn test_frontmatter_is_dropped() {
        let content = "---\ntitle: Notes\n---\n# Heading\n\nBody text.\n";
        let doc = MarkdownParser.parse(content, "notes.md").unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert!(!doc.content.contains("title: Notes"));
    }

    #[test]
    fn test_empty_headings_produce_no_sections() {
        let doc = MarkdownParser.parse("# One\n## Two\n", "empty.md").unwrap();
        assert!(doc.sections.is_empty());
        assert!(doc.content.is_empty());
    }
}
