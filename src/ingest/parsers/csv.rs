use super::{ParsedDocument, Parser, Section};
use crate::error::{AskragError, Result};

/// CSV parser. The first record is the header; every following record becomes
/// one section rendered as `header: value` lines.
pub struct CsvParser;

impl Parser for CsvParser {
    fn can_parse(&self, extension: &str) -> bool {
        extension == "csv"
    }

    fn parse(&self, content: &str, _path: &str) -> Result<ParsedDocument> {
        let mut records = parse_records(content)?.into_iter();
        let headers = records.next().unwrap_or_default();

        let sections: Vec<Section> = records
            .enumerate()
            .map(|(row, fields)| Section {
                header: format!("row {}", row + 1),
                content: render_row(&headers, &fields),
            })
            .collect();

        let content = sections
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ParsedDocument {
            content,
            sections,
            doc_type: "csv".to_string(),
        })
    }
}

fn render_row(headers: &[String], fields: &[String]) -> String {
    fields
        .iter()
        .enumerate()
        .map(|(i, value)| match headers.get(i) {
            Some(header) => format!("{}: {}", header.trim(), value.trim()),
            None => value.trim().to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split CSV text into records. Supports quoted fields with embedded commas,
/// newlines and doubled quotes. Blank lines are skipped.
fn parse_records(content: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(AskragError::Parse("unterminated quoted field".to_string()));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }

    Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    if record.iter().all(|f| f.trim().is_empty()) {
        return;
    }
    records.push(record);
}
