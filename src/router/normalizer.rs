//! Turns a question into a title-like topic for encyclopedia lookup.

/// Topic used whenever the question is about the sitting US president.
const US_PRESIDENT_TOPIC: &str = "Current President of the United States";

/// Interrogative prefixes in priority order, with the suffix appended to the remainder.
const PREFIXES: &[(&str, &str)] = &[
    ("who is", ""),
    ("who was", ""),
    ("who founded", " founders"),
    ("what is", ""),
    ("what are", ""),
    ("when was", ""),
    ("where is", ""),
];

/// Normalize a question into an encyclopedia topic.
///
/// Matching is done on the lowercased question with trailing `?`, `!` and `.`
/// removed, so a stripped topic comes back lowercased. A question with no
/// recognized prefix is returned trimmed but otherwise unchanged, which makes
/// normalizing a topic a no-op.
pub fn normalize(question: &str) -> String {
    let q = question
        .trim()
        .trim_end_matches(['?', '!', '.'])
        .trim_end()
        .to_lowercase();

    if q.contains("president of usa") || q.contains("president of the united states") {
        return US_PRESIDENT_TOPIC.to_string();
    }

    for (prefix, suffix) in PREFIXES {
        if let Some(rest) = strip_word_prefix(&q, prefix) {
            return format!("{}{}", rest.trim(), suffix);
        }
    }

    question.trim().to_string()
}

/// Strip `prefix` only when it ends on a word boundary.
fn strip_word_prefix<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}
