//! Keyword-based intent detection for the built-in tools.
//!
//! Both predicates are deliberately loose substring tests. A question such as
//! "call 555-0100" looks like arithmetic here; the calculator then fails on the
//! extracted expression and routing simply moves on.

use crate::config::RouterConfig;

/// Phrases that mark a question as asking for today's date.
pub const DEFAULT_DATE_PHRASES: &[&str] = &[
    "today's date",
    "todays date",
    "current date",
    "what date is it",
    "what is the date",
    "today date",
    "current day",
    "what day is it",
];

/// Operator symbols and words that, together with a digit, mark a math question.
pub const DEFAULT_MATH_OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "^", "plus", "minus", "times", "divide", "multiplied",
];

/// Lookup tables driving intent detection.
#[derive(Debug, Clone)]
pub struct IntentTables {
    date_phrases: Vec<String>,
    math_operators: Vec<String>,
}

impl Default for IntentTables {
    fn default() -> Self {
        Self::new(
            DEFAULT_DATE_PHRASES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_MATH_OPERATORS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl IntentTables {
    /// Build tables from explicit lists. Entries are matched case-insensitively.
    pub fn new(date_phrases: Vec<String>, math_operators: Vec<String>) -> Self {
        Self {
            date_phrases: date_phrases.into_iter().map(|p| p.to_lowercase()).collect(),
            math_operators: math_operators.into_iter().map(|o| o.to_lowercase()).collect(),
        }
    }

    /// Built-in tables with any lists configured under `[router]` swapped in.
    pub fn from_config(config: &RouterConfig) -> Self {
        let defaults = Self::default();
        Self::new(
            config.date_phrases.clone().unwrap_or(defaults.date_phrases),
            config.math_operators.clone().unwrap_or(defaults.math_operators),
        )
    }

    /// True if the question contains any date-intent phrase.
    pub fn is_date_question(&self, question: &str) -> bool {
        let q = question.trim().to_lowercase();
        self.date_phrases.iter().any(|phrase| q.contains(phrase.as_str()))
    }

    /// True if the question contains a digit and an operator token.
    pub fn is_math_question(&self, question: &str) -> bool {
        let q = question.trim().to_lowercase();
        let has_digit = q.chars().any(|c| c.is_ascii_digit());
        let has_op = self.math_operators.iter().any(|op| q.contains(op.as_str()));
        has_digit && has_op
    }
}
