use serde::{Deserialize, Serialize};

use super::evaluation::Evaluation;
use super::trace::Trace;

/// Which source produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    ToolDate,
    ToolMath,
    Document,
    Wikipedia,
    General,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::ToolDate => "tool_date",
            AnswerSource::ToolMath => "tool_math",
            AnswerSource::Document => "document",
            AnswerSource::Wikipedia => "wikipedia",
            AnswerSource::General => "general",
        }
    }

    /// Tool answers are computed, not generated.
    pub fn is_tool(&self) -> bool {
        matches!(self, AnswerSource::ToolDate | AnswerSource::ToolMath)
    }
}

impl std::fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The answer to one question, with its evaluation and routing trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResult {
    pub answer: String,
    pub evaluation: Evaluation,
    pub trace: Trace,
}
