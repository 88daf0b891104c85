use serde::{Deserialize, Serialize};

use super::types::AnswerSource;

/// Provider label for answers computed in-process.
pub const SYSTEM_PROVIDER: &str = "system";
/// Provider label for encyclopedic answers.
pub const WIKIPEDIA_PROVIDER: &str = "wikipedia";

/// Diagnostic record of the routing path taken for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub provider: String,
    pub tool: Option<String>,
    pub model: Option<String>,
    pub answer_type: AnswerSource,
    pub retrieval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Trace {
    /// Trace for an answer computed by a built-in tool (`datetime`, `calculator`).
    pub fn tool(source: AnswerSource, tool: &str) -> Self {
        Self {
            provider: SYSTEM_PROVIDER.to_string(),
            tool: Some(tool.to_string()),
            model: None,
            answer_type: source,
            retrieval: false,
            error: None,
        }
    }

    /// Trace for an answer written by the generation collaborator.
    pub fn generated(source: AnswerSource, provider: &str, model: &str, retrieval: bool) -> Self {
        Self {
            provider: provider.to_string(),
            tool: None,
            model: Some(model.to_string()),
            answer_type: source,
            retrieval,
            error: None,
        }
    }

    /// Trace for an answer taken from the encyclopedia.
    pub fn encyclopedic() -> Self {
        Self {
            provider: WIKIPEDIA_PROVIDER.to_string(),
            tool: None,
            model: None,
            answer_type: AnswerSource::Wikipedia,
            retrieval: false,
            error: None,
        }
    }

    /// Trace for a request whose final generation step failed.
    pub fn failed(provider: &str, model: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::generated(AnswerSource::General, provider, model, false)
        }
    }
}
