//! Static trust model for answers.
//!
//! Confidence is a fixed value per answer source rather than anything derived
//! from the model: tools 1.0, user documents 0.9, Wikipedia 0.8, unconditioned
//! generation 0.6. Model-produced answers that are empty or nearly so are
//! overridden to 0.2 regardless of where they came from.

use serde::{Deserialize, Serialize};

use super::types::AnswerSource;

/// Answers shorter than this (in characters, after trimming) are treated as degenerate.
pub const MIN_ANSWER_CHARS: usize = 5;

pub const TOOL_CONFIDENCE: f32 = 1.0;
pub const DOCUMENT_CONFIDENCE: f32 = 0.9;
pub const WIKIPEDIA_CONFIDENCE: f32 = 0.8;
pub const GENERAL_CONFIDENCE: f32 = 0.6;
pub const DEGENERATE_CONFIDENCE: f32 = 0.2;

/// Grounding and confidence labels attached to every answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub confidence: f32,
    pub grounded: bool,
    pub hallucination_risk: bool,
    pub reason: Option<String>,
}

impl Evaluation {
    fn new(confidence: f32, grounded: bool, hallucination_risk: bool, reason: &str) -> Self {
        Self {
            confidence,
            grounded,
            hallucination_risk,
            reason: Some(reason.to_string()),
        }
    }

    /// Evaluation for a request whose final generation step failed.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            confidence: 0.0,
            grounded: false,
            hallucination_risk: true,
            reason: Some(reason.into()),
        }
    }
}

/// Evaluate an answer produced by `source`.
///
/// `has_context` says whether retrieved passages were given to the model; a
/// document answer without context cannot be grounded and is scored like
/// unconditioned generation.
pub fn evaluate(source: AnswerSource, answer: &str, has_context: bool) -> Evaluation {
    if !source.is_tool() && answer.trim().chars().count() < MIN_ANSWER_CHARS {
        return Evaluation::new(DEGENERATE_CONFIDENCE, false, true, "answer too short or empty");
    }

    match source {
        AnswerSource::ToolDate | AnswerSource::ToolMath => Evaluation::new(
            TOOL_CONFIDENCE,
            true,
            false,
            "computed by a deterministic tool",
        ),
        AnswerSource::Document if has_context => Evaluation::new(
            DOCUMENT_CONFIDENCE,
            true,
            false,
            "answer generated from retrieved document context",
        ),
        AnswerSource::Wikipedia => Evaluation::new(
            WIKIPEDIA_CONFIDENCE,
            false,
            true,
            "encyclopedic summary, not grounded in your documents",
        ),
        AnswerSource::Document | AnswerSource::General => Evaluation::new(
            GENERAL_CONFIDENCE,
            false,
            true,
            "answer generated without supporting context",
        ),
    }
}
