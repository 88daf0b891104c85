//! Answer routing: decides which source answers a question.
//!
//! States are tried in a fixed order and the first one that produces an answer
//! wins:
//!
//! 1. date tool
//! 2. calculator tool
//! 3. document retrieval + grounded generation
//! 4. Wikipedia summary
//! 5. plain generation
//!
//! Failures in states 2 to 4 only mean "no answer from this source". Failure of the
//! last generation call has nowhere left to go and produces a degraded result,
//! so `ask` always returns the same shape.

pub mod calculator;
pub mod classifier;
pub mod evaluation;
pub mod normalizer;
pub mod trace;
pub mod types;

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use regex::Regex;

use crate::config::Config;
use crate::error::{AskragError, Result};
use crate::sources::{Encyclopedia, Generator, Retriever};

pub use classifier::IntentTables;
pub use evaluation::{evaluate, Evaluation};
pub use trace::Trace;
pub use types::{AnswerSource, AskResult};

/// Answer text returned when the final generation step fails.
pub const ERROR_ANSWER: &str = "Error occurred while processing the request.";

/// Reply the model is told to give when the context lacks the answer.
pub const NOT_FOUND_REPLY: &str = "Not found in document.";

/// Tunables for the routing pipeline.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Passages requested from the retriever.
    pub top_k: usize,
    /// Sentences requested from the encyclopedia.
    pub summary_sentences: usize,
    /// Deadline applied to every collaborator call.
    pub collaborator_timeout: Duration,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            summary_sentences: 1,
            collaborator_timeout: Duration::from_secs(30),
        }
    }
}

impl RouterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.router.top_k,
            summary_sentences: config.encyclopedia.sentences,
            collaborator_timeout: Duration::from_secs(config.router.collaborator_timeout_secs),
        }
    }
}

/// Routes questions through tools, documents, Wikipedia and generation.
pub struct AnswerRouter {
    intents: IntentTables,
    generator: Arc<dyn Generator>,
    encyclopedia: Option<Arc<dyn Encyclopedia>>,
    settings: RouterSettings,
}

impl AnswerRouter {
    /// Create a router. Pass `None` for `encyclopedia` to disable the Wikipedia step.
    pub fn new(
        intents: IntentTables,
        generator: Arc<dyn Generator>,
        encyclopedia: Option<Arc<dyn Encyclopedia>>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            intents,
            generator,
            encyclopedia,
            settings,
        }
    }

    /// Answer one question.
    ///
    /// `retriever` is the knowledge base active for this request, if any
    /// documents have been ingested. Never fails: errors are folded into the
    /// returned evaluation and trace.
    pub async fn ask(&self, question: &str, retriever: Option<&dyn Retriever>) -> AskResult {
        let start = Instant::now();
        let q = question.trim();

        let result = self.route(q, retriever).await;

        log::info!(
            "Answered via {} (confidence {:.1}) in {:?}",
            result.trace.answer_type,
            result.evaluation.confidence,
            start.elapsed()
        );
        result
    }

    async fn route(&self, q: &str, retriever: Option<&dyn Retriever>) -> AskResult {
        if self.intents.is_date_question(q) {
            return date_answer(chrono::Local::now().date_naive());
        }

        if self.intents.is_math_question(q) {
            match math_answer(q) {
                Some(result) => return result,
                None => log::debug!("Math intent but no evaluable expression in '{}'", q),
            }
        }

        if let Some(retriever) = retriever {
            if let Some(result) = self.document_answer(q, retriever).await {
                return result;
            }
        }

        if let Some(result) = self.encyclopedic_answer(q).await {
            return result;
        }

        self.general_answer(q).await
    }

    /// Retrieve passages and answer strictly from them.
    async fn document_answer(&self, q: &str, retriever: &dyn Retriever) -> Option<AskResult> {
        let passages = match self
            .with_deadline("retrieval", retriever.similarity_search(q, self.settings.top_k))
            .await
        {
            Ok(passages) => passages,
            Err(e) => {
                log::warn!("Retrieval failed, skipping documents: {}", e);
                return None;
            }
        };

        let context = passages
            .iter()
            .map(|p| p.content.as_str())
            .filter(|c| !c.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if context.is_empty() {
            log::debug!("No relevant passages for '{}'", q);
            return None;
        }
        log::debug!("Retrieved {} passages ({} chars of context)", passages.len(), context.len());

        let prompt = document_prompt(&context, q);
        let answer = match self
            .with_deadline("generation", self.generator.complete(&prompt))
            .await
        {
            Ok(answer) => clean_answer(&answer),
            Err(e) => {
                log::warn!("Grounded generation failed, falling through: {}", e);
                return None;
            }
        };

        Some(AskResult {
            evaluation: evaluate(AnswerSource::Document, &answer, true),
            trace: Trace::generated(
                AnswerSource::Document,
                self.generator.provider(),
                self.generator.model(),
                true,
            ),
            answer,
        })
    }

    /// Look the question up in the encyclopedia.
    async fn encyclopedic_answer(&self, q: &str) -> Option<AskResult> {
        let encyclopedia = self.encyclopedia.as_ref()?;

        let topic = normalizer::normalize(q);
        if topic.is_empty() {
            return None;
        }

        let summary = match self
            .with_deadline(
                "encyclopedia",
                encyclopedia.summarize(&topic, self.settings.summary_sentences),
            )
            .await
        {
            Ok(Some(summary)) => clean_answer(&summary),
            Ok(None) => {
                log::debug!("No encyclopedia page for topic '{}'", topic);
                return None;
            }
            Err(e) => {
                log::warn!("Encyclopedia lookup for '{}' failed: {}", topic, e);
                return None;
            }
        };
        if summary.is_empty() {
            return None;
        }

        Some(AskResult {
            evaluation: evaluate(AnswerSource::Wikipedia, &summary, false),
            trace: Trace::encyclopedic(),
            answer: summary,
        })
    }

    /// Last resort: ask the model without any context.
    async fn general_answer(&self, q: &str) -> AskResult {
        let prompt = general_prompt(q);
        match self.with_deadline("generation", self.generator.complete(&prompt)).await {
            Ok(answer) => {
                let answer = clean_answer(&answer);
                AskResult {
                    evaluation: evaluate(AnswerSource::General, &answer, false),
                    trace: Trace::generated(
                        AnswerSource::General,
                        self.generator.provider(),
                        self.generator.model(),
                        false,
                    ),
                    answer,
                }
            }
            Err(e) => {
                log::error!("Generation failed with no fallback left: {}", e);
                AskResult {
                    answer: ERROR_ANSWER.to_string(),
                    evaluation: Evaluation::failed(format!("generation failed: {}", e)),
                    trace: Trace::failed(
                        self.generator.provider(),
                        self.generator.model(),
                        e.to_string(),
                    ),
                }
            }
        }
    }

    async fn with_deadline<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let deadline = self.settings.collaborator_timeout;
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(AskragError::Timeout {
                what: what.to_string(),
                secs: deadline.as_secs(),
            }),
        }
    }
}

/// Today's date as a sentence, e.g. "Today's date is March 07, 2025."
pub fn format_date(date: NaiveDate) -> String {
    format!("Today's date is {}.", date.format("%B %d, %Y"))
}

fn date_answer(today: NaiveDate) -> AskResult {
    let answer = format_date(today);
    AskResult {
        evaluation: evaluate(AnswerSource::ToolDate, &answer, false),
        trace: Trace::tool(AnswerSource::ToolDate, "datetime"),
        answer,
    }
}

fn math_answer(q: &str) -> Option<AskResult> {
    let expr = extract_expression(q);
    let value = calculator::evaluate(&expr)?;
    let answer = calculator::format_number(value);
    Some(AskResult {
        evaluation: evaluate(AnswerSource::ToolMath, &answer, false),
        trace: Trace::tool(AnswerSource::ToolMath, "calculator"),
        answer,
    })
}

/// Keep only the characters the calculator accepts.
pub fn extract_expression(q: &str) -> String {
    static NON_ARITHMETIC: OnceLock<Regex> = OnceLock::new();
    let re = NON_ARITHMETIC
        .get_or_init(|| Regex::new(r"[^0-9.+\-*/()\s%^]").expect("Invalid regex pattern"));
    re.replace_all(&q.to_lowercase(), "").trim().to_string()
}

fn document_prompt(context: &str, q: &str) -> String {
    format!(
        "You are a helpful assistant.\n\
         Answer ONLY using the context below.\n\
         If the answer is not in the context, reply exactly: {}\n\n\
         Context:\n{}\n\n\
         Question:\n{}\n\n\
         Answer (1-3 sentences max):\n",
        NOT_FOUND_REPLY, context, q
    )
}

fn general_prompt(q: &str) -> String {
    format!("Answer clearly and concisely in 1-2 sentences:\n{}", q)
}

/// Trim and put the answer on a single line.
fn clean_answer(text: &str) -> String {
    text.trim().replace("\r\n", " ").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Passage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockRetriever {
        passages: Vec<Passage>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl MockRetriever {
        fn with(passages: &[&str]) -> Self {
            Self {
                passages: passages.iter().map(|p| Passage::new(*p)).collect(),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self { fail: true, ..Self::with(&[]) }
        }
    }

    #[async_trait]
    impl Retriever for MockRetriever {
        async fn similarity_search(&self, _query: &str, k: usize) -> Result<Vec<Passage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AskragError::Retrieval("index unavailable".to_string()));
            }
            Ok(self.passages.iter().take(k).cloned().collect())
        }
    }

    enum Reply {
        Text(&'static str),
        Fail,
        Hang,
    }

    struct MockGenerator {
        reply: Reply,
        prompts: Mutex<Vec<String>>,
    }

    impl MockGenerator {
        fn new(reply: Reply) -> Self {
            Self { reply, prompts: Mutex::new(Vec::new()) }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Generator for MockGenerator {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.reply {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::Fail => Err(AskragError::Generation("HTTP 503".to_string())),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("too late".to_string())
                }
            }
        }

        fn provider(&self) -> &str {
            "huggingface"
        }

        fn model(&self) -> &str {
            "mistral-7b-instruct"
        }
    }

    struct MockEncyclopedia {
        summary: Option<&'static str>,
        fail: bool,
        topics: Mutex<Vec<String>>,
    }

    impl MockEncyclopedia {
        fn new(summary: Option<&'static str>) -> Self {
            Self { summary, fail: false, topics: Mutex::new(Vec::new()) }
        }

        fn calls(&self) -> usize {
            self.topics.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Encyclopedia for MockEncyclopedia {
        async fn summarize(&self, topic: &str, _sentences: usize) -> Result<Option<String>> {
            self.topics.lock().unwrap().push(topic.to_string());
            if self.fail {
                return Err(AskragError::Encyclopedia("connection reset".to_string()));
            }
            Ok(self.summary.map(str::to_string))
        }
    }

    const CAPITAL_ANSWER: &str = "The capital of France is Paris.";

    fn router(
        generator: &Arc<MockGenerator>,
        encyclopedia: Option<&Arc<MockEncyclopedia>>,
    ) -> AnswerRouter {
        AnswerRouter::new(
            IntentTables::default(),
            generator.clone(),
            encyclopedia.map(|e| e.clone() as Arc<dyn Encyclopedia>),
            RouterSettings {
                collaborator_timeout: Duration::from_millis(200),
                ..RouterSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_date_question_uses_date_tool() {
        let generator = Arc::new(MockGenerator::new(Reply::Text(CAPITAL_ANSWER)));
        let retriever = MockRetriever::with(&["Paris is the capital of France."]);
        let router = router(&generator, None);

        let result = router.ask("today's date", Some(&retriever)).await;

        let pattern = Regex::new(r"^Today's date is [A-Z][a-z]+ \d{2}, \d{4}\.$").unwrap();
        assert!(pattern.is_match(&result.answer), "unexpected answer: {}", result.answer);
        assert_eq!(result.trace.answer_type, AnswerSource::ToolDate);
        assert_eq!(result.trace.tool.as_deref(), Some("datetime"));
        assert_eq!(result.trace.provider, "system");
        assert_eq!(result.evaluation.confidence, 1.0);
        assert!(result.evaluation.grounded);
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.calls(), 0);
    }

    #[test]
    fn test_format_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(format_date(date), "Today's date is March 07, 2025.");
    }

    #[tokio::test]
    async fn test_math_question_end_to_end() {
        let generator = Arc::new(MockGenerator::new(Reply::Text(CAPITAL_ANSWER)));
        let router = router(&generator, None);

        assert_eq!(extract_expression("What is 25 * 4?"), "25 * 4");
        let result = router.ask("What is 25 * 4?", None).await;

        assert_eq!(result.answer, "100");
        assert_eq!(result.trace.answer_type, AnswerSource::ToolMath);
        assert_eq!(result.trace.tool.as_deref(), Some("calculator"));
        assert!(!result.trace.retrieval);
        assert_eq!(result.evaluation.confidence, 1.0);
        assert!(result.evaluation.grounded);
        assert!(!result.evaluation.hallucination_risk);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_binary_operations() {
        let generator = Arc::new(MockGenerator::new(Reply::Text(CAPITAL_ANSWER)));
        let router = router(&generator, None);

        for (question, expected) in [
            ("12 + 30", "42"),
            ("50 - 8", "42"),
            ("6 * 7", "42"),
            ("84 / 2", "42"),
            ("7 / 2", "3.5"),
            ("142 % 100", "42"),
            ("2 ^ 5", "32"),
        ] {
            let result = router.ask(question, None).await;
            assert_eq!(result.answer, expected, "question: {}", question);
            assert_eq!(result.trace.answer_type, AnswerSource::ToolMath);
        }
    }

    #[tokio::test]
    async fn test_math_failure_falls_through() {
        let generator = Arc::new(MockGenerator::new(Reply::Text("Five minus three is two.")));
        let router = router(&generator, None);

        // Word operators pass the classifier but leave no evaluable expression.
        let result = router.ask("what is 5 minus 3", None).await;
        assert_eq!(result.trace.answer_type, AnswerSource::General);
        assert_eq!(result.answer, "Five minus three is two.");

        let result = router.ask("what is 10 / 0", None).await;
        assert_eq!(result.trace.answer_type, AnswerSource::General);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_deeply_nested_math_falls_through() {
        let generator = Arc::new(MockGenerator::new(Reply::Text("That is 2.")));
        let router = router(&generator, None);

        let question = format!("what is {}1{} + 1", "(".repeat(5000), ")".repeat(5000));
        let result = router.ask(&question, None).await;

        assert_eq!(result.trace.answer_type, AnswerSource::General);
        assert_eq!(result.answer, "That is 2.");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_document_answer_short_circuits() {
        let generator = Arc::new(MockGenerator::new(Reply::Text(CAPITAL_ANSWER)));
        let encyclopedia = Arc::new(MockEncyclopedia::new(Some("Paris is a city.")));
        let retriever = MockRetriever::with(&["Paris is the capital of France."]);
        let router = router(&generator, Some(&encyclopedia));

        let result = router.ask("What is the capital of France?", Some(&retriever)).await;

        assert_eq!(result.answer, CAPITAL_ANSWER);
        assert_eq!(result.trace.answer_type, AnswerSource::Document);
        assert!(result.trace.retrieval);
        assert_eq!(result.trace.provider, "huggingface");
        assert_eq!(result.trace.model.as_deref(), Some("mistral-7b-instruct"));
        assert_eq!(result.evaluation.confidence, 0.9);
        assert!(result.evaluation.grounded);
        assert!(!result.evaluation.hallucination_risk);

        assert_eq!(generator.calls(), 1);
        assert_eq!(encyclopedia.calls(), 0);
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Paris is the capital of France."));
        assert!(prompts[0].contains("reply exactly: Not found in document."));
        assert!(prompts[0].contains("What is the capital of France?"));
    }

    #[tokio::test]
    async fn test_passages_joined_with_blank_lines() {
        let generator = Arc::new(MockGenerator::new(Reply::Text(CAPITAL_ANSWER)));
        let retriever = MockRetriever::with(&["first passage", "second passage"]);
        let router = router(&generator, None);

        router.ask("Tell me about the passages", Some(&retriever)).await;

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("first passage\n\nsecond passage"));
    }

    #[tokio::test]
    async fn test_empty_retrieval_uses_encyclopedia() {
        let generator = Arc::new(MockGenerator::new(Reply::Text(CAPITAL_ANSWER)));
        let encyclopedia = Arc::new(MockEncyclopedia::new(Some(
            "Paris is the capital\nand largest city of France.",
        )));
        let retriever = MockRetriever::with(&[]);
        let router = router(&generator, Some(&encyclopedia));

        let result = router.ask("What is the capital of France?", Some(&retriever)).await;

        assert_eq!(result.answer, "Paris is the capital and largest city of France.");
        assert_eq!(result.trace.answer_type, AnswerSource::Wikipedia);
        assert_eq!(result.trace.provider, "wikipedia");
        assert!(result.trace.model.is_none());
        assert_eq!(result.evaluation.confidence, 0.8);
        assert!(!result.evaluation.grounded);
        assert!(result.evaluation.hallucination_risk);
        assert_eq!(encyclopedia.topics.lock().unwrap()[0], "the capital of france");
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_sources_falls_to_general() {
        let generator = Arc::new(MockGenerator::new(Reply::Text(CAPITAL_ANSWER)));
        let router = router(&generator, None);

        let result = router.ask("What is the capital of France?", None).await;

        assert_eq!(result.trace.answer_type, AnswerSource::General);
        assert!(!result.trace.retrieval);
        assert_eq!(result.evaluation.confidence, 0.6);
        assert!(!result.evaluation.grounded);
        assert!(result.evaluation.hallucination_risk);
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(
            prompts[0],
            "Answer clearly and concisely in 1-2 sentences:\nWhat is the capital of France?"
        );
    }

    #[tokio::test]
    async fn test_encyclopedia_miss_falls_to_general() {
        let generator = Arc::new(MockGenerator::new(Reply::Text(CAPITAL_ANSWER)));
        let encyclopedia = Arc::new(MockEncyclopedia::new(None));
        let router = router(&generator, Some(&encyclopedia));

        let result = router.ask("Who is Zzyzx Quuxington?", None).await;

        assert_eq!(encyclopedia.calls(), 1);
        assert_eq!(result.trace.answer_type, AnswerSource::General);
    }

    #[tokio::test]
    async fn test_source_failures_fall_through() {
        let generator = Arc::new(MockGenerator::new(Reply::Text(CAPITAL_ANSWER)));
        let encyclopedia = Arc::new(MockEncyclopedia {
            fail: true,
            ..MockEncyclopedia::new(Some("unused"))
        });
        let retriever = MockRetriever::failing();
        let router = router(&generator, Some(&encyclopedia));

        let result = router.ask("What is the capital of France?", Some(&retriever)).await;

        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
        assert_eq!(encyclopedia.calls(), 1);
        assert_eq!(result.trace.answer_type, AnswerSource::General);
        assert_eq!(result.answer, CAPITAL_ANSWER);
    }

    #[tokio::test]
    async fn test_grounded_generation_failure_falls_to_encyclopedia() {
        let generator = Arc::new(MockGenerator::new(Reply::Fail));
        let encyclopedia = Arc::new(MockEncyclopedia::new(Some("Paris is the capital of France.")));
        let retriever = MockRetriever::with(&["Paris is the capital of France."]);
        let router = router(&generator, Some(&encyclopedia));

        let result = router.ask("What is the capital of France?", Some(&retriever)).await;

        assert_eq!(result.trace.answer_type, AnswerSource::Wikipedia);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_final_generation_failure_is_degraded_not_error() {
        let generator = Arc::new(MockGenerator::new(Reply::Fail));
        let router = router(&generator, None);

        let result = router.ask("Explain monads", None).await;

        assert_eq!(result.answer, ERROR_ANSWER);
        assert_eq!(result.evaluation.confidence, 0.0);
        assert!(result.evaluation.hallucination_risk);
        assert!(!result.evaluation.grounded);
        assert!(result.trace.error.as_deref().unwrap_or_default().contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_hung_generation_hits_deadline() {
        let generator = Arc::new(MockGenerator::new(Reply::Hang));
        let router = router(&generator, None);

        let result = router.ask("Explain monads", None).await;

        assert_eq!(result.answer, ERROR_ANSWER);
        assert!(result.trace.error.as_deref().unwrap_or_default().contains("Timed out"));
    }

    #[tokio::test]
    async fn test_generated_answer_is_single_line() {
        let generator = Arc::new(MockGenerator::new(Reply::Text(
            "\n  Line one.\nLine two.\r\nLine three.  \n",
        )));
        let router = router(&generator, None);

        let result = router.ask("Explain monads", None).await;

        assert_eq!(result.answer, "Line one. Line two. Line three.");
    }

    #[tokio::test]
    async fn test_short_generated_answer_gets_low_confidence() {
        let generator = Arc::new(MockGenerator::new(Reply::Text("No")));
        let retriever = MockRetriever::with(&["Paris is the capital of France."]);
        let router = router(&generator, None);

        let result = router.ask("Is Berlin the capital of France?", Some(&retriever)).await;

        assert_eq!(result.trace.answer_type, AnswerSource::Document);
        assert_eq!(result.evaluation.confidence, 0.2);
        assert!(result.evaluation.hallucination_risk);
    }

    #[tokio::test]
    async fn test_result_serializes_with_canonical_fields() {
        let generator = Arc::new(MockGenerator::new(Reply::Text(CAPITAL_ANSWER)));
        let router = router(&generator, None);

        let value = serde_json::to_value(router.ask("What is 6 * 7?", None).await).unwrap();

        assert_eq!(value["answer"], "42");
        assert_eq!(value["evaluation"]["hallucination_risk"], false);
        assert_eq!(value["evaluation"]["grounded"], true);
        assert_eq!(value["trace"]["answer_type"], "tool_math");
        assert_eq!(value["trace"]["retrieval"], false);
    }
}
