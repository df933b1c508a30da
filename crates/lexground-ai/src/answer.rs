//! Grounded answering: prompt the model with the retrieved context and parse
//! the `Answer:` / `Source:` reply.

use std::sync::Arc;
use std::time::Duration;

use lexground_core::PromptPolicy;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::GenerationError;
use crate::llm::{ChatModel, ChatRequest};
use crate::prompt::build_prompt;

/// Sampling temperature for every call. Not configurable.
pub const TEMPERATURE: f32 = 0.0;

const ANSWER_MARKER: &str = "Answer:";
const SOURCE_MARKER: &str = "Source:";

/// Structured view of one model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroundedAnswer {
    pub answer_text: String,
    pub source_text: String,
    /// `answer_text` is byte-identical to the refusal sentence.
    pub is_refusal: bool,
}

impl GroundedAnswer {
    /// The cited source, unless it is empty or the model said it was not specified.
    pub fn cited_source(&self) -> Option<&str> {
        let source = self.source_text.trim();
        if source.is_empty() || source.contains("Not specified") {
            None
        } else {
            Some(source)
        }
    }
}

/// Best-effort structural parse of a model reply.
///
/// With both markers present the answer runs from the first `Answer:` to the
/// next `Source:` after it (or to the end), and the source is everything after
/// the first `Source:`. With either marker missing the whole reply is the
/// answer and the source is empty.
pub fn parse_response(raw: &str, refusal: &str) -> GroundedAnswer {
    let (answer_text, source_text) = match (raw.find(ANSWER_MARKER), raw.find(SOURCE_MARKER)) {
        (Some(a), Some(s)) => {
            let after_answer = a + ANSWER_MARKER.len();
            let answer_end = raw[after_answer..]
                .find(SOURCE_MARKER)
                .map_or(raw.len(), |rel| after_answer + rel);
            (&raw[after_answer..answer_end], &raw[s + SOURCE_MARKER.len()..])
        }
        _ => (raw, ""),
    };

    let answer_text = answer_text.trim().to_string();
    let source_text = source_text.trim().to_string();
    let is_refusal = answer_text == refusal;
    GroundedAnswer {
        answer_text,
        source_text,
        is_refusal,
    }
}

/// Answers questions from a supplied context only, refusing otherwise.
///
/// Each call is stateless: one user message, no history.
#[derive(Clone)]
pub struct GroundedAnswerer {
    model: Arc<dyn ChatModel>,
    model_name: String,
    max_tokens: u32,
    timeout: Duration,
    policy: PromptPolicy,
}

impl GroundedAnswerer {
    pub fn new(
        model: Arc<dyn ChatModel>,
        model_name: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
        policy: PromptPolicy,
    ) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            max_tokens,
            timeout,
            policy,
        }
    }

    pub fn policy(&self) -> &PromptPolicy {
        &self.policy
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Ask the model to answer `question` from `context`.
    ///
    /// Transport failures, timeouts and empty replies are errors, never refusals.
    pub async fn answer(
        &self,
        context: &str,
        question: &str,
    ) -> Result<GroundedAnswer, GenerationError> {
        let prompt = build_prompt(&self.policy, context, question);
        debug!(prompt = %prompt, "grounding prompt");
        let request =
            ChatRequest::single_user(&self.model_name, prompt, TEMPERATURE, self.max_tokens);

        let raw = tokio::time::timeout(self.timeout, self.model.complete(&request))
            .await
            .map_err(|_| {
                warn!(timeout = ?self.timeout, "model call timed out");
                GenerationError::Timeout(self.timeout)
            })??;

        if raw.trim().is_empty() {
            return Err(GenerationError::Malformed("empty completion".to_string()));
        }
        debug!(raw = %raw, "model reply");

        let answer = parse_response(&raw, &self.policy.refusal);
        info!(
            model = %self.model_name,
            refusal = answer.is_refusal,
            has_source = answer.cited_source().is_some(),
            "answer generated"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const REFUSAL: &str = "The provided sections of the National Penal Code, 2017 do not mention this.";

    /// Replies with a fixed string and records every request it sees.
    struct ScriptedModel {
        reply: Result<String, u16>,
        delay: Option<Duration>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(GenerationError::Server {
                    status: *status,
                    body: "upstream failure".into(),
                }),
            }
        }
    }

    fn answerer(model: Arc<ScriptedModel>, timeout: Duration) -> GroundedAnswerer {
        GroundedAnswerer::new(
            model,
            "llama-3.1-8b-instant",
            350,
            timeout,
            PromptPolicy::default(),
        )
    }

    // ── parse_response ──

    #[test]
    fn parses_answer_and_source() {
        let raw =
            "Answer:\nMurder is the intentional killing...\n\nSource:\nChapter 12, Section 177\n";
        let parsed = parse_response(raw, REFUSAL);
        assert_eq!(parsed.answer_text, "Murder is the intentional killing...");
        assert_eq!(parsed.source_text, "Chapter 12, Section 177");
        assert!(!parsed.is_refusal);
        assert_eq!(parsed.cited_source(), Some("Chapter 12, Section 177"));
    }

    #[test]
    fn exact_refusal_is_detected() {
        let raw = format!("Answer:\n{REFUSAL}\n\nSource:\nNot specified in provided text");
        let parsed = parse_response(&raw, REFUSAL);
        assert!(parsed.is_refusal);
        assert_eq!(parsed.cited_source(), None);
    }

    #[test]
    fn near_miss_refusals_are_not_refusals() {
        let near_misses = [
            "The provided sections of the National Penal Code, 2017 do not mention this",
            "The provided sections of the National Penal Code, 2017 do not mention this..",
            "\"The provided sections of the National Penal Code, 2017 do not mention this.\"",
            "The provided sections of the National Penal Code 2017 do not mention this.",
            "The provided sections of the national penal code, 2017 do not mention this.",
            "The sections provided of the National Penal Code, 2017 do not mention this.",
        ];
        for text in near_misses {
            let raw = format!("Answer:\n{text}\n\nSource:\nNot specified in provided text");
            assert!(
                !parse_response(&raw, REFUSAL).is_refusal,
                "{text:?} must not count as a refusal"
            );
        }
    }

    #[test]
    fn missing_markers_fall_back_to_whole_reply() {
        let parsed = parse_response("  Murder is defined in Section 177.  ", REFUSAL);
        assert_eq!(parsed.answer_text, "Murder is defined in Section 177.");
        assert_eq!(parsed.source_text, "");
        assert!(!parsed.is_refusal);
    }

    #[test]
    fn bare_refusal_without_markers_is_a_refusal() {
        assert!(parse_response(REFUSAL, REFUSAL).is_refusal);
        assert!(parse_response(&format!("\n{REFUSAL}\n"), REFUSAL).is_refusal);
    }

    #[test]
    fn answer_marker_alone_falls_back() {
        let parsed = parse_response("Answer: something", REFUSAL);
        assert_eq!(parsed.answer_text, "Answer: something");
        assert_eq!(parsed.source_text, "");
    }

    #[test]
    fn duplicated_markers_use_first_occurrence() {
        let raw = "Answer: first\nSource: S1\nAnswer: second\nSource: S2";
        let parsed = parse_response(raw, REFUSAL);
        assert_eq!(parsed.answer_text, "first");
        assert_eq!(parsed.source_text, "S1\nAnswer: second\nSource: S2");
    }

    #[test]
    fn out_of_order_markers_keep_source_from_first_marker() {
        let parsed = parse_response("Source: Section 5\nAnswer: text", REFUSAL);
        assert_eq!(parsed.answer_text, "text");
        assert_eq!(parsed.source_text, "Section 5\nAnswer: text");
    }

    #[test]
    fn source_before_and_after_answer() {
        let parsed = parse_response("Source: a\nAnswer: b\nSource: c", REFUSAL);
        assert_eq!(parsed.answer_text, "b");
        assert_eq!(parsed.source_text, "a\nAnswer: b\nSource: c");
    }

    #[test]
    fn adjacent_markers() {
        let parsed = parse_response("Source:Answer:", REFUSAL);
        assert_eq!(parsed.answer_text, "");
        assert_eq!(parsed.source_text, "Answer:");
    }

    #[test]
    fn multibyte_text_around_markers() {
        let parsed = parse_response("नमस्ते Answer: हत्या Source: दफा १७७", REFUSAL);
        assert_eq!(parsed.answer_text, "हत्या");
        assert_eq!(parsed.source_text, "दफा १७७");
    }

    // ── GroundedAnswerer ──

    #[tokio::test]
    async fn sends_one_stateless_message_at_zero_temperature() {
        let model = Arc::new(ScriptedModel::replying("Answer: A\nSource: S"));
        let a = answerer(model.clone(), Duration::from_secs(5));

        a.answer("[Section 1] ctx one", "q1").await.unwrap();
        a.answer("[Section 2] ctx two", "q2").await.unwrap();

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        for req in seen.iter() {
            assert_eq!(req.messages.len(), 1);
            assert_eq!(req.messages[0].role, "user");
            assert_eq!(req.temperature, 0.0);
            assert_eq!(req.max_tokens, 350);
            assert_eq!(req.model, "llama-3.1-8b-instant");
        }
        assert!(seen[1].messages[0].content.contains("ctx two"));
        assert!(!seen[1].messages[0].content.contains("ctx one"));
    }

    #[tokio::test]
    async fn refusal_reply_is_flagged() {
        let reply = format!("Answer:\n{REFUSAL}\n\nSource:\nNot specified in provided text");
        let model = Arc::new(ScriptedModel::replying(&reply));
        let result = answerer(model, Duration::from_secs(5))
            .answer("ctx", "What is the tax rate?")
            .await
            .unwrap();
        assert!(result.is_refusal);
    }

    #[tokio::test]
    async fn server_error_is_not_a_refusal() {
        let model = Arc::new(ScriptedModel {
            reply: Err(503),
            delay: None,
            seen: Mutex::new(Vec::new()),
        });
        let err = answerer(model, Duration::from_secs(5))
            .answer("ctx", "q")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Server { status: 503, .. }));
    }

    #[tokio::test]
    async fn empty_reply_is_malformed() {
        let model = Arc::new(ScriptedModel::replying("   \n"));
        let err = answerer(model, Duration::from_secs(5))
            .answer("ctx", "q")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let model = Arc::new(ScriptedModel {
            reply: Ok("Answer: late\nSource: S".into()),
            delay: Some(Duration::from_secs(5)),
            seen: Mutex::new(Vec::new()),
        });
        let a = answerer(model, Duration::from_millis(50));
        let err = a.answer("ctx", "q").await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn failure_does_not_poison_later_calls() {
        let failing = Arc::new(ScriptedModel {
            reply: Err(500),
            delay: None,
            seen: Mutex::new(Vec::new()),
        });
        let a = answerer(failing, Duration::from_secs(5));
        assert!(a.answer("ctx", "q").await.is_err());

        let healthy = Arc::new(ScriptedModel::replying("Answer: ok\nSource: Section 1"));
        let b = answerer(healthy, Duration::from_secs(5));
        assert_eq!(b.answer("ctx", "q").await.unwrap().answer_text, "ok");
    }
}
