use crate::pipeline::models::{Intent, IntentClassification, Status};
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_REASONING: &str = "default classification";
pub const PARSE_FAILURE_REASONING: &str = "parse failure, default classification";

#[derive(Debug, Deserialize)]
struct ClassifierReply {
    intent: Option<String>,
    reasoning: Option<String>,
    rephrased_question: Option<String>,
}

/// Span from the first `{` to the last `}`, inclusive.
pub fn braced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Recovers the classifier's JSON object from free-form model text. Never
/// fails: missing or malformed objects fall back to a SQL request on the
/// original query.
pub fn extract_classification(response_text: &str, query: &str) -> IntentClassification {
    let Some(json_text) = braced_span(response_text) else {
        return fallback(response_text, query, DEFAULT_REASONING);
    };

    match serde_json::from_str::<ClassifierReply>(json_text) {
        Ok(reply) => IntentClassification {
            status: Status::Success,
            intent: reply
                .intent
                .as_deref()
                .map(Intent::from_label)
                .unwrap_or_default(),
            reasoning: reply.reasoning.unwrap_or_default(),
            rephrased_question: reply
                .rephrased_question
                .filter(|q| !q.trim().is_empty())
                .unwrap_or_else(|| query.to_string()),
            raw_response: Some(response_text.to_string()),
            error: None,
            degraded: false,
        },
        Err(e) => {
            warn!("Failed to parse intent classification reply: {}", e);
            fallback(response_text, query, PARSE_FAILURE_REASONING)
        }
    }
}

fn fallback(response_text: &str, query: &str, reasoning: &str) -> IntentClassification {
    IntentClassification {
        status: Status::Success,
        intent: Intent::TextToSql,
        reasoning: reasoning.to_string(),
        rephrased_question: query.to_string(),
        raw_response: Some(response_text.to_string()),
        error: None,
        degraded: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_braces_falls_back() {
        let result = extract_classification("I think this is a SQL question.", "list users");

        assert_eq!(result.status, Status::Success);
        assert_eq!(result.intent, Intent::TextToSql);
        assert_eq!(result.reasoning, DEFAULT_REASONING);
        assert_eq!(result.rephrased_question, "list users");
        assert!(result.degraded);
    }

    #[test]
    fn reversed_braces_count_as_absent() {
        let result = extract_classification("} nothing here {", "q");
        assert_eq!(result.reasoning, DEFAULT_REASONING);
    }

    #[test]
    fn unparseable_span_reports_parse_failure() {
        let result = extract_classification("{intent: GENERAL,,}", "q");

        assert_eq!(result.intent, Intent::TextToSql);
        assert_eq!(result.reasoning, PARSE_FAILURE_REASONING);
        assert_eq!(result.rephrased_question, "q");
    }

    #[test]
    fn recovers_object_surrounded_by_commentary() {
        let text = "Sure! Here is my answer:\n\
            {\"intent\":\"TEXT_TO_SQL\",\"reasoning\":\"asks for rows\",\"rephrased_question\":\"show active users\"}\n\
            Hope that helps.";
        let result = extract_classification(text, "who is active");

        assert_eq!(result.intent, Intent::TextToSql);
        assert_eq!(result.reasoning, "asks for rows");
        assert_eq!(result.rephrased_question, "show active users");
        assert!(!result.degraded);
        assert_eq!(result.raw_response.as_deref(), Some(text));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let result = extract_classification(r#"{"intent": "GENERAL"}"#, "what data is there");

        assert_eq!(result.intent, Intent::General);
        assert_eq!(result.reasoning, "");
        assert_eq!(result.rephrased_question, "what data is there");
    }

    #[test]
    fn unknown_intent_label_collapses() {
        let result = extract_classification(r#"{"intent": "SMALL_TALK"}"#, "hi");
        assert_eq!(result.intent, Intent::TextToSql);
    }

    #[test]
    fn intent_labels_are_case_sensitive() {
        let result = extract_classification(r#"{"intent": "user_guide"}"#, "how do I export?");
        assert_eq!(result.intent, Intent::TextToSql);
    }

    #[test]
    fn blank_rephrased_question_keeps_original() {
        let result = extract_classification(
            r#"{"intent": "TEXT_TO_SQL", "rephrased_question": "  "}"#,
            "count orders",
        );
        assert_eq!(result.rephrased_question, "count orders");
    }
}
