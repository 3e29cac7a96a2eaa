//! Second-opinion layer: asks the model to judge its own command, and
//! catches conversational replies dressed up as echo calls.
//!
//! Nothing here is allowed to hard-fail the pipeline. A judgment that
//! cannot be obtained or parsed degrades to a neutral verdict; a failed
//! informational check falls back to a local heuristic.

use crate::providers::{ChatMessage, Provider};
use crate::types::{InformationalCheck, VerificationResult};
use regex::Regex;
use serde_json::Value;
use std::env;

/// Confidence assumed when the verdict parsed but carried no usable number.
const AMBIGUOUS_CONFIDENCE: u8 = 50;
/// Confidence assumed when no verdict could be parsed at all.
const DEGRADED_CONFIDENCE: u8 = 60;

#[derive(Debug, Clone)]
pub struct Verdict {
    pub passed: bool,
    pub result: VerificationResult,
    pub needs_clarification: bool,
    pub informational: InformationalCheck,
}

/// OS, shell, and working directory the command would run under.
#[derive(Debug, Clone)]
pub struct EnvContext {
    pub os: String,
    pub shell: String,
    pub cwd: String,
}

impl EnvContext {
    pub fn current() -> Self {
        let shell = env::var("SHELL")
            .ok()
            .and_then(|s| s.rsplit('/').next().map(String::from))
            .unwrap_or_else(|| "sh".to_string());
        let cwd = env::current_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| ".".to_string());
        Self {
            os: env::consts::OS.to_string(),
            shell,
            cwd,
        }
    }
}

pub fn verify(
    provider: &dyn Provider,
    command: &str,
    query: &str,
    env: &EnvContext,
    threshold: u8,
) -> Verdict {
    let result = match provider.chat(&verification_messages(command, query, env)) {
        Ok(text) => parse_verdict(&text),
        Err(_) => degraded_result(),
    };

    let passed = result.confidence >= threshold && result.is_correct;
    let needs_clarification = !passed && !result.suggested_questions.is_empty();
    let informational = detect_informational(provider, command, query);

    Verdict {
        passed,
        result,
        needs_clarification,
        informational,
    }
}

fn verification_messages(command: &str, query: &str, env: &EnvContext) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You review shell commands proposed by a command generator. \
             Respond with ONLY a JSON object, no other text.",
        ),
        ChatMessage::user(format!(
            r#"The user asked: {query}
Proposed command: {command}
Environment: os={os} shell={shell} cwd={cwd}

Judge whether the command accomplishes the request in this environment.
Respond with ONLY this JSON:
{{"confidence": <0-100>, "is_correct": true|false, "issues": ["..."], "suggested_questions": ["..."]}}"#,
            query = query,
            command = command,
            os = env.os,
            shell = env.shell,
            cwd = env.cwd,
        )),
    ]
}

fn degraded_result() -> VerificationResult {
    VerificationResult {
        confidence: DEGRADED_CONFIDENCE,
        is_correct: true,
        issues: vec!["verification was incomplete; judge the command yourself".to_string()],
        suggested_questions: Vec::new(),
    }
}

/// Lenient verdict parse. Absence of a signal is neither full confidence
/// nor zero: missing fields default to the neutral midpoint.
fn parse_verdict(text: &str) -> VerificationResult {
    let Some(value) = json_span(text) else {
        return degraded_result();
    };

    let confidence = match value.get("confidence") {
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_f64().map(|f| f.round() as i64))
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .map(|n| n.clamp(0, 100) as u8)
            .unwrap_or(AMBIGUOUS_CONFIDENCE),
        None => AMBIGUOUS_CONFIDENCE,
    };

    VerificationResult {
        confidence,
        is_correct: value
            .get("is_correct")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        issues: string_list(value.get("issues")),
        suggested_questions: string_list(value.get("suggested_questions")),
    }
}

fn json_span(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

// Informational-response detection

/// Commands that can only display text. Anything else short-circuits.
fn display_gate() -> Regex {
    Regex::new(r"^(?:echo|printf)\s").unwrap()
}

pub fn detect_informational(
    provider: &dyn Provider,
    command: &str,
    query: &str,
) -> InformationalCheck {
    if !display_gate().is_match(command) {
        return InformationalCheck {
            is_informational: false,
            message: None,
        };
    }

    match provider.chat(&informational_messages(command, query)) {
        Ok(text) => parse_informational(&text)
            .unwrap_or_else(|| informational_heuristic(command, query)),
        Err(_) => informational_heuristic(command, query),
    }
}

fn informational_messages(command: &str, query: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You decide whether a generated echo/printf command is a \
             conversational reply or a real print request. Respond with \
             ONLY a JSON object, no other text.",
        ),
        ChatMessage::user(format!(
            r#"The user asked: {query}
The generator produced: {command}

Is the command just displaying an answer to a conversational question,
or did the user genuinely ask to print something?

Examples:
- query "who are you", command: echo "I am an assistant" -> informational
- query "echo hello world", command: echo "hello world" -> NOT informational
- query "print my home directory", command: echo $HOME -> NOT informational

Respond with ONLY this JSON:
{{"informational": true|false, "message": "<the text being displayed>"}}"#,
        )),
    ]
}

fn parse_informational(text: &str) -> Option<InformationalCheck> {
    let value = json_span(text)?;
    let is_informational = value.get("informational").and_then(Value::as_bool)?;
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(String::from);
    Some(InformationalCheck {
        is_informational,
        message,
    })
}

/// Offline fallback: a quoted echo argument answering a query that opens
/// like small talk is treated as a conversational reply.
fn informational_heuristic(command: &str, query: &str) -> InformationalCheck {
    let conversational = Regex::new(
        r"(?i)^\s*(?:who|what|how|why|hello|hi|hey|help|thank|can you|tell me about)\b",
    )
    .unwrap();

    let message = quoted_argument(command);
    if message.is_some() && conversational.is_match(query) {
        InformationalCheck {
            is_informational: true,
            message,
        }
    } else {
        InformationalCheck {
            is_informational: false,
            message: None,
        }
    }
}

fn quoted_argument(command: &str) -> Option<String> {
    let pattern = Regex::new(r#"^(?:echo|printf)\s+(?:-\w+\s+)*(?:"([^"]*)"|'([^']*)')"#).ok()?;
    let captures = pattern.captures(command)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Scripted provider: pops canned responses in order; `None` simulates
    /// a transport failure.
    struct FakeProvider {
        responses: RefCell<Vec<Option<String>>>,
    }

    impl FakeProvider {
        fn new(responses: Vec<Option<&str>>) -> Self {
            Self {
                responses: RefCell::new(
                    responses
                        .into_iter()
                        .rev()
                        .map(|r| r.map(String::from))
                        .collect(),
                ),
            }
        }
    }

    impl Provider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        fn chat(&self, _messages: &[ChatMessage]) -> crate::error::Result<String> {
            match self.responses.borrow_mut().pop() {
                Some(Some(text)) => Ok(text),
                _ => Err(Error::Provider {
                    provider: "fake".to_string(),
                    message: "scripted failure".to_string(),
                }),
            }
        }
    }

    fn env() -> EnvContext {
        EnvContext {
            os: "linux".to_string(),
            shell: "bash".to_string(),
            cwd: "/tmp".to_string(),
        }
    }

    #[test]
    fn well_formed_verdict_passes_threshold() {
        let provider = FakeProvider::new(vec![Some(
            r#"{"confidence": 85, "is_correct": true, "issues": [], "suggested_questions": []}"#,
        )]);
        let verdict = verify(&provider, "ls -la", "list files", &env(), 70);
        assert!(verdict.passed);
        assert_eq!(verdict.result.confidence, 85);
        assert!(!verdict.needs_clarification);
    }

    #[test]
    fn low_confidence_with_questions_needs_clarification() {
        let provider = FakeProvider::new(vec![Some(
            r#"{"confidence": 55, "is_correct": true,
                "issues": ["ambiguous target directory"],
                "suggested_questions": ["which directory did you mean?"]}"#,
        )]);
        let verdict = verify(&provider, "rm -r build", "clean up", &env(), 70);
        assert!(!verdict.passed);
        assert!(verdict.needs_clarification);
    }

    #[test]
    fn low_confidence_without_questions_falls_through() {
        let provider = FakeProvider::new(vec![Some(
            r#"{"confidence": 40, "is_correct": false, "issues": ["unsure"], "suggested_questions": []}"#,
        )]);
        let verdict = verify(&provider, "ls", "do the thing", &env(), 70);
        assert!(!verdict.passed);
        assert!(!verdict.needs_clarification);
    }

    #[test]
    fn incorrect_fails_even_with_high_confidence() {
        let provider = FakeProvider::new(vec![Some(
            r#"{"confidence": 95, "is_correct": false, "issues": [], "suggested_questions": []}"#,
        )]);
        let verdict = verify(&provider, "ls", "delete everything", &env(), 70);
        assert!(!verdict.passed);
    }

    #[test]
    fn missing_confidence_defaults_to_midpoint() {
        let result = parse_verdict(r#"{"is_correct": true}"#);
        assert_eq!(result.confidence, AMBIGUOUS_CONFIDENCE);
    }

    #[test]
    fn unparseable_verdict_degrades_gently() {
        let result = parse_verdict("I think it looks fine!");
        assert_eq!(result.confidence, DEGRADED_CONFIDENCE);
        assert!(result.is_correct);
        assert_eq!(result.issues.len(), 1);
        assert!(result.suggested_questions.is_empty());
    }

    #[test]
    fn provider_failure_never_blocks() {
        let provider = FakeProvider::new(vec![None]);
        let verdict = verify(&provider, "ls -la", "list files", &env(), 70);
        assert_eq!(verdict.result.confidence, DEGRADED_CONFIDENCE);
        // 60 < 70: fails the threshold but asks nothing, so no stall
        assert!(!verdict.passed);
        assert!(!verdict.needs_clarification);
    }

    #[test]
    fn confidence_is_clamped_into_range() {
        let result = parse_verdict(r#"{"confidence": 250, "is_correct": true}"#);
        assert_eq!(result.confidence, 100);
        let result = parse_verdict(r#"{"confidence": -10, "is_correct": true}"#);
        assert_eq!(result.confidence, 0);
    }

    #[test]
    fn string_confidence_is_tolerated() {
        let result = parse_verdict(r#"{"confidence": "80", "is_correct": true}"#);
        assert_eq!(result.confidence, 80);
    }

    #[test]
    fn real_operations_skip_the_semantic_call() {
        // a provider that would fail if called at all
        let provider = FakeProvider::new(vec![]);
        let check = detect_informational(&provider, "rm -rf ./build", "clean the build");
        assert!(!check.is_informational);
    }

    #[test]
    fn conversational_echo_is_informational() {
        let provider = FakeProvider::new(vec![Some(
            r#"{"informational": true, "message": "I am a shell command generator"}"#,
        )]);
        let check = detect_informational(
            &provider,
            r#"echo "I am a shell command generator""#,
            "who are you",
        );
        assert!(check.is_informational);
        assert_eq!(
            check.message.as_deref(),
            Some("I am a shell command generator")
        );
    }

    #[test]
    fn heuristic_covers_judgment_failure() {
        let provider = FakeProvider::new(vec![None]);
        let check = detect_informational(
            &provider,
            r#"echo "I am a shell command generator""#,
            "who are you",
        );
        assert!(check.is_informational);
        assert_eq!(
            check.message.as_deref(),
            Some("I am a shell command generator")
        );
    }

    #[test]
    fn explicit_echo_request_is_not_informational() {
        let provider = FakeProvider::new(vec![None]);
        let check = detect_informational(&provider, r#"echo "hello world""#, "echo hello world");
        assert!(!check.is_informational);
    }

    #[test]
    fn unquoted_echo_is_not_informational_offline() {
        let provider = FakeProvider::new(vec![None]);
        let check = detect_informational(&provider, "echo $HOME", "what is my home directory");
        assert!(!check.is_informational);
    }
}
