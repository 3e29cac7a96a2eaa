use serde::{Deserialize, Serialize};

/// A command candidate extracted from raw model output.
///
/// Immutable once built; an edit by the user produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCommand {
    pub command: String,
    pub explanation: String,
}

/// Worst-case risk classification of a command string.
///
/// Variant order is the severity order; `Ord` is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Safe => "safe",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityCheck {
    /// Maximum severity among all matched table entries.
    pub level: Severity,
    /// Reason of the first matched entry at the maximum level; empty for safe.
    pub reason: String,
    /// Reasons of every matched entry, deduplicated, first-seen order.
    pub warnings: Vec<String>,
}

/// Model-judged correctness verdict for a command candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// Always within [0, 100].
    pub confidence: u8,
    pub is_correct: bool,
    pub issues: Vec<String>,
    pub suggested_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationalCheck {
    pub is_informational: bool,
    /// The display text, when the command is just a conversational reply.
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// One session history entry. Output fields hold samples, not full streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub query: String,
    pub command: String,
    pub explanation: String,
    pub confidence: u8,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub timestamp: i64,
    pub cwd: String,
}

/// A discovered PATH binary, advisory context for generation prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub category: String,
}
