//! Turns raw model output into a clean, single-line shell command.
//!
//! Models reply with JSON, markdown-fenced JSON, JSON nested inside JSON,
//! or plain text, depending on mood. Extraction tries each shape in order
//! and always produces something the rest of the pipeline can work with.

use crate::types::GeneratedCommand;
use regex::Regex;
use serde_json::Value;

/// Nested `command` fields are unwrapped at most this many times.
const MAX_UNWRAP_DEPTH: usize = 3;

pub fn extract(raw: &str) -> GeneratedCommand {
    let text = strip_code_fences(raw.trim());
    let mut explanation = String::new();

    let command = match json_object(&text) {
        Some(value) => take_command(&value, &mut explanation)
            .map(|cmd| unwrap_nested(cmd, &mut explanation))
            .unwrap_or_else(|| text.clone()),
        None => match command_fragment(&text) {
            Some(cmd) => unwrap_nested(cmd, &mut explanation),
            None => text.clone(),
        },
    };

    GeneratedCommand {
        command: sanitize(&command),
        explanation,
    }
}

/// Parses the outermost `{...}` span of the text as a JSON object.
fn json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: Value = serde_json::from_str(&text[start..=end]).ok()?;
    value.is_object().then_some(value)
}

/// Pulls `command` out of a parsed object, capturing `explanation` if present.
fn take_command(value: &Value, explanation: &mut String) -> Option<String> {
    let obj = value.as_object()?;
    let command = obj.get("command")?.as_str()?.to_string();
    if explanation.is_empty() {
        if let Some(text) = obj.get("explanation").and_then(Value::as_str) {
            *explanation = text.to_string();
        }
    }
    Some(command)
}

/// Unwinds `command` values that are themselves JSON carrying a `command`
/// field. Bounded iteration; adversarial input terminates at the cap.
fn unwrap_nested(mut command: String, explanation: &mut String) -> String {
    for _ in 0..MAX_UNWRAP_DEPTH {
        let trimmed = command.trim();
        if !trimmed.starts_with('{') {
            break;
        }
        let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
            break;
        };
        let Some(inner) = take_command(&value, explanation) else {
            break;
        };
        command = inner;
    }
    command
}

/// Fallback for invalid JSON that still contains a `"command": "..."` pair.
fn command_fragment(text: &str) -> Option<String> {
    let pattern = Regex::new(r#""command"\s*:\s*"((?:[^"\\]|\\.)*)""#).ok()?;
    let captured = pattern.captures(text)?.get(1)?.as_str();
    Some(unescape(captured))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduces a command to a single directly-executable line: no markdown
/// fences, no leading prompt markers, no backticks, no embedded newlines.
pub fn sanitize(command: &str) -> String {
    let text = strip_code_fences(command);
    let text = text
        .lines()
        .map(strip_prompt_marker)
        .collect::<Vec<_>>()
        .join(" ")
        .replace('`', "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops a `$`, `#`, or `>` shell-prompt marker at the start of a line.
/// Only marker-plus-space counts, so `$HOME/bin/x` and `#!/bin/sh` survive.
fn strip_prompt_marker(line: &str) -> &str {
    let trimmed = line.trim_start();
    for marker in ["$ ", "# ", "> "] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return rest;
        }
    }
    for marker in ["$", "#", ">"] {
        if trimmed == marker {
            return "";
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_json_object() {
        let got = extract(r#"{"command": "ls -la", "explanation": "list files"}"#);
        assert_eq!(got.command, "ls -la");
        assert_eq!(got.explanation, "list files");
    }

    #[test]
    fn doubly_nested_json_unwinds() {
        let raw = r#"{"command": "{\"command\": \"ls -la\"}", "explanation": "list files"}"#;
        let got = extract(raw);
        assert_eq!(got.command, "ls -la");
        assert_eq!(got.explanation, "list files");
    }

    #[test]
    fn markdown_fenced_json() {
        let raw = "```json\n{\"command\": \"df -h\", \"explanation\": \"disk usage\"}\n```";
        let got = extract(raw);
        assert_eq!(got.command, "df -h");
    }

    #[test]
    fn invalid_json_with_command_fragment() {
        let raw = r#"Sure! Here you go: "command": "echo hi\tthere", trailing junk"#;
        let got = extract(raw);
        assert_eq!(got.command, "echo hi there");
    }

    #[test]
    fn bare_text_is_the_command() {
        let got = extract("  du -sh */ | sort -h  ");
        assert_eq!(got.command, "du -sh */ | sort -h");
        assert_eq!(got.explanation, "");
    }

    #[test]
    fn pathological_nesting_terminates() {
        // five levels deep; the cap stops the unwind without looping forever
        let mut raw = String::from("tail -f log");
        for _ in 0..5 {
            raw = serde_json::to_string(&serde_json::json!({ "command": raw })).unwrap();
        }
        let got = extract(&raw);
        assert!(!got.command.is_empty());
    }

    #[test]
    fn prompt_markers_stripped() {
        let got = extract("$ ls -la");
        assert_eq!(got.command, "ls -la");
        let got = extract("> grep -r TODO .");
        assert_eq!(got.command, "grep -r TODO .");
    }

    #[test]
    fn dollar_variables_survive() {
        let got = extract("$HOME/bin/run.sh --all");
        assert_eq!(got.command, "$HOME/bin/run.sh --all");
    }

    #[test]
    fn backticks_and_newlines_collapse() {
        let got = extract("`find . -name '*.rs'` \n  | wc -l");
        assert_eq!(got.command, "find . -name '*.rs' | wc -l");
    }

    #[test]
    fn sanitize_is_noop_on_clean_commands() {
        for clean in [
            "ls -la",
            "find . -type f -name '*.log' | wc -l",
            "git log --oneline -10",
            "du -sh */ | sort -h",
        ] {
            assert_eq!(sanitize(clean), clean);
        }
    }

    #[test]
    fn extraction_is_idempotent() {
        let first = extract(r#"{"command": "sort -u names.txt"}"#);
        let rewrapped = serde_json::to_string(&serde_json::json!({
            "command": first.command,
            "explanation": first.explanation,
        }))
        .unwrap();
        let second = extract(&rewrapped);
        assert_eq!(first.command, second.command);
    }

    #[test]
    fn empty_input_yields_empty_command() {
        assert_eq!(extract("").command, "");
        assert_eq!(extract("```\n```").command, "");
    }
}
