//! The gated path from query to recorded outcome.
//!
//! Strict order: generate, verify, informational check, severity check,
//! confirmation, execution, history. Every terminal outcome is recorded,
//! including cancellations and conversational replies; only generation
//! and configuration failures abort without a history write.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::CommandRunner;
use crate::extract;
use crate::inventory;
use crate::providers::{ChatMessage, Provider};
use crate::session;
use crate::severity::{requires_confirmation, SeverityTable};
use crate::types::{ExecutionResult, GeneratedCommand, HistoryRecord};
use crate::ui::{self, Prompter};
use crate::verify::{self, EnvContext};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip the run/edit/cancel prompt. High and critical commands still
    /// require their explicit confirmation.
    pub yes: bool,
    /// Show the command and explanation without executing.
    pub explain_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Executed(ExecutionResult),
    Cancelled,
    Informational,
    Explained,
}

pub struct Pipeline<'a> {
    provider: &'a dyn Provider,
    prompter: &'a mut dyn Prompter,
    runner: &'a mut dyn CommandRunner,
    conn: &'a Connection,
    session_id: i64,
    config: &'a Config,
    severity: SeverityTable,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        provider: &'a dyn Provider,
        prompter: &'a mut dyn Prompter,
        runner: &'a mut dyn CommandRunner,
        conn: &'a Connection,
        session_id: i64,
        config: &'a Config,
    ) -> Self {
        Self {
            provider,
            prompter,
            runner,
            conn,
            session_id,
            config,
            severity: SeverityTable::new(),
        }
    }

    pub fn run(&mut self, query: &str, opts: RunOptions) -> Result<Outcome> {
        let env = EnvContext::current();
        self.run_in(query, opts, &env)
    }

    pub fn run_in(&mut self, query: &str, opts: RunOptions, env: &EnvContext) -> Result<Outcome> {
        let threshold = self.config.confidence_threshold();
        let mut effective_query = query.to_string();

        let (generated, verdict) = loop {
            let generated = self.generate(&effective_query, env)?;
            let verdict = verify::verify(
                self.provider,
                &generated.command,
                &effective_query,
                env,
                threshold,
            );

            if verdict.informational.is_informational {
                let message = verdict
                    .informational
                    .message
                    .clone()
                    .unwrap_or_else(|| generated.explanation.clone());
                ui::print_informational(&message);
                if verdict.needs_clarification {
                    ui::print_clarification(&verdict.result);
                }
                self.record(query, &generated.command, &generated.explanation,
                    verdict.result.confidence, None, env)?;
                return Ok(Outcome::Informational);
            }

            if verdict.needs_clarification {
                ui::print_clarification(&verdict.result);
                match self
                    .prompter
                    .choose("", &["add details", "run anyway", "cancel"], 0)?
                {
                    0 => {
                        let details = self.prompter.input("more details: ")?;
                        if details.is_empty() {
                            break (generated, verdict);
                        }
                        // restart generation with the original query plus
                        // what the user just told us
                        effective_query = format!("{} ({})", query, details);
                        continue;
                    }
                    1 => break (generated, verdict),
                    _ => {
                        ui::print_cancelled();
                        self.record(query, &generated.command, &generated.explanation,
                            verdict.result.confidence, None, env)?;
                        return Ok(Outcome::Cancelled);
                    }
                }
            }

            break (generated, verdict);
        };

        let confidence = verdict.result.confidence;
        let mut command = generated.command.clone();
        let mut check = self.severity.classify(&command);
        ui::print_command(&generated, confidence, &check);

        if opts.explain_only {
            self.record(query, &command, &generated.explanation, confidence, None, env)?;
            return Ok(Outcome::Explained);
        }

        loop {
            if requires_confirmation(check.level) {
                // silence must never run a dangerous command
                if !self.prompter.confirm("run this command?", false)? {
                    ui::print_cancelled();
                    self.record(query, &command, &generated.explanation, confidence, None, env)?;
                    return Ok(Outcome::Cancelled);
                }
                break;
            }
            if opts.yes {
                break;
            }
            match self.prompter.choose("", &["run", "edit", "cancel"], 0)? {
                0 => break,
                1 => {
                    let edited = extract::sanitize(&self.prompter.edit(&command)?);
                    if !edited.is_empty() && edited != command {
                        // a replacement never inherits the original's severity
                        command = edited;
                        check = self.severity.classify(&command);
                        ui::print_reclassified(&command, &check);
                    }
                }
                _ => {
                    ui::print_cancelled();
                    self.record(query, &command, &generated.explanation, confidence, None, env)?;
                    return Ok(Outcome::Cancelled);
                }
            }
        }

        let result = self.runner.run(&command)?;
        if result.exit_code != 0 {
            ui::print_exit_warning(result.exit_code);
        }
        self.record(query, &command, &generated.explanation, confidence, Some(&result), env)?;
        Ok(Outcome::Executed(result))
    }

    fn generate(&self, query: &str, env: &EnvContext) -> Result<GeneratedCommand> {
        use std::io::Write;
        eprint!("thinking...");
        std::io::stderr().flush().ok();
        let raw = self.provider.chat(&self.generation_messages(query, env));
        eprint!("\r           \r");
        std::io::stderr().flush().ok();
        let generated = extract::extract(&raw?);
        if generated.command.is_empty() {
            return Err(Error::Generation(
                "the model returned no usable command".to_string(),
            ));
        }
        Ok(generated)
    }

    fn generation_messages(&self, query: &str, env: &EnvContext) -> Vec<ChatMessage> {
        let mut system = String::from(
            "You are a shell command generator. Translate the user's request into \
             one shell command for their environment. Respond with ONLY this JSON, \
             no other text:\n\
             {\"command\": \"the command\", \"explanation\": \"what it does\"}",
        );

        let tools = inventory::available_tools(self.conn).unwrap_or_default();
        let section = inventory::prompt_section(&tools);
        if !section.is_empty() {
            system.push_str("\n\nTools available on this machine:\n");
            system.push_str(&section);
        }

        let summary = session::context_summary(
            self.conn,
            self.session_id,
            self.config.behavior.history_window,
        )
        .unwrap_or_default();
        if !summary.is_empty() {
            system.push_str("\n\n");
            system.push_str(&summary);
        }

        vec![
            ChatMessage::system(system),
            ChatMessage::user(format!(
                "Environment: os={} shell={} cwd={}\nRequest: {}",
                env.os, env.shell, env.cwd, query
            )),
        ]
    }

    fn record(
        &self,
        query: &str,
        command: &str,
        explanation: &str,
        confidence: u8,
        result: Option<&ExecutionResult>,
        env: &EnvContext,
    ) -> Result<()> {
        let record = HistoryRecord {
            query: query.to_string(),
            command: command.to_string(),
            explanation: explanation.to_string(),
            confidence,
            exit_code: result.map(|r| r.exit_code),
            stdout: result.map(|r| r.stdout.clone()),
            stderr: result.map(|r| r.stderr.clone()),
            timestamp: session::now(),
            cwd: env.cwd.clone(),
        };
        session::add_record(self.conn, self.session_id, &record)
    }
}
