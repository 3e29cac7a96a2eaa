use crate::types::{GeneratedCommand, SeverityCheck, VerificationResult};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal,
};
use std::io::{self, Write};
use std::time::Duration;

/// How the pipeline asks questions. The terminal implementation renders
/// with crossterm; tests drive the pipeline with a scripted implementation.
pub trait Prompter {
    /// Yes/no question. Enter takes the default.
    fn confirm(&mut self, message: &str, default: bool) -> io::Result<bool>;
    /// Single choice out of `options`; returns the selected index.
    /// Enter takes the default, escape takes the last option.
    fn choose(&mut self, message: &str, options: &[&str], default: usize) -> io::Result<usize>;
    /// Free-text line.
    fn input(&mut self, message: &str) -> io::Result<String>;
    /// Free-text editing of an existing command string.
    fn edit(&mut self, initial: &str) -> io::Result<String>;
}

pub struct TerminalPrompter;

fn read_key() -> io::Result<KeyCode> {
    terminal::enable_raw_mode()?;
    let result = (|| loop {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    return Ok(KeyCode::Esc);
                }
                return Ok(key.code);
            }
        }
    })();
    terminal::disable_raw_mode().ok();
    result
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, message: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        eprint!("{message} {hint} ");
        io::stderr().flush()?;
        let answer = loop {
            match read_key()? {
                KeyCode::Char('y') | KeyCode::Char('Y') => break true,
                KeyCode::Char('n') | KeyCode::Char('N') => break false,
                KeyCode::Enter => break default,
                KeyCode::Esc => break false,
                _ => {}
            }
        };
        eprintln!("{}", if answer { "y" } else { "n" });
        Ok(answer)
    }

    fn choose(&mut self, message: &str, options: &[&str], default: usize) -> io::Result<usize> {
        if !message.is_empty() {
            eprintln!("{message}");
        }
        let legend = options
            .iter()
            .enumerate()
            .map(|(i, option)| {
                if i == default {
                    format!("[enter] {option}")
                } else {
                    let key = option.chars().next().unwrap_or('?');
                    format!("[{key}] {option}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ");
        eprint!("{legend} ");
        io::stderr().flush()?;

        let choice = loop {
            match read_key()? {
                KeyCode::Enter => break default,
                KeyCode::Esc => break options.len().saturating_sub(1),
                KeyCode::Char(c) => {
                    if let Some(i) = options
                        .iter()
                        .position(|option| option.starts_with(c.to_ascii_lowercase()))
                    {
                        break i;
                    }
                }
                _ => {}
            }
        };
        eprintln!("{}", options[choice]);
        Ok(choice)
    }

    fn input(&mut self, message: &str) -> io::Result<String> {
        eprint!("{message}");
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn edit(&mut self, initial: &str) -> io::Result<String> {
        let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
        let path = std::env::temp_dir().join("nlsh_edit.sh");
        std::fs::write(&path, initial)?;
        std::process::Command::new(&editor).arg(&path).status()?;
        Ok(std::fs::read_to_string(&path)?.trim().to_string())
    }
}

// Rendering

pub fn print_command(generated: &GeneratedCommand, confidence: u8, check: &SeverityCheck) {
    println!();
    println!("  {}", generated.command);
    if !generated.explanation.is_empty() {
        println!("  {}", generated.explanation);
    }
    println!(
        "  confidence: {}%  severity: {}",
        confidence,
        check.level.label()
    );
    for warning in &check.warnings {
        println!("  warning: {}", warning);
    }
    println!();
}

pub fn print_reclassified(command: &str, check: &SeverityCheck) {
    println!();
    println!("  edited: {}", command);
    println!("  severity: {}", check.level.label());
    for warning in &check.warnings {
        println!("  warning: {}", warning);
    }
    println!();
}

pub fn print_informational(message: &str) {
    println!();
    println!("{message}");
    println!();
}

pub fn print_clarification(result: &VerificationResult) {
    println!();
    println!("  the command did not verify cleanly.");
    for issue in &result.issues {
        println!("  issue: {}", issue);
    }
    for question in &result.suggested_questions {
        println!("  question: {}", question);
    }
    println!();
}

pub fn print_exit_warning(exit_code: i32) {
    eprintln!("warning: command exited with code {exit_code}");
}

pub fn print_cancelled() {
    println!("cancelled.");
}
