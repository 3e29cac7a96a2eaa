use crate::config::{self, Config, LlmConfig};
use crate::error::Error;
use crate::executor::ShellRunner;
use crate::inventory;
use crate::pipeline::{Outcome, Pipeline, RunOptions};
use crate::providers::{create_provider, ChatMessage};
use crate::session;
use crate::ui::{Prompter, TerminalPrompter};
use crate::update;
use anyhow::Result;
use std::io::Write;
use std::{env, process::Command};

pub fn cmd_query(query: &str, config: &Config, opts: RunOptions) -> Result<()> {
    let llm = config.active_provider().ok_or(Error::MissingProvider)?;
    let provider = create_provider(llm)?;

    // fire-and-mostly-forget; observed once after execution
    let update_check = update::spawn_check();

    let conn = session::open_db(&session::get_db_path())?;
    if config.inventory.enabled && inventory::is_stale(&conn, &config.inventory) {
        eprintln!("discovering tools...");
        inventory::refresh(&conn, &config.inventory, false)?;
    }
    let session_id = session::claim_session(&conn, &session::terminal_fingerprint())?;

    let mut prompter = TerminalPrompter;
    let mut runner = ShellRunner;
    let outcome = Pipeline::new(
        provider.as_ref(),
        &mut prompter,
        &mut runner,
        &conn,
        session_id,
        config,
    )
    .run(query, opts);

    match outcome {
        Ok(Outcome::Executed(_)) => {
            if let Some(version) = update_check.newer_release() {
                eprintln!(
                    "note: nlsh {} is available (installed {})",
                    version,
                    env!("CARGO_PKG_VERSION")
                );
            }
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) => {
            if e.is_auth_error() {
                eprintln!("hint: this looks like a credentials problem. run 'nlsh setup'");
            }
            Err(e.into())
        }
    }
}

pub fn cmd_setup() -> Result<()> {
    let mut prompter = TerminalPrompter;

    println!("nlsh setup");
    println!();
    let providers = ["openai", "anthropic", "gemini", "ollama"];
    println!("providers:");
    for (i, name) in providers.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }
    let provider = loop {
        let entered = prompter.input("choose [1-4]: ")?;
        if let Ok(n) = entered.parse::<usize>() {
            if (1..=providers.len()).contains(&n) {
                break providers[n - 1].to_string();
            }
        }
    };

    let api_key = if provider == "ollama" {
        String::new()
    } else {
        prompter.input("api key: ")?
    };

    let default_model = match provider.as_str() {
        "openai" => "gpt-4o-mini",
        "anthropic" => "claude-3-5-haiku-latest",
        "gemini" => "gemini-2.0-flash",
        _ => "llama3.2",
    };
    let entered = prompter.input(&format!("model [{default_model}]: "))?;
    let model = if entered.is_empty() {
        default_model.to_string()
    } else {
        entered
    };

    let mut config = config::load_config();
    config.llm = Some(LlmConfig {
        provider,
        model,
        api_key,
        endpoint: None,
    });
    config::save_config(&config)?;

    println!();
    println!("saved: {:?}", config::get_config_path());
    Ok(())
}

pub fn cmd_config() -> Result<()> {
    let config_path = config::get_config_path();

    if !config_path.exists() {
        config::save_config(&Config::default())?;
    }

    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    Command::new(&editor).arg(&config_path).status()?;

    Ok(())
}

pub fn cmd_doctor(config: &Config) -> Result<()> {
    println!("diagnostics:");
    println!();

    print!("  config ... ");
    std::io::stdout().flush().ok();
    if config::get_config_path().exists() {
        println!("ok");
    } else {
        println!("using defaults");
    }

    print!("  provider ... ");
    std::io::stdout().flush().ok();
    match config.active_provider() {
        None => {
            println!("not configured");
            println!("    run: nlsh setup");
        }
        Some(llm) => {
            println!("{} ({})", llm.provider, llm.model);
            print!("  model ... ");
            std::io::stdout().flush().ok();
            let probe = create_provider(llm)
                .and_then(|p| p.chat(&[ChatMessage::user("Say 'ok' and nothing else.")]));
            match probe {
                Ok(_) => println!("ok"),
                Err(e) => {
                    println!("failed");
                    println!("    error: {e}");
                    if e.is_auth_error() {
                        println!("    check your api key: nlsh setup");
                    }
                }
            }
        }
    }

    print!("  sessions ... ");
    std::io::stdout().flush().ok();
    let db_path = session::get_db_path();
    if db_path.exists() {
        let conn = session::open_db(&db_path)?;
        println!("ok");

        print!("  tools ... ");
        std::io::stdout().flush().ok();
        let count = session::tool_count(&conn);
        if count > 0 {
            println!("ok ({count} tools)");
        } else {
            println!("empty");
            println!("    run: nlsh tools --refresh");
        }
    } else {
        println!("none yet");
    }

    println!();
    Ok(())
}

pub fn cmd_history() -> Result<()> {
    let db_path = session::get_db_path();
    if !db_path.exists() {
        println!("no history yet.");
        return Ok(());
    }

    let conn = session::open_db(&db_path)?;
    let session_id = session::claim_session(&conn, &session::terminal_fingerprint())?;
    let records = session::recent_records(&conn, session_id, session::MAX_HISTORY)?;

    if records.is_empty() {
        println!("no history yet.");
        return Ok(());
    }

    println!("this terminal's session:");
    println!();
    for record in records {
        let status = match record.exit_code {
            Some(0) => "+",
            Some(_) => "x",
            None => "-",
        };
        println!("{} {}", status, record.query);
        println!("    {}", record.command);
    }
    println!();

    Ok(())
}

pub fn cmd_tools(config: &Config, refresh: bool) -> Result<()> {
    let conn = session::open_db(&session::get_db_path())?;

    if refresh || session::tool_count(&conn) == 0 {
        let count = inventory::refresh(&conn, &config.inventory, true)?;
        println!("done: {} tools discovered", count);
        println!();
    }

    let tools = inventory::available_tools(&conn)?;
    let section = inventory::prompt_section(&tools);
    if section.is_empty() {
        println!("no tools discovered.");
    } else {
        println!("{section}");
    }
    Ok(())
}
