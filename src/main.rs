mod commands;
mod config;
mod error;
mod executor;
mod extract;
mod inventory;
mod pipeline;
mod providers;
mod session;
mod severity;
mod types;
mod ui;
mod update;
mod verify;

use pipeline::RunOptions;
use std::env;

fn print_usage() {
    eprintln!("usage: nlsh [-y] [-e] <query>");
    eprintln!("       nlsh setup | config | doctor | history");
    eprintln!("       nlsh tools [--refresh]");
    eprintln!();
    eprintln!("  -y, --yes      run without the run/edit/cancel prompt");
    eprintln!("                 (high-risk commands still ask)");
    eprintln!("  -e, --explain  show the command without executing it");
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let config = config::load_config();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let result = match args[1].as_str() {
        "setup" => commands::cmd_setup(),
        "config" => commands::cmd_config(),
        "doctor" => commands::cmd_doctor(&config),
        "history" => commands::cmd_history(),
        "tools" => commands::cmd_tools(
            &config,
            args.get(2).map(|s| s.as_str()) == Some("--refresh"),
        ),
        "-h" | "--help" | "help" => {
            print_usage();
            Ok(())
        }
        _ => {
            let mut opts = RunOptions::default();
            let mut parts = Vec::new();
            for arg in &args[1..] {
                match arg.as_str() {
                    "-y" | "--yes" => opts.yes = true,
                    "-e" | "--explain" => opts.explain_only = true,
                    _ => parts.push(arg.clone()),
                }
            }
            let query = parts.join(" ");
            if query.is_empty() {
                print_usage();
                Ok(())
            } else {
                commands::cmd_query(&query, &config, opts)
            }
        }
    };

    if let Err(e) = result {
        eprintln!("nlsh: {e:#}");
        std::process::exit(1);
    }
}
