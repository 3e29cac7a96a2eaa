//! Discovery of the tools actually installed on this machine.
//!
//! The inventory is advisory context for generation prompts: a flat list
//! of PATH binaries with a rough category each. It lives in the session
//! database and refreshes on an interval.

use crate::config::InventoryConfig;
use crate::error::Result;
use crate::session;
use crate::types::ToolInfo;
use rusqlite::Connection;
use std::collections::HashMap;
use std::{env, fs};

const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "file",
        &[
            "ls", "cp", "mv", "rm", "mkdir", "rmdir", "touch", "find", "fd", "stat", "chmod",
            "chown", "ln", "tar", "gzip", "gunzip", "zip", "unzip", "rsync", "du", "df", "tree",
        ],
    ),
    (
        "text",
        &[
            "cat", "grep", "rg", "sed", "awk", "sort", "uniq", "cut", "tr", "wc", "head", "tail",
            "diff", "jq", "yq", "less", "tee", "xargs",
        ],
    ),
    (
        "network",
        &[
            "curl", "wget", "ssh", "scp", "ping", "dig", "nslookup", "nc", "netstat", "ss", "ip",
            "ifconfig", "traceroute",
        ],
    ),
    (
        "process",
        &[
            "ps", "top", "htop", "kill", "killall", "pkill", "pgrep", "nice", "nohup", "lsof",
            "watch", "timeout",
        ],
    ),
    (
        "package",
        &[
            "apt", "apt-get", "dpkg", "yum", "dnf", "pacman", "brew", "npm", "pip", "pip3",
            "cargo", "gem",
        ],
    ),
    (
        "dev",
        &[
            "git", "make", "gcc", "cc", "python", "python3", "node", "docker", "kubectl", "rustc",
            "go",
        ],
    ),
];

fn categorize(name: &str) -> &'static str {
    for (category, names) in CATEGORIES {
        if names.contains(&name) {
            return *category;
        }
    }
    "other"
}

fn known(name: &str) -> bool {
    categorize(name) != "other"
}

fn discover_binaries() -> Vec<(String, String)> {
    let path_var = env::var("PATH").unwrap_or_default();
    let mut binaries = HashMap::new();
    for dir in path_var.split(':') {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.is_file() {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        if !name.starts_with('.') && !binaries.contains_key(name) {
                            binaries
                                .insert(name.to_string(), path.to_string_lossy().to_string());
                        }
                    }
                }
            }
        }
    }
    binaries.into_iter().collect()
}

/// Rebuilds the tool table from PATH. Recognized tools sort ahead of the
/// long tail so the cap keeps the useful ones.
pub fn refresh(conn: &Connection, config: &InventoryConfig, verbose: bool) -> Result<usize> {
    let mut sorted = discover_binaries();
    sorted.sort_by(|(a, _), (b, _)| known(b).cmp(&known(a)).then_with(|| a.cmp(b)));

    session::clear_tools(conn)?;
    let now = session::now();
    let mut indexed = 0;
    for (name, path) in sorted.into_iter().take(config.max_tools) {
        let category = categorize(&name).to_string();
        session::save_tool(conn, &ToolInfo { name, category }, &path, now)?;
        indexed += 1;
    }

    if verbose {
        eprintln!("{} tools discovered", indexed);
    }
    Ok(indexed)
}

pub fn is_stale(conn: &Connection, config: &InventoryConfig) -> bool {
    match session::tools_updated_at(conn) {
        Some(updated) => {
            let interval = config.refresh_interval_days as i64 * 24 * 60 * 60;
            session::now() - updated > interval
        }
        None => true,
    }
}

pub fn available_tools(conn: &Connection) -> Result<Vec<ToolInfo>> {
    session::load_tools(conn)
}

/// Renders the inventory as a prompt section, one category per line.
/// Empty inventory renders as an empty string and the section is omitted.
pub fn prompt_section(tools: &[ToolInfo]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let mut by_category: HashMap<&str, Vec<&str>> = HashMap::new();
    for tool in tools {
        by_category
            .entry(tool.category.as_str())
            .or_default()
            .push(tool.name.as_str());
    }

    let mut lines = Vec::new();
    for (category, _) in CATEGORIES {
        if let Some(names) = by_category.remove(*category) {
            lines.push(format!("{}: {}", category, names.join(", ")));
        }
    }
    if let Some(names) = by_category.remove("other") {
        lines.push(format!("other: {}", names.join(", ")));
    }
    lines.join("\n")
}
