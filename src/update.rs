//! Best-effort release check.
//!
//! Spawned once at process start, observed exactly once after command
//! execution. If the request hasn't resolved by then, the result is
//! dropped for this invocation; nothing ever waits on it.

use std::sync::mpsc;
use std::thread;

pub struct UpdateCheck {
    rx: mpsc::Receiver<Option<String>>,
}

pub fn spawn_check() -> UpdateCheck {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(fetch_latest_version());
    });
    UpdateCheck { rx }
}

impl UpdateCheck {
    /// Non-blocking. Some(version) only when the check already resolved
    /// and found something newer than this build.
    pub fn newer_release(&self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(Some(latest)) if is_newer(&latest, env!("CARGO_PKG_VERSION")) => Some(latest),
            _ => None,
        }
    }
}

fn fetch_latest_version() -> Option<String> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("nlsh/", env!("CARGO_PKG_VERSION")))
        .build()
        .ok()?;
    let value: serde_json::Value = client
        .get("https://crates.io/api/v1/crates/nlsh")
        .send()
        .ok()?
        .json()
        .ok()?;
    value["crate"]["newest_version"].as_str().map(String::from)
}

fn is_newer(latest: &str, current: &str) -> bool {
    numeric_parts(latest) > numeric_parts(current)
}

fn numeric_parts(version: &str) -> Vec<u64> {
    version
        .split(['.', '-'])
        .map_while(|part| part.parse().ok())
        .collect()
}
