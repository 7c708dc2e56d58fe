mod ai;
mod db;
mod insight;
mod ipc;
mod quiz;
mod scoring;
#[cfg(test)]
mod testutil;

use std::io::{self, BufRead, Write};

use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() {
    // Stdout carries the protocol, so logs go to stderr.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let client = ai::OpenAiClient::from_env()
        .map(|c| Box::new(c) as Box<dyn ai::CompletionClient>);
    if client.is_none() {
        warn!("OPENAI_API_KEY not set; generated content falls back to canned text");
    }

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        sessions: Default::default(),
        client,
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply with an id we never parsed.
                let _ = writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
