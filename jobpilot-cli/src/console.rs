//! Console implementation of [`ConfirmSink`].

use std::fmt::Write;

use async_trait::async_trait;
use jobpilot::prelude::ConfirmSink;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Prints the alert to stderr and reads a numbered choice from stdin.
///
/// Empty, unreadable, or out-of-range input picks the last option.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

#[async_trait]
impl ConfirmSink for ConsoleSink {
    async fn confirm(&self, message: &str, title: &str, options: &[&str]) -> String {
        let mut prompt = format!("\n=== {title} ===\n{message}\n");
        for (i, option) in options.iter().enumerate() {
            let _ = writeln!(prompt, "  [{}] {option}", i + 1);
        }
        prompt.push_str("> ");

        let mut stderr = tokio::io::stderr();
        let _ = stderr.write_all(prompt.as_bytes()).await;
        let _ = stderr.flush().await;

        let line = BufReader::new(tokio::io::stdin())
            .lines()
            .next_line()
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        pick(options, &line)
    }
}

fn pick(options: &[&str], input: &str) -> String {
    let chosen = input
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| options.get(i))
        .or_else(|| options.last());
    chosen.map_or_else(String::new, |o| (*o).to_owned())
}
