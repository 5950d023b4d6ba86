//! Captured message streams in JSONL form
//!
//! One message per line. Blank lines and `#` comments are skipped, and lines
//! that fail to parse are logged and dropped so a partially corrupt capture
//! still yields a best-effort timeline.

use crate::error::LoadError;
use crate::messages::Message;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Read messages from a JSONL capture file
pub async fn read_messages_from_file(path: &Path) -> Result<Vec<Message>, LoadError> {
    let read_error = |source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = tokio::fs::File::open(path).await.map_err(read_error)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let mut messages = Vec::new();
    let mut line_number = 0u64;

    while let Some(line) = lines.next_line().await.map_err(read_error)? {
        line_number += 1;
        if let Some(message) = parse_line(&line, line_number) {
            messages.push(message);
        }
    }

    info!(
        "Loaded {} messages from {}",
        messages.len(),
        path.display()
    );
    Ok(messages)
}

/// Parse messages from in-memory JSONL text, skipping bad lines
pub fn parse_messages(text: &str) -> Vec<Message> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| parse_line(line, i as u64 + 1))
        .collect()
}

/// Parse messages from in-memory JSONL text, failing on the first bad line
pub fn parse_messages_strict(text: &str) -> Result<Vec<Message>, LoadError> {
    let mut messages = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let message = serde_json::from_str(line).map_err(|source| LoadError::Parse {
            line: i as u64 + 1,
            source,
        })?;
        messages.push(message);
    }
    Ok(messages)
}

/// Write messages as JSONL
pub async fn write_messages_to_file(path: &Path, messages: &[Message]) -> anyhow::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    for message in messages {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
    }
    file.flush().await?;
    Ok(())
}

fn parse_line(line: &str, line_number: u64) -> Option<Message> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    match serde_json::from_str::<Message>(line) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!("Failed to parse message at line {}: {}", line_number, err);
            debug!("Line content: {}", line);
            None
        }
    }
}
