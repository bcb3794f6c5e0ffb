//! Timestamped plain-text chat transcripts

use crate::output::traits::{OutputError, OutputResult, PersistOutcome, RecordBatch, Writer};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::Path;
use url::Url;

const HEADER_RULE_WIDTH: usize = 80;
const MAX_URL_PART_CHARS: usize = 20;

/// Label for bot replies when the bot name is unknown
const DEFAULT_BOT_LABEL: &str = "Bot";

/// Writes message pairs as a `poe_chat_<id>_<timestamp>.txt` file
#[derive(Debug, Clone, Default)]
pub struct TranscriptWriter;

impl TranscriptWriter {
    pub fn new() -> Self {
        Self
    }
}

/// Builds the transcript file name from the chat URL
///
/// # Arguments
///
/// * `source_url` - Chat URL; the last path segment identifies the chat
/// * `now` - Timestamp appended to the name
pub fn transcript_file_name(source_url: &str, now: &DateTime<Local>) -> String {
    let path = Url::parse(source_url)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| source_url.to_string());
    let url_part: String = path
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .chars()
        .take(MAX_URL_PART_CHARS)
        .collect();

    format!("poe_chat_{}_{}.txt", url_part, now.format("%Y%m%d_%H%M%S"))
}

/// Formats a batch of message pairs as transcript text
pub fn format_transcript(batch: &RecordBatch, now: &DateTime<Local>) -> OutputResult<String> {
    let bot_label = batch.counterpart.as_deref().unwrap_or(DEFAULT_BOT_LABEL);
    let mut text = String::new();

    text.push_str("Poe Chat Transcript\n");
    text.push_str(&format!("URL: {}\n", batch.source_url));
    text.push_str(&format!("Bot Name: {}\n", batch.counterpart_or_unknown()));
    text.push_str(&format!(
        "Downloaded on: {}\n\n",
        now.format("%Y-%m-%d %H:%M:%S")
    ));
    text.push_str(&"=".repeat(HEADER_RULE_WIDTH));
    text.push_str("\n\n");

    for (i, record) in batch.records.iter().enumerate() {
        let pair = record.as_message_pair().ok_or_else(|| {
            OutputError::Format(format!("expected a message pair, got a {}", record.kind()))
        })?;
        text.push_str(&format!("Message Pair {}:\n", i + 1));
        text.push_str(&format!("Human: {}\n\n", pair.human_text()));
        text.push_str(&format!("{}: {}\n\n", bot_label, pair.bot_text()));
        text.push_str(&"-".repeat(HEADER_RULE_WIDTH));
        text.push_str("\n\n");
    }

    Ok(text)
}

#[async_trait]
impl Writer for TranscriptWriter {
    async fn persist(
        &self,
        batch: &RecordBatch,
        destination: &Path,
    ) -> OutputResult<PersistOutcome> {
        let now = Local::now();
        let text = format_transcript(batch, &now)?;

        tokio::fs::create_dir_all(destination).await?;
        let path = destination.join(transcript_file_name(&batch.source_url, &now));
        tokio::fs::write(&path, text).await?;

        tracing::info!("Messages saved to {}", path.display());
        Ok(PersistOutcome {
            destination: path,
            saved: batch.len(),
        })
    }
}
