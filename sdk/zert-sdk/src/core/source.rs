use crate::error::{Result, ZertSdkError};
use crate::types::EncryptedNote;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// One page of the global note stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePage {
    /// Position the page was requested from
    pub start: u64,

    /// Entries ordered by position, all `>= start`
    pub notes: Vec<EncryptedNote>,

    /// Stream length as reported alongside the page
    pub total: u64,
}

impl NotePage {
    /// One past the last position covered by this page
    pub fn end(&self) -> u64 {
        self.notes.last().map_or(self.start, |n| n.position + 1)
    }

    pub fn last_position(&self) -> Option<u64> {
        self.notes.last().map(|n| n.position)
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Whether the stream continues past this page
    pub fn has_more(&self) -> bool {
        !self.notes.is_empty() && self.end() < self.total
    }
}

/// Paged read access to the encrypted note stream.
///
/// Implementations never track a position of their own; the caller passes
/// the position to read from on every call.
#[async_trait]
pub trait NoteSource: Send + Sync {
    /// Fetch at most `limit` notes starting at `position`.
    /// Fewer than `limit` notes are returned only at the end of the stream.
    async fn fetch_notes_from(&self, position: u64, limit: u64) -> Result<NotePage>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitmentsResponse {
    #[serde(default)]
    commitments: Vec<CommitmentEntry>,
    total: Option<u64>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitmentEntry {
    index: u64,
    #[serde(default)]
    encrypted_output: String,
}

/// Note source backed by the pool's HTTP indexer
#[derive(Debug, Clone)]
pub struct IndexerNoteSource {
    client: Client,
    base_url: String,
}

impl IndexerNoteSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ZertSdkError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl NoteSource for IndexerNoteSource {
    async fn fetch_notes_from(&self, position: u64, limit: u64) -> Result<NotePage> {
        let end = position.saturating_add(limit);
        let url = format!("{}/commitments", self.base_url);
        debug!(%url, position, end, "fetching commitments");

        let response = self
            .client
            .get(&url)
            .query(&[("start", position), ("end", end)])
            .send()
            .await
            .map_err(|e| ZertSdkError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| ZertSdkError::Transport(e.to_string()))?;

        let body: CommitmentsResponse = response
            .json()
            .await
            .map_err(|e| ZertSdkError::Transport(format!("bad indexer response: {e}")))?;

        Ok(page_from_response(position, limit, body))
    }
}

fn page_from_response(position: u64, limit: u64, body: CommitmentsResponse) -> NotePage {
    let mut entries: Vec<CommitmentEntry> = body
        .commitments
        .into_iter()
        .filter(|c| c.index >= position)
        .collect();
    entries.sort_by_key(|c| c.index);
    entries.dedup_by_key(|c| c.index);
    entries.truncate(limit as usize);

    let notes: Vec<EncryptedNote> = entries
        .into_iter()
        .map(|c| EncryptedNote::new(c.index, decode_ciphertext(c.index, &c.encrypted_output)))
        .collect();

    let mut page = NotePage {
        start: position,
        notes,
        total: 0,
    };
    page.total = match body.total {
        Some(total) => total,
        None if body.has_more => page.end() + 1,
        None => page.end(),
    };
    page
}

/// Undecodable hex becomes an empty envelope, which the decoder classifies as malformed
fn decode_ciphertext(index: u64, encoded: &str) -> Vec<u8> {
    let trimmed = encoded.strip_prefix("0x").unwrap_or(encoded);
    hex::decode(trimmed).unwrap_or_else(|e| {
        debug!(index, error = %e, "undecodable ciphertext hex");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> CommitmentsResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_indexer_payload() {
        let body = response(
            r#"{
                "commitments": [
                    {"index": 6, "commitment": "ab", "encryptedOutput": "0a0b"},
                    {"index": 5, "commitment": "cd", "encryptedOutput": "0x0c"}
                ],
                "total": 9,
                "start": 5,
                "end": 7,
                "hasMore": true
            }"#,
        );
        let page = page_from_response(5, 50, body);
        assert_eq!(page.notes.len(), 2);
        assert_eq!(page.notes[0].position, 5);
        assert_eq!(page.notes[0].ciphertext, vec![0x0c]);
        assert_eq!(page.notes[1].ciphertext, vec![0x0a, 0x0b]);
        assert_eq!(page.total, 9);
        assert_eq!(page.end(), 7);
        assert!(page.has_more());
    }

    #[test]
    fn bad_hex_yields_empty_envelope() {
        let body = response(r#"{"commitments":[{"index":0,"encryptedOutput":"zz"}],"total":1}"#);
        let page = page_from_response(0, 10, body);
        assert!(page.notes[0].ciphertext.is_empty());
        assert!(!page.has_more());
    }

    #[test]
    fn entries_before_the_requested_position_are_dropped() {
        let body = response(
            r#"{"commitments":[{"index":1,"encryptedOutput":""},{"index":3,"encryptedOutput":""}]}"#,
        );
        let page = page_from_response(2, 10, body);
        assert_eq!(page.notes.len(), 1);
        assert_eq!(page.notes[0].position, 3);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn empty_page_at_stream_end() {
        let page = page_from_response(10, 5, response(r#"{"commitments":[],"total":10}"#));
        assert!(page.is_empty());
        assert_eq!(page.end(), 10);
        assert!(!page.has_more());
    }
}
