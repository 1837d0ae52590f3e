
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentError, Result};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// An unvalidated input row as produced by the file adapters
///
/// Field names follow the tabular import format
/// (`ID, Sender, SenderName, Content, Timestamp, Duration, Offset`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    #[serde(rename = "Sender", default)]
    pub sender_id: Option<String>,
    #[serde(rename = "SenderName", default)]
    pub sender_name: Option<String>,
    #[serde(rename = "Content", default)]
    pub content: Option<String>,
    #[serde(rename = "Timestamp", default)]
    pub timestamp: Option<String>,
    #[serde(rename = "Duration", default)]
    pub duration: Option<String>,
    #[serde(rename = "Offset", default)]
    pub offset: Option<String>,
}

impl RawRecord {
    #[inline]
    pub fn new(
        id: impl Into<String>,
        sender_name: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            sender_name: Some(sender_name.into()),
            content: Some(content.into()),
            timestamp: Some(timestamp.into()),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_sender_id(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = Some(duration.to_string());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset.to_string());
        self
    }
}

/// A validated unit of text ready for embedding and storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    /// Originating actor, empty for non-conversational sources
    pub sender_id: String,
    pub sender_name: String,
    /// Second granularity, UTC
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub duration: u32,
    pub offset: u32,
}

impl Record {
    /// Validate `raw`, which sits at position `row` of the input sequence
    ///
    /// # Errors
    /// * `AgentError::MalformedRecord` - a required field is missing or a
    ///   timestamp/number fails to parse
    #[inline]
    pub fn from_raw(row: usize, raw: &RawRecord) -> Result<Self> {
        let malformed = |reason: String| AgentError::MalformedRecord { row, reason };

        let id = required(raw.id.as_deref(), "ID").map_err(malformed)?;
        let sender_name = required(raw.sender_name.as_deref(), "SenderName").map_err(malformed)?;
        let content = raw
            .content
            .clone()
            .ok_or_else(|| malformed("missing required field Content".to_string()))?;
        let timestamp_text = required(raw.timestamp.as_deref(), "Timestamp").map_err(malformed)?;
        let timestamp = parse_timestamp(&timestamp_text).ok_or_else(|| {
            malformed(format!(
                "record {}: invalid ISO-8601 timestamp {:?}",
                id, timestamp_text
            ))
        })?;

        Ok(Self {
            duration: parse_count(raw.duration.as_deref(), "Duration").map_err(malformed)?,
            offset: parse_count(raw.offset.as_deref(), "Offset").map_err(malformed)?,
            sender_id: raw.sender_id.clone().unwrap_or_default(),
            id,
            sender_name,
            timestamp,
            content,
        })
    }
}

fn required(value: Option<&str>, field: &str) -> std::result::Result<String, String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(format!("missing required field {}", field)),
    }
}

fn parse_count(value: Option<&str>, field: &str) -> std::result::Result<u32, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(0),
        Some(v) => v
            .parse::<u32>()
            .map_err(|_| format!("{} must be a non-negative integer, got {:?}", field, v)),
    }
}

/// Parse an ISO-8601 timestamp, truncated to whole seconds
///
/// A trailing `Z` is read as `+00:00`. Values without an offset are taken
/// as UTC.
#[inline]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let normalized = value
        .strip_suffix('Z')
        .or_else(|| value.strip_suffix('z'))
        .map_or_else(|| value.to_string(), |base| format!("{}+00:00", base));

    let parsed = DateTime::parse_from_rfc3339(&normalized)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })?;

    DateTime::from_timestamp(parsed.timestamp(), 0)
}
