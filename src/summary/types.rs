//! Job summary model
//!
//! With `--output-type=json` every message the tool prints is an envelope
//! whose `MessageContent` is itself JSON text. The final `EndOfJob`
//! envelope carries the job summary, whose counters are string-encoded.

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::common::{Error, Result};

/// One message printed by the tool in JSON output mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct OutputEnvelope {
    #[serde(default)]
    pub time_stamp: Option<String>,
    /// `Init`, `Info`, `Progress`, `EndOfJob`, `Error`, ...
    pub message_type: String,
    /// JSON text of the payload
    pub message_content: String,
}

impl OutputEnvelope {
    pub fn is_end_of_job(&self) -> bool {
        self.message_type == "EndOfJob"
    }
}

/// Progress or final summary of a job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct JobSummary {
    #[serde(rename = "JobID", default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub job_status: Option<String>,
    #[serde(deserialize_with = "string_encoded")]
    pub transfers_completed: u64,
    #[serde(deserialize_with = "string_encoded")]
    pub transfers_failed: u64,
    #[serde(default, deserialize_with = "string_encoded")]
    pub transfers_skipped: u64,
    #[serde(default, deserialize_with = "string_encoded")]
    pub total_transfers: u64,
    #[serde(default, deserialize_with = "string_encoded")]
    pub total_bytes_transferred: u64,
    #[serde(default, deserialize_with = "string_encoded")]
    pub percent_complete: f64,
}

impl JobSummary {
    /// Parse a summary from either an envelope or a bare summary object
    pub fn parse(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        if value.get("MessageContent").is_some_and(serde_json::Value::is_string) {
            let envelope: OutputEnvelope = serde_json::from_value(value)?;
            if !envelope.is_end_of_job() {
                tracing::debug!(
                    message_type = %envelope.message_type,
                    "last message is not the end of the job"
                );
            }
            return Ok(serde_json::from_str(&envelope.message_content)?);
        }

        Ok(serde_json::from_value(value)?)
    }

    /// True when nothing failed and exactly `expected` transfers completed
    pub fn all_succeeded(&self, expected: u64) -> bool {
        self.transfers_failed == 0 && self.transfers_completed == expected
    }

    /// Assert completed/failed counts, naming both in the error
    pub fn expect_counts(&self, completed: u64, failed: u64) -> Result<()> {
        if self.transfers_completed != completed || self.transfers_failed != failed {
            return Err(Error::TestAssertion(format!(
                "Expected {} completed / {} failed transfers, got {} / {}",
                completed, failed, self.transfers_completed, self.transfers_failed
            )));
        }
        Ok(())
    }
}

/// Accept `"12"` as well as `12`
fn string_encoded<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    let text = match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    };
    text.trim().parse().map_err(de::Error::custom)
}
