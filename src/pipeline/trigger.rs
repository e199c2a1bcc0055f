//! Decoding of the scheduled trigger message.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};

const MAX_DAYS_PAST: i64 = 365 * 100;

/// Which day to process, relative to today, and whether to only look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub days_past: i64,
    #[serde(default)]
    pub dry_run: bool,
}

impl TriggerEvent {
    /// Decode a trigger from any of:
    /// - a bare `{"days_past": 3, "dry_run": true}` object,
    /// - a Pub/Sub push envelope `{"message": {"data": "<base64>"}}`,
    /// - a CloudEvent whose `data` is such an envelope.
    pub fn from_payload(payload: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(payload.trim())
            .map_err(|e| PipelineError::InvalidTrigger(format!("not JSON: {}", e)))?;

        let message = value
            .get("message")
            .or_else(|| value.get("data").and_then(|data| data.get("message")));

        let event: Self = match message {
            Some(message) => {
                let data = message
                    .get("data")
                    .and_then(Value::as_str)
                    .ok_or_else(|| PipelineError::InvalidTrigger("message.data is missing".to_string()))?;
                let decoded = STANDARD
                    .decode(data.trim())
                    .map_err(|e| PipelineError::InvalidTrigger(format!("message.data is not base64: {}", e)))?;
                serde_json::from_slice(&decoded)
                    .map_err(|e| PipelineError::InvalidTrigger(format!("message.data: {}", e)))?
            }
            None => Self::deserialize(&value).map_err(|e| PipelineError::InvalidTrigger(e.to_string()))?,
        };

        if !(0..=MAX_DAYS_PAST).contains(&event.days_past) {
            return Err(PipelineError::InvalidTrigger(format!(
                "days_past must be between 0 and {}, got {}",
                MAX_DAYS_PAST, event.days_past
            )));
        }
        Ok(event)
    }

    pub fn target_date_from(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.days_past)
    }

    /// Local today minus `days_past`.
    pub fn target_date(&self) -> NaiveDate {
        self.target_date_from(Local::now().date_naive())
    }
}
