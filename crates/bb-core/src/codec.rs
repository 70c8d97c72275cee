//! # Record codec
//!
//! Each ad is stored as one JSON object:
//!
//! ```text
//! {"author": "...", "theme": "...", "text": "...", "date": "DD/MM/YYYY HH:MM",
//!  "comments": [{"author": "...", "text": "...", "date": "DD/MM/YYYY HH:MM"}]}
//! ```
//!
//! The field names and date layout are the board's on-disk format; there is
//! no schema version.

use crate::error::{AppError, Result};
use crate::models::Ad;

/// Layout of every persisted `date` field.
pub const DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

pub fn encode(ad: &Ad) -> Result<String> {
    serde_json::to_string(ad).map_err(|e| AppError::Internal(format!("failed to encode ad: {e}")))
}

/// Decodes the value stored at `key`. Any deviation from the record layout is
/// `DataCorruption`.
pub fn decode(key: &str, raw: &str) -> Result<Ad> {
    serde_json::from_str(raw).map_err(|e| AppError::DataCorruption {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// serde adapter for `DATE_FORMAT` timestamps.
pub(crate) mod board_date {
    use super::DATE_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&at.format(DATE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}
