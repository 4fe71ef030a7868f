//! Ledger event types and `JobCreated` payload decoding
//!
//! The ledger serialises `u64` values as JSON strings and `vector<u8>` either
//! as a byte array or, depending on the emitting code path, as an encoded
//! string. Both quirks are modelled as explicit variants and resolved with an
//! exhaustive match.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::domain::cursor::EventId;
use crate::domain::job::{MAX_JOB_FIELD, NewJob};

/// Event type suffix of job creation events
pub const JOB_CREATED_EVENT: &str = "JobCreated";

/// Query filter selecting the events emitted by one contract module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventFilter {
    MoveEventModule { package: String, module: String },
}

/// A single event as returned by the ledger event log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    pub id: EventId,
    /// Fully qualified type, e.g. `0xabc::jobs::JobCreated`
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub parsed_json: serde_json::Value,
    #[serde(default)]
    pub timestamp_ms: Option<String>,
}

impl LedgerEvent {
    /// Short type name (last path segment) of the event
    pub fn type_name(&self) -> &str {
        let without_generics = self
            .event_type
            .split_once('<')
            .map_or(self.event_type.as_str(), |(head, _)| head);
        without_generics
            .rsplit("::")
            .next()
            .unwrap_or(without_generics)
    }

    pub fn is_job_created(&self) -> bool {
        self.type_name() == JOB_CREATED_EVENT
    }
}

/// One page of the event log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    pub data: Vec<LedgerEvent>,
    pub next_cursor: Option<EventId>,
    #[serde(default)]
    pub has_next_page: bool,
}

/// Errors raised while decoding an event payload into a job
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed event payload: {0}")]
    Malformed(String),

    #[error("field `{field}` is not an unsigned integer: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: u64 },

    #[error("field `{field}` is neither hex, base64 nor a byte array")]
    InvalidBytes { field: &'static str },
}

/// `u64` as emitted by the ledger: usually a decimal string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericField {
    Text(String),
    Number(u64),
}

impl NumericField {
    pub fn decode(&self, field: &'static str) -> Result<u64, DecodeError> {
        match self {
            NumericField::Number(n) => Ok(*n),
            NumericField::Text(s) => {
                s.trim()
                    .parse::<u64>()
                    .map_err(|_| DecodeError::InvalidNumber {
                        field,
                        value: s.clone(),
                    })
            }
        }
    }

    /// Like [`decode`](Self::decode), rejecting values above [`MAX_JOB_FIELD`]
    pub fn decode_bounded(&self, field: &'static str) -> Result<u64, DecodeError> {
        let value = self.decode(field)?;
        if value > MAX_JOB_FIELD {
            return Err(DecodeError::OutOfRange { field, value });
        }
        Ok(value)
    }
}

/// `vector<u8>` as emitted by the ledger: a byte array or an encoded string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BytesField {
    Raw(Vec<u8>),
    Text(String),
}

impl BytesField {
    /// Canonical binary form
    ///
    /// Strings are read as hex (optionally `0x` prefixed) first and as
    /// standard base64 second. A base64 string made only of hex digits, such
    /// as `"abcd"`, therefore decodes as hex; emitters of such keys must send
    /// a byte array or a `0x` hex string.
    pub fn decode(&self, field: &'static str) -> Result<Vec<u8>, DecodeError> {
        match self {
            BytesField::Raw(bytes) => Ok(bytes.clone()),
            BytesField::Text(s) => {
                let trimmed = s.trim();
                let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
                if let Ok(bytes) = hex::decode(hex_part) {
                    return Ok(bytes);
                }
                base64::engine::general_purpose::STANDARD
                    .decode(trimmed)
                    .map_err(|_| DecodeError::InvalidBytes { field })
            }
        }
    }

    /// Reads the bytes as a UTF-8 string (blob ids are stored this way)
    pub fn decode_utf8(&self, field: &'static str) -> Result<String, DecodeError> {
        match self {
            BytesField::Text(s) => Ok(s.clone()),
            BytesField::Raw(bytes) => String::from_utf8(bytes.clone())
                .map_err(|_| DecodeError::InvalidBytes { field }),
        }
    }
}

/// Raw `parsedJson` of a `JobCreated` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreatedPayload {
    pub job_id: NumericField,
    pub creator: String,
    pub pool_id: NumericField,
    pub price: NumericField,
    pub buyer_public_key: BytesField,
    pub epochs: NumericField,
    pub learning_rate: NumericField,
}

impl JobCreatedPayload {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, DecodeError> {
        Self::deserialize(value).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}

impl TryFrom<JobCreatedPayload> for NewJob {
    type Error = DecodeError;

    fn try_from(payload: JobCreatedPayload) -> Result<Self, Self::Error> {
        if payload.creator.trim().is_empty() {
            return Err(DecodeError::Malformed("empty creator".to_string()));
        }

        Ok(NewJob {
            id: payload.job_id.decode_bounded("job_id")?,
            creator: payload.creator,
            pool_id: payload.pool_id.decode_bounded("pool_id")?,
            price: payload.price.decode_bounded("price")?,
            buyer_public_key: payload.buyer_public_key.decode("buyer_public_key")?,
            epochs: payload.epochs.decode_bounded("epochs")?,
            learning_rate: payload.learning_rate.decode_bounded("learning_rate")?,
        })
    }
}

/// Decodes the payload of a `JobCreated` event into a job
pub fn decode_job_created(event: &LedgerEvent) -> Result<NewJob, DecodeError> {
    JobCreatedPayload::from_value(&event.parsed_json)?.try_into()
}
