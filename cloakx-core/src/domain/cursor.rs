//! Event cursor domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in the ledger event log (transaction digest + event sequence)
///
/// Opaque to the relay: it is only ever handed back to the ledger as the
/// starting point of the next query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventId {
    pub tx_digest: String,
    pub event_seq: String,
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_digest, self.event_seq)
    }
}

/// Persisted progress of one tracked event type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub event_type: String,
    pub position: EventId,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
