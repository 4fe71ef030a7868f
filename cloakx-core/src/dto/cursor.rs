//! Cursor DTOs

use serde::{Deserialize, Serialize};

/// Response of `DELETE /cursors`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetCursorsResponse {
    /// Number of cursor rows removed
    pub deleted: u64,
}
