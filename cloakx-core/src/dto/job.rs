//! Job DTOs

use serde::{Deserialize, Serialize};

use crate::domain::job::JobStatus;

/// Query string accepted by `GET /jobs`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
}
