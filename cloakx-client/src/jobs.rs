//! Job endpoints

use crate::RelayClient;
use crate::error::Result;
use cloakx_core::domain::job::{Job, JobId, JobStatus};
use cloakx_core::dto::job::JobListQuery;

impl RelayClient {
    /// List jobs, optionally only those in `status`
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let url = format!("{}/jobs", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&JobListQuery { status })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a job by its ledger id
    pub async fn get_job(&self, job_id: JobId) -> Result<Job> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
