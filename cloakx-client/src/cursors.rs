//! Cursor endpoints

use crate::RelayClient;
use crate::error::Result;
use cloakx_core::domain::cursor::Cursor;
use cloakx_core::dto::cursor::ResetCursorsResponse;

impl RelayClient {
    /// List the saved cursor of every tracked event type
    pub async fn list_cursors(&self) -> Result<Vec<Cursor>> {
        let url = format!("{}/cursors", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Delete every cursor so the relay replays the event log from genesis
    ///
    /// # Returns
    /// The number of deleted cursors
    pub async fn reset_cursors(&self) -> Result<u64> {
        let url = format!("{}/cursors", self.base_url);
        let response = self.client.delete(&url).send().await?;

        let reset: ResetCursorsResponse = self.handle_response(response).await?;
        Ok(reset.deleted)
    }
}
