use crate::{
    ClientError,
    ServiceClient,
};
use serde_json::Value;

/// Sonarr and Radarr share the v3 API for the calls used here.
impl ServiceClient {
    pub async fn queue(&self, page: u32, page_size: u32) -> Result<Value, ClientError> {
        self.get_json("queue", &[("page", page.to_string()), ("pageSize", page_size.to_string())])
            .await
    }

    /// Calendar entries between two `YYYY-MM-DD` dates, series included.
    pub async fn calendar(&self, start: &str, end: &str) -> Result<Value, ClientError> {
        self.get_json(
            "calendar",
            &[
                ("includeSeries", "true".to_string()),
                ("start", start.to_string()),
                ("end", end.to_string()),
            ],
        )
        .await
    }
}
