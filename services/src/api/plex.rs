use crate::{
    ClientError,
    ServiceClient,
};
use serde_json::Value;

fn container_list(mut response: Value, key: &str) -> Vec<Value> {
    match response["MediaContainer"][key].take() {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

impl ServiceClient {
    /// Currently playing sessions (`MediaContainer.Metadata`).
    pub async fn plex_sessions(&self) -> Result<Vec<Value>, ClientError> {
        let response = self.get_json("status/sessions", &[]).await?;
        Ok(container_list(response, "Metadata"))
    }

    /// Active transcodes (`MediaContainer.TranscodeSession`).
    pub async fn plex_transcode_sessions(&self) -> Result<Vec<Value>, ClientError> {
        let response = self.get_json("transcode/sessions", &[]).await?;
        Ok(container_list(response, "TranscodeSession"))
    }
}
