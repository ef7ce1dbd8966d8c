use crate::{
    ClientError,
    ServiceClient,
};
use serde_json::Value;

/// SABnzbd routes everything through `/api`; `mode` picks the operation.
impl ServiceClient {
    pub async fn sabnzbd_api(&self, mode: &str) -> Result<Value, ClientError> {
        self.get_json("", &[("mode", mode.to_string())]).await
    }

    pub async fn sabnzbd_queue(&self) -> Result<Value, ClientError> {
        self.sabnzbd_api("queue").await
    }

    pub async fn sabnzbd_version(&self) -> Result<Value, ClientError> {
        self.sabnzbd_api("version").await
    }
}
