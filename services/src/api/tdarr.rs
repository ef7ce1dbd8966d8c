use crate::{
    ClientError,
    ServiceClient,
};
use serde_json::{
    json,
    Value,
};

/// Tdarr reads go through `POST /api/v2/cruddb`.
impl ServiceClient {
    async fn cruddb(&self, collection: &str) -> Result<Value, ClientError> {
        self.post_json("cruddb", &json!({ "data": { "collection": collection, "mode": "getAll" } }))
            .await
    }

    pub async fn tdarr_nodes(&self) -> Result<Value, ClientError> {
        self.cruddb("NodeJSONDB").await
    }

    pub async fn tdarr_staged_files(&self) -> Result<Value, ClientError> {
        self.cruddb("StagedJSONDB").await
    }

    pub async fn tdarr_statistics(&self) -> Result<Value, ClientError> {
        self.cruddb("StatisticsJSONDB").await
    }
}
