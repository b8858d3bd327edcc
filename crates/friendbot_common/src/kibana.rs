//! Dashboard/visualization collaborator client.
//!
//! Thin typed client over the Kibana saved-objects and data-view APIs.
//! Responses come back as status + decoded JSON body so the provisioning
//! layer can tell "created" from "already there" from "broken" without
//! re-parsing anywhere else.

use crate::errors::DeployError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Decoded response from a provisioning call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Resource-creation surface of the dashboard service.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn create_data_view(
        &self,
        title: &str,
        time_field: &str,
    ) -> Result<ApiResponse, DeployError>;

    /// Look up an existing data view id by title. The create path does not
    /// return an id when the view already exists, so dependent steps go
    /// through this.
    async fn find_data_view_id(&self, title: &str) -> Result<Option<String>, DeployError>;

    async fn set_field_format(
        &self,
        view_id: &str,
        field: &str,
        format: Value,
    ) -> Result<ApiResponse, DeployError>;

    async fn create_saved_search(
        &self,
        object_id: &str,
        title: &str,
        query: &str,
        view_id: &str,
    ) -> Result<ApiResponse, DeployError>;
}

/// Kibana REST client.
pub struct KibanaClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DataViewList {
    data_view: Vec<DataViewEntry>,
}

#[derive(Debug, Deserialize)]
struct DataViewEntry {
    id: String,
    title: String,
}

impl KibanaClient {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<ApiResponse, DeployError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[KIBANA] POST {}", path);
        let response = self
            .client
            .post(&url)
            .header("kbn-xsrf", "true")
            .json(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl DashboardApi for KibanaClient {
    async fn create_data_view(
        &self,
        title: &str,
        time_field: &str,
    ) -> Result<ApiResponse, DeployError> {
        let payload = json!({
            "data_view": {
                "title": title,
                "timeFieldName": time_field,
            }
        });
        self.post("/api/data_views/data_view", &payload).await
    }

    async fn find_data_view_id(&self, title: &str) -> Result<Option<String>, DeployError> {
        let url = format!("{}/api/data_views", self.base_url);
        let response = self.client.get(&url).header("kbn-xsrf", "true").send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let list: DataViewList = response.json().await?;
        Ok(list
            .data_view
            .into_iter()
            .find(|entry| entry.title == title)
            .map(|entry| entry.id))
    }

    async fn set_field_format(
        &self,
        view_id: &str,
        field: &str,
        format: Value,
    ) -> Result<ApiResponse, DeployError> {
        let payload = json!({
            "fields": {
                field: { "format": format }
            }
        });
        self.post(
            &format!("/api/data_views/data_view/{}/fields", view_id),
            &payload,
        )
        .await
    }

    async fn create_saved_search(
        &self,
        object_id: &str,
        title: &str,
        query: &str,
        view_id: &str,
    ) -> Result<ApiResponse, DeployError> {
        let payload = json!({
            "attributes": {
                "title": title,
                "columns": ["level", "message"],
                "sort": [["@timestamp", "desc"]],
                "kibanaSavedObjectMeta": {
                    "searchSourceJSON": json!({
                        "query": { "query": query, "language": "kuery" },
                        "filter": [],
                        "indexRefName": "kibanaSavedObjectMeta.searchSourceJSON.index",
                    }).to_string()
                }
            },
            "references": [{
                "id": view_id,
                "name": "kibanaSavedObjectMeta.searchSourceJSON.index",
                "type": "index-pattern",
            }]
        });
        self.post(&format!("/api/saved_objects/search/{}", object_id), &payload)
            .await
    }
}
