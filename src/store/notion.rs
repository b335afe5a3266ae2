use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::properties::{to_wire_properties, Properties};
use super::{ApiError, ExternalRecord, QueryFilter, RecordStore, StoreError, WriteOp};
use crate::config::{FieldMapping, LogicalField, Secret};
use crate::pr::PrStatus;

pub const DEFAULT_API_URL: &str = "https://api.notion.com/v1";

/// API version sent with every request; the last one that serves
/// `POST /databases/{id}/query`.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Title given to databases created by `init-database` unless overridden.
pub const DEFAULT_DATABASE_TITLE: &str = "GitHub Pull Requests";

/// Notion REST client. One instance per run.
pub struct NotionClient {
    http: reqwest::Client,
    api_url: String,
    token: Secret,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    id: String,
    #[serde(default)]
    properties: serde_json::Value,
}

impl From<PageResponse> for ExternalRecord {
    fn from(page: PageResponse) -> Self {
        ExternalRecord {
            id: page.id,
            properties: page.properties,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<PageResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Database metadata returned by `verify_database_access`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseInfo {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl NotionClient {
    pub fn new(token: Secret, api_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// GET /databases/{id}
    #[instrument(skip(self))]
    pub async fn verify_database_access(&self, database_id: &str) -> Result<DatabaseInfo, StoreError> {
        let request = self.http.get(format!("{}/databases/{database_id}", self.api_url));
        let info: DatabaseInfo = self.send(request).await.map_err(StoreError::Access)?;
        debug!(columns = info.properties.len(), "database is reachable");
        Ok(info)
    }

    /// POST /databases under `parent_page_id`, with one column per mapped field.
    #[instrument(skip(self, mapping))]
    pub async fn create_database(
        &self,
        parent_page_id: &str,
        title: &str,
        mapping: &FieldMapping,
    ) -> Result<String, StoreError> {
        let body = json!({
            "parent": { "page_id": parent_page_id },
            "title": [{ "text": { "content": title } }],
            "properties": database_schema(mapping),
        });
        let request = self.http.post(format!("{}/databases", self.api_url)).json(&body);
        let page: PageResponse = self.send(request).await.map_err(StoreError::CreateDatabase)?;
        Ok(page.id)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let response = request
            .bearer_auth(self.token.expose())
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                code: if body.code.is_empty() { "unknown".to_string() } else { body.code },
                message: if body.message.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body.message
                },
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RecordStore for NotionClient {
    #[instrument(skip(self, filter), fields(predicates = filter.and.len()))]
    async fn query(
        &self,
        container_id: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<ExternalRecord>, StoreError> {
        let request = self
            .http
            .post(format!("{}/databases/{container_id}/query", self.api_url))
            .json(&json!({ "filter": filter.to_wire() }));
        let response: QueryResponse = self.send(request).await.map_err(StoreError::Query)?;
        debug!(results = response.results.len(), "database query returned");
        Ok(response.results.into_iter().map(ExternalRecord::from).collect())
    }

    #[instrument(skip(self, properties), fields(properties = properties.len()))]
    async fn create_record(
        &self,
        container_id: &str,
        properties: &Properties,
    ) -> Result<ExternalRecord, StoreError> {
        let body = json!({
            "parent": { "database_id": container_id },
            "properties": to_wire_properties(properties),
        });
        let request = self.http.post(format!("{}/pages", self.api_url)).json(&body);
        let page: PageResponse = self.send(request).await.map_err(|source| StoreError::Write {
            op: WriteOp::Create,
            source,
        })?;
        Ok(page.into())
    }

    #[instrument(skip(self, properties), fields(properties = properties.len()))]
    async fn update_record(
        &self,
        record_id: &str,
        properties: &Properties,
    ) -> Result<ExternalRecord, StoreError> {
        let body = json!({ "properties": to_wire_properties(properties) });
        let request = self.http.patch(format!("{}/pages/{record_id}", self.api_url)).json(&body);
        let page: PageResponse = self.send(request).await.map_err(|source| StoreError::Write {
            op: WriteOp::Update,
            source,
        })?;
        Ok(page.into())
    }
}

/// Column definitions matching what a sync writes for `mapping`.
pub fn database_schema(mapping: &FieldMapping) -> serde_json::Map<String, serde_json::Value> {
    LogicalField::ALL
        .iter()
        .filter_map(|field| {
            let name = mapping.get(*field)?;
            let column = match field {
                LogicalField::Title => json!({ "title": {} }),
                LogicalField::Url => json!({ "url": {} }),
                LogicalField::Status => json!({ "select": { "options": status_options() } }),
                LogicalField::Number => json!({ "number": {} }),
                LogicalField::Author | LogicalField::Repository | LogicalField::Branch => {
                    json!({ "rich_text": {} })
                }
            };
            Some((name.to_string(), column))
        })
        .collect()
}

fn status_options() -> Vec<serde_json::Value> {
    PrStatus::ALL
        .iter()
        .map(|status| {
            let color = match status {
                PrStatus::Open => "green",
                PrStatus::Closed => "red",
                PrStatus::Merged => "purple",
                PrStatus::Draft => "yellow",
            };
            json!({ "name": status.label(), "color": color })
        })
        .collect()
}
