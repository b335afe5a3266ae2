pub mod dry_run;
#[cfg(test)]
pub mod memory;
pub mod notion;
pub mod properties;

pub use dry_run::DryRunStore;
pub use notion::NotionClient;
pub use properties::{Properties, PropertyValue};

use async_trait::async_trait;
use thiserror::Error;

/// Failure talking to the store, before any operation context is attached.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message} ({code}, HTTP {status})")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
}

impl std::fmt::Display for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteOp::Create => write!(f, "create"),
            WriteOp::Update => write!(f, "update"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to search Notion database: {0}")]
    Query(#[source] ApiError),

    #[error("Failed to {op} Notion page: {source}")]
    Write {
        op: WriteOp,
        #[source]
        source: ApiError,
    },

    #[error("Cannot access Notion database: {0}")]
    Access(#[source] ApiError),

    #[error("Failed to create Notion database: {0}")]
    CreateDatabase(#[source] ApiError),
}

/// A record (Notion page) as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalRecord {
    pub id: String,
    /// Stored values in the store's own representation.
    pub properties: serde_json::Value,
}

/// Exact-match predicate over one named field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    NumberEquals { property: String, value: u64 },
    TextEquals { property: String, value: String },
}

/// Conjunction of predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    pub and: Vec<Predicate>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number_equals(mut self, property: &str, value: u64) -> Self {
        self.and.push(Predicate::NumberEquals {
            property: property.to_string(),
            value,
        });
        self
    }

    pub fn text_equals(mut self, property: &str, value: &str) -> Self {
        self.and.push(Predicate::TextEquals {
            property: property.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Notion `filter` object.
    pub fn to_wire(&self) -> serde_json::Value {
        let clauses: Vec<serde_json::Value> = self
            .and
            .iter()
            .map(|predicate| match predicate {
                Predicate::NumberEquals { property, value } => serde_json::json!({
                    "property": property,
                    "number": { "equals": value },
                }),
                Predicate::TextEquals { property, value } => serde_json::json!({
                    "property": property,
                    "rich_text": { "equals": value },
                }),
            })
            .collect();
        serde_json::json!({ "and": clauses })
    }
}

/// Structured store holding one record per pull request.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records in `container_id` matching every predicate of `filter`.
    async fn query(
        &self,
        container_id: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<ExternalRecord>, StoreError>;

    async fn create_record(
        &self,
        container_id: &str,
        properties: &Properties,
    ) -> Result<ExternalRecord, StoreError>;

    async fn update_record(
        &self,
        record_id: &str,
        properties: &Properties,
    ) -> Result<ExternalRecord, StoreError>;
}
