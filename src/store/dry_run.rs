use async_trait::async_trait;
use tracing::info;

use super::properties::{to_wire_properties, Properties};
use super::{ExternalRecord, QueryFilter, RecordStore, StoreError};

/// Placeholder identifier reported for a record a dry run would have created.
pub const DRY_RUN_RECORD_ID: &str = "dry-run";

/// Reads through to the wrapped store but only logs mutations.
pub struct DryRunStore<S> {
    inner: S,
}

impl<S: RecordStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    fn log_properties(action: &str, target: &str, properties: &Properties) {
        let body = serde_json::to_string(&to_wire_properties(properties))
            .unwrap_or_else(|e| format!("<unserializable: {e}>"));
        info!(target_id = target, properties = %body, "dry run: would {action} record");
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for DryRunStore<S> {
    async fn query(
        &self,
        container_id: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<ExternalRecord>, StoreError> {
        self.inner.query(container_id, filter).await
    }

    async fn create_record(
        &self,
        container_id: &str,
        properties: &Properties,
    ) -> Result<ExternalRecord, StoreError> {
        Self::log_properties("create", container_id, properties);
        Ok(ExternalRecord {
            id: DRY_RUN_RECORD_ID.to_string(),
            properties: serde_json::Value::Null,
        })
    }

    async fn update_record(
        &self,
        record_id: &str,
        properties: &Properties,
    ) -> Result<ExternalRecord, StoreError> {
        Self::log_properties("update", record_id, properties);
        Ok(ExternalRecord {
            id: record_id.to_string(),
            properties: serde_json::Value::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::store::PropertyValue;

    fn properties() -> Properties {
        let mut properties = Properties::new();
        properties.insert("PR Number".to_string(), PropertyValue::Number(7));
        properties
    }

    #[tokio::test]
    async fn test_dry_run_reads_but_never_writes() {
        let store = DryRunStore::new(InMemoryStore::new());
        let existing = store.inner.insert("db", properties());

        let found = store
            .query("db", &QueryFilter::new().number_equals("PR Number", 7))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let created = store.create_record("db", &properties()).await.unwrap();
        assert_eq!(created.id, DRY_RUN_RECORD_ID);
        let updated = store.update_record(&existing, &properties()).await.unwrap();
        assert_eq!(updated.id, existing);

        assert_eq!(store.inner.query_count(), 1);
        assert_eq!(store.inner.create_count(), 0);
        assert_eq!(store.inner.update_count(), 0);
        assert_eq!(store.inner.records().len(), 1);
    }
}
