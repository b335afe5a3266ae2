//! Reconciliation of one pull request against its store record.
//!
//! The record for a PR is located by (number, repository) before anything is
//! written, so repeated events for the same PR keep updating a single record.

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::{ConfigError, FieldMapping, LogicalField};
use crate::pr::PullRequestFact;
use crate::store::{ExternalRecord, Properties, PropertyValue, QueryFilter, RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Mapping(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Updated,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncAction::Created => write!(f, "created"),
            SyncAction::Updated => write!(f, "updated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub record_id: String,
    pub action: SyncAction,
}

/// Find the record for a PR, if one exists.
///
/// Issues a single query: exact number match AND exact repository match.
/// When several records match, the first one the store returns wins.
#[instrument(skip(store))]
pub async fn find_record(
    store: &dyn RecordStore,
    container_id: &str,
    pr_number: u64,
    repository: &str,
    number_field: &str,
    repository_field: &str,
) -> Result<Option<ExternalRecord>, StoreError> {
    let filter = QueryFilter::new()
        .number_equals(number_field, pr_number)
        .text_equals(repository_field, repository);

    let matches = store.query(container_id, &filter).await?;
    if matches.len() > 1 {
        debug!(count = matches.len(), "several records match, using the first");
    }
    Ok(matches.into_iter().next())
}

/// Column values for `fact`. Unmapped fields and empty values are left out
/// so an update never blanks a column.
pub fn build_properties(fact: &PullRequestFact, mapping: &FieldMapping) -> Properties {
    let mut properties = Properties::new();

    for field in LogicalField::ALL {
        let Some(name) = mapping.get(field) else {
            continue;
        };
        let value = match field {
            LogicalField::Title => text(&fact.title).map(PropertyValue::Title),
            LogicalField::Url => fact.url.as_deref().and_then(text).map(PropertyValue::Url),
            LogicalField::Status => Some(PropertyValue::Select(fact.status.label().to_string())),
            LogicalField::Number => Some(PropertyValue::Number(fact.number)),
            LogicalField::Author => text(&fact.author).map(PropertyValue::RichText),
            LogicalField::Repository => text(&fact.repository).map(PropertyValue::RichText),
            LogicalField::Branch => text(&fact.branch).map(PropertyValue::RichText),
        };
        if let Some(value) = value {
            properties.insert(name.to_string(), value);
        }
    }

    properties
}

/// Option name held by a select column of a fetched record.
fn stored_select<'a>(record: &'a ExternalRecord, field: &str) -> Option<&'a str> {
    record.properties.get(field)?.get("select")?.get("name")?.as_str()
}

fn text(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Create the PR's record, or update it when it already exists.
///
/// Performs exactly one lookup followed by exactly one write. The number and
/// repository fields must be mapped; nothing is sent to the store otherwise.
#[instrument(skip(store, fact, mapping), fields(pr = fact.number, repository = %fact.repository, status = %fact.status))]
pub async fn reconcile(
    store: &dyn RecordStore,
    container_id: &str,
    fact: &PullRequestFact,
    mapping: &FieldMapping,
) -> Result<SyncOutcome, SyncError> {
    mapping.validate()?;
    let existing = find_record(
        store,
        container_id,
        fact.number,
        &fact.repository,
        mapping.require(LogicalField::Number)?,
        mapping.require(LogicalField::Repository)?,
    )
    .await?;

    let properties = build_properties(fact, mapping);
    debug!(columns = properties.len(), "built record properties");

    let outcome = match existing {
        Some(record) => {
            if let Some(status_field) = mapping.get(LogicalField::Status) {
                let previous = stored_select(&record, status_field);
                if previous != Some(fact.status.label()) {
                    info!(from = previous.unwrap_or("-"), to = %fact.status, "status changed");
                }
            }
            let updated = store.update_record(&record.id, &properties).await?;
            info!(record = %updated.id, "updated existing record");
            SyncOutcome {
                record_id: updated.id,
                action: SyncAction::Updated,
            }
        }
        None => {
            let created = store.create_record(container_id, &properties).await?;
            info!(record = %created.id, "created new record");
            SyncOutcome {
                record_id: created.id,
                action: SyncAction::Created,
            }
        }
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::tests::{merged_event, opened_event};
    use crate::pr::{extract_fact, PrStatus};
    use crate::store::memory::InMemoryStore;
    use crate::store::WriteOp;

    const DB: &str = "12345678123412341234123456789012";

    fn fact() -> PullRequestFact {
        extract_fact(&opened_event()).unwrap()
    }

    #[test]
    fn test_build_properties_default_mapping() {
        let properties = build_properties(&fact(), &FieldMapping::default());
        assert_eq!(properties.len(), 7);
        assert_eq!(properties["Title"], PropertyValue::Title("Test PR".to_string()));
        assert_eq!(
            properties["GitHub URL"],
            PropertyValue::Url("https://github.com/o/r/pull/123".to_string())
        );
        assert_eq!(properties["Status"], PropertyValue::Select("Open".to_string()));
        assert_eq!(properties["PR Number"], PropertyValue::Number(123));
        assert_eq!(properties["Author"], PropertyValue::RichText("alice".to_string()));
        assert_eq!(properties["Repository"], PropertyValue::RichText("o/r".to_string()));
        assert_eq!(properties["Branch"], PropertyValue::RichText("feat".to_string()));
    }

    #[test]
    fn test_build_properties_omits_absent_values() {
        let mut fact = fact();
        fact.url = None;
        fact.branch = String::new();

        let properties = build_properties(&fact, &FieldMapping::default());
        assert!(!properties.contains_key("GitHub URL"));
        assert!(!properties.contains_key("Branch"));
        assert_eq!(properties.len(), 5);
    }

    #[test]
    fn test_build_properties_omits_unmapped_fields() {
        let mut mapping = FieldMapping::default();
        mapping.remove(LogicalField::Author);
        mapping.set(LogicalField::Status, "State");

        let properties = build_properties(&fact(), &mapping);
        assert!(!properties.contains_key("Author"));
        assert!(!properties.contains_key("Status"));
        assert_eq!(properties["State"], PropertyValue::Select("Open".to_string()));
    }

    #[tokio::test]
    async fn test_find_record_matches_number_and_repository() {
        let store = InMemoryStore::new();
        let target = store.insert(DB, build_properties(&fact(), &FieldMapping::default()));

        let mut other_repo = fact();
        other_repo.repository = "o/other".to_string();
        store.insert(DB, build_properties(&other_repo, &FieldMapping::default()));

        let found = find_record(&store, DB, 123, "o/r", "PR Number", "Repository")
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, target);

        let missing = find_record(&store, DB, 124, "o/r", "PR Number", "Repository")
            .await
            .unwrap();
        assert!(missing.is_none());
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_find_record_returns_first_of_duplicates() {
        let store = InMemoryStore::new();
        let first = store.insert(DB, build_properties(&fact(), &FieldMapping::default()));
        store.insert(DB, build_properties(&fact(), &FieldMapping::default()));

        let found = find_record(&store, DB, 123, "o/r", "PR Number", "Repository")
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, first);
    }

    #[tokio::test]
    async fn test_find_record_wraps_query_failure() {
        let store = InMemoryStore::new();
        store.fail_queries();
        let err = find_record(&store, DB, 123, "o/r", "PR Number", "Repository")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
        assert!(err.to_string().starts_with("Failed to search Notion database: "));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = InMemoryStore::new();
        let mapping = FieldMapping::default();

        let first = reconcile(&store, DB, &fact(), &mapping).await.unwrap();
        let second = reconcile(&store, DB, &fact(), &mapping).await.unwrap();

        assert_eq!(first.action, SyncAction::Created);
        assert_eq!(second.action, SyncAction::Updated);
        assert_eq!(first.record_id, second.record_id);
        assert_eq!(store.create_count(), 1);
        assert_eq!(store.update_count(), 1);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_updates_after_merge() {
        let store = InMemoryStore::new();
        let mapping = FieldMapping::default();
        let created = reconcile(&store, DB, &fact(), &mapping).await.unwrap();

        let merged = extract_fact(&merged_event()).unwrap();
        assert_eq!(merged.status, PrStatus::Merged);
        let outcome = reconcile(&store, DB, &merged, &mapping).await.unwrap();

        assert_eq!(outcome.action, SyncAction::Updated);
        assert_eq!(outcome.record_id, created.record_id);
        assert_eq!(store.create_count(), 1);
        let record = &store.records()[0];
        assert_eq!(record.properties["Status"], PropertyValue::Select("Merged".to_string()));
    }

    #[tokio::test]
    async fn test_reconcile_keeps_records_per_repository() {
        let store = InMemoryStore::new();
        let mapping = FieldMapping::default();
        let mut other = fact();
        other.repository = "o/other".to_string();

        reconcile(&store, DB, &fact(), &mapping).await.unwrap();
        let outcome = reconcile(&store, DB, &other, &mapping).await.unwrap();

        assert_eq!(outcome.action, SyncAction::Created);
        assert_eq!(store.records().len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_leaves_unmapped_columns_alone() {
        let store = InMemoryStore::new();
        let mut properties = build_properties(&fact(), &FieldMapping::default());
        properties.insert("Notes".to_string(), PropertyValue::RichText("keep me".to_string()));
        store.insert(DB, properties);

        reconcile(&store, DB, &fact(), &FieldMapping::default()).await.unwrap();
        let record = &store.records()[0];
        assert_eq!(record.properties["Notes"], PropertyValue::RichText("keep me".to_string()));
    }

    #[tokio::test]
    async fn test_reconcile_write_failure_propagates() {
        let store = InMemoryStore::new();
        store.fail_writes();
        let err = reconcile(&store, DB, &fact(), &FieldMapping::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::Write { .. })));
        assert!(err.to_string().starts_with("Failed to create Notion page: "));
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_update_failure_propagates() {
        let store = InMemoryStore::new();
        let mapping = FieldMapping::default();
        let first = reconcile(&store, DB, &fact(), &mapping).await.unwrap();
        store.fail_writes();

        let merged = extract_fact(&merged_event()).unwrap();
        let err = reconcile(&store, DB, &merged, &mapping).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Store(StoreError::Write { op: WriteOp::Update, .. })
        ));
        assert!(err.to_string().starts_with("Failed to update Notion page: "));

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, first.record_id);
        assert_eq!(records[0].properties["Status"], PropertyValue::Select("Open".to_string()));
    }

    #[tokio::test]
    async fn test_reconcile_requires_lookup_key_mapping() {
        let store = InMemoryStore::new();
        let mut mapping = FieldMapping::default();
        mapping.remove(LogicalField::Number);

        let err = reconcile(&store, DB, &fact(), &mapping).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Mapping(ConfigError::MissingFieldMapping(LogicalField::Number))
        ));
        assert_eq!(store.call_count(), 0);
    }

    #[test]
    fn test_stored_select() {
        let record = ExternalRecord {
            id: "page-1".to_string(),
            properties: serde_json::json!({ "Status": { "select": { "name": "Open" } } }),
        };
        assert_eq!(stored_select(&record, "Status"), Some("Open"));
        assert_eq!(stored_select(&record, "Branch"), None);
    }

    #[test]
    fn test_sync_action_display() {
        assert_eq!(SyncAction::Created.to_string(), "created");
        assert_eq!(SyncAction::Updated.to_string(), "updated");
    }
}
