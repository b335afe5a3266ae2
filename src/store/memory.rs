//! In-process `RecordStore` for tests: evaluates filters like Notion does,
//! counts calls, and can be told to fail.

use std::sync::Mutex;

use async_trait::async_trait;

use super::properties::{to_wire_properties, Properties, PropertyValue};
use super::{ApiError, ExternalRecord, Predicate, QueryFilter, RecordStore, StoreError, WriteOp};

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub container_id: String,
    pub properties: Properties,
}

#[derive(Debug, Default)]
struct State {
    records: Vec<StoredRecord>,
    next_id: usize,
    queries: usize,
    creates: usize,
    updates: usize,
    fail_queries: bool,
    fail_writes: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without counting it as a create.
    pub fn insert(&self, container_id: &str, properties: Properties) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("page-{}", state.next_id);
        state.records.push(StoredRecord {
            id: id.clone(),
            container_id: container_id.to_string(),
            properties,
        });
        id
    }

    pub fn records(&self) -> Vec<StoredRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().unwrap().queries
    }

    pub fn create_count(&self) -> usize {
        self.state.lock().unwrap().creates
    }

    pub fn update_count(&self) -> usize {
        self.state.lock().unwrap().updates
    }

    pub fn call_count(&self) -> usize {
        self.query_count() + self.create_count() + self.update_count()
    }

    pub fn fail_queries(&self) {
        self.state.lock().unwrap().fail_queries = true;
    }

    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    fn unavailable() -> ApiError {
        ApiError::Rejected {
            status: 503,
            code: "service_unavailable".to_string(),
            message: "Notion is unavailable.".to_string(),
        }
    }

    fn to_external(record: &StoredRecord) -> ExternalRecord {
        ExternalRecord {
            id: record.id.clone(),
            properties: serde_json::to_value(to_wire_properties(&record.properties)).unwrap(),
        }
    }
}

fn matches(properties: &Properties, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::NumberEquals { property, value } => {
            matches!(properties.get(property), Some(PropertyValue::Number(n)) if n == value)
        }
        Predicate::TextEquals { property, value } => matches!(
            properties.get(property),
            Some(PropertyValue::RichText(s) | PropertyValue::Title(s)) if s == value
        ),
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn query(
        &self,
        container_id: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<ExternalRecord>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.queries += 1;
        if state.fail_queries {
            return Err(StoreError::Query(Self::unavailable()));
        }
        Ok(state
            .records
            .iter()
            .filter(|r| r.container_id == container_id)
            .filter(|r| filter.and.iter().all(|p| matches(&r.properties, p)))
            .map(Self::to_external)
            .collect())
    }

    async fn create_record(
        &self,
        container_id: &str,
        properties: &Properties,
    ) -> Result<ExternalRecord, StoreError> {
        {
            let mut state = self.state.lock().unwrap();
            state.creates += 1;
            if state.fail_writes {
                return Err(StoreError::Write {
                    op: WriteOp::Create,
                    source: Self::unavailable(),
                });
            }
        }
        let id = self.insert(container_id, properties.clone());
        Ok(ExternalRecord {
            id,
            properties: serde_json::to_value(to_wire_properties(properties)).unwrap(),
        })
    }

    async fn update_record(
        &self,
        record_id: &str,
        properties: &Properties,
    ) -> Result<ExternalRecord, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.updates += 1;
        if state.fail_writes {
            return Err(StoreError::Write {
                op: WriteOp::Update,
                source: Self::unavailable(),
            });
        }
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| StoreError::Write {
                op: WriteOp::Update,
                source: ApiError::Rejected {
                    status: 404,
                    code: "object_not_found".to_string(),
                    message: format!("Could not find page with ID: {record_id}."),
                },
            })?;
        // Only the supplied columns change; the rest keep their values.
        record.properties.extend(properties.clone());
        Ok(Self::to_external(record))
    }
}
