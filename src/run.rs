use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConfigError, FieldMapping, Settings};
use crate::pr::{self, EventContext, PrError, PullRequestFact};
use crate::runtime::{ActionRuntime, RuntimeError};
use crate::store::notion::DatabaseInfo;
use crate::store::{RecordStore, StoreError};
use crate::sync::{self, SyncAction, SyncError, SyncOutcome};

pub const UNSUPPORTED_EVENT_MESSAGE: &str = "This action can only be triggered by pull request events";

pub const OUTPUT_PAGE_ID: &str = "notion-page-id";
pub const OUTPUT_SYNC_STATUS: &str = "sync-status";

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] PrError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// How a run ended when nothing went wrong at the transport level.
#[derive(Debug)]
pub enum RunOutcome {
    Synced {
        fact: PullRequestFact,
        outcome: SyncOutcome,
    },
    /// The trigger did not describe a pull request. Nothing was sent to the store.
    Unsupported,
}

/// Sync the pull request an event describes.
#[instrument(skip_all, fields(event = %context.event_name))]
pub async fn sync_event(
    runtime: &dyn ActionRuntime,
    store: &dyn RecordStore,
    settings: &Settings,
    context: &EventContext,
) -> Result<RunOutcome, RunError> {
    let Some(fact) = pr::extract_fact(context) else {
        return Ok(RunOutcome::Unsupported);
    };
    debug!(
        status = %fact.status,
        state = ?fact.state,
        draft = fact.draft,
        merged = fact.merged,
        created_at = ?fact.created_at,
        updated_at = ?fact.updated_at,
        "derived pull request status"
    );

    runtime.info(&format!("Processing PR #{}: {}", fact.number, fact.title));
    runtime.info(&format!(
        "Event: {}, Action: {}",
        context.event_name,
        context.payload.action.as_deref().unwrap_or("none")
    ));

    let outcome = sync_fact(runtime, store, &settings.database_id, &settings.mapping, &fact).await?;
    Ok(RunOutcome::Synced { fact, outcome })
}

/// Reconcile one fact and publish the run outputs.
pub async fn sync_fact(
    runtime: &dyn ActionRuntime,
    store: &dyn RecordStore,
    database_id: &str,
    mapping: &FieldMapping,
    fact: &PullRequestFact,
) -> Result<SyncOutcome, RunError> {
    let outcome = sync::reconcile(store, database_id, fact, mapping).await?;
    match outcome.action {
        SyncAction::Updated => runtime.info(&format!("Updated existing Notion page: {}", outcome.record_id)),
        SyncAction::Created => runtime.info(&format!("Created new Notion page: {}", outcome.record_id)),
    }

    runtime.set_output(OUTPUT_PAGE_ID, &outcome.record_id)?;
    runtime.set_output(OUTPUT_SYNC_STATUS, &outcome.action.to_string())?;
    runtime.info(&format!("Successfully synced PR #{} with Notion", fact.number));
    Ok(outcome)
}

/// Mapped column names the database does not have.
pub fn missing_columns(info: &DatabaseInfo, mapping: &FieldMapping) -> Vec<String> {
    crate::config::LogicalField::ALL
        .iter()
        .filter_map(|field| mapping.get(*field))
        .filter(|name| !info.properties.contains_key(*name))
        .map(str::to_string)
        .collect()
}

/// Report a database check through the runtime. Missing columns are
/// warnings: Notion rejects writes to them, but the database is reachable.
pub fn report_database(runtime: &dyn ActionRuntime, info: &DatabaseInfo, mapping: &FieldMapping) {
    runtime.info(&format!("Notion database {} is accessible", info.id));
    if let Some(url) = &info.url {
        runtime.info(url);
    }
    for column in missing_columns(info, mapping) {
        warn!(column = %column, "mapped column not found in database");
        runtime.info(&format!("Missing column: {column}"));
    }
}

/// Route the result of a run to the runtime. Returns whether the run succeeded.
pub fn finish(runtime: &dyn ActionRuntime, result: Result<RunOutcome, RunError>) -> bool {
    match result {
        Ok(RunOutcome::Synced { fact, outcome }) => {
            info!(pr = fact.number, record = %outcome.record_id, action = %outcome.action, "sync complete");
            true
        }
        Ok(RunOutcome::Unsupported) => {
            runtime.fail(UNSUPPORTED_EVENT_MESSAGE);
            false
        }
        Err(err) => {
            error!("Error: {err}");
            runtime.fail(&err.to_string());
            false
        }
    }
}
