pub mod github;
pub mod status;
pub mod types;

pub use github::GitHubClient;
pub use types::{EventContext, PrStatus, PrUrl, PullRequestFact};

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument};

use status::StatusSignals;
use types::{EventPayload, PullRequestPayload};

/// Event names that carry a `pull_request` object.
const PULL_REQUEST_EVENTS: [&str; 2] = ["pull_request", "pull_request_target"];

#[derive(Debug, Error)]
pub enum PrError {
    #[error("Failed to fetch PR data: {0}")]
    FetchPullRequest(#[source] reqwest::Error),

    #[error("Failed to fetch repository data: {0}")]
    FetchRepository(#[source] reqwest::Error),

    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to read event payload {}: {source}", path.display())]
    EventRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse event payload: {0}")]
    EventParse(#[from] serde_json::Error),
}

/// Parse a GitHub PR URL into its component parts.
/// Expected format: https://github.com/{owner}/{repo}/pull/{number}
pub fn parse_pr_url(url: &str) -> Result<PrUrl, PrError> {
    let invalid = || PrError::InvalidUrl(url.to_string());
    let parsed = reqwest::Url::parse(url).map_err(|_| invalid())?;

    if parsed.host_str() != Some("github.com") {
        return Err(invalid());
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(invalid)?
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.as_slice() {
        [owner, repo, "pull", number] => Ok(PrUrl {
            owner: owner.to_string(),
            repo: repo.to_string(),
            pr_number: number.parse::<u64>().map_err(|_| invalid())?,
        }),
        _ => Err(invalid()),
    }
}

/// Read the event the workflow runner wrote to disk.
///
/// Payloads of events other than pull request triggers are never parsed, so
/// their shape cannot turn an unsupported event into a parse failure.
#[instrument]
pub fn load_event_context(event_name: &str, event_path: &Path) -> Result<EventContext, PrError> {
    if !PULL_REQUEST_EVENTS.contains(&event_name) {
        debug!("skipping payload of non pull request event");
        return Ok(EventContext {
            event_name: event_name.to_string(),
            payload: EventPayload::default(),
        });
    }

    let raw = std::fs::read_to_string(event_path).map_err(|source| PrError::EventRead {
        path: event_path.to_path_buf(),
        source,
    })?;
    let payload: EventPayload = serde_json::from_str(&raw)?;
    debug!(bytes = raw.len(), has_pull_request = payload.pull_request.is_some(), "loaded event payload");

    Ok(EventContext {
        event_name: event_name.to_string(),
        payload,
    })
}

/// Extract the pull request snapshot from an event.
///
/// Returns `None` when the event is not a pull request trigger, or when the
/// payload carries no numbered `pull_request` object.
pub fn extract_fact(context: &EventContext) -> Option<PullRequestFact> {
    if !PULL_REQUEST_EVENTS.contains(&context.event_name.as_str()) {
        debug!(event = %context.event_name, "not a pull request event");
        return None;
    }

    let pr = context.payload.pull_request.as_ref()?;
    let number = pr.number?;
    let repository = context
        .payload
        .repository
        .as_ref()
        .and_then(|repo| repo.full_name.as_deref());

    Some(fact_from_pull_request(
        number,
        pr,
        context.payload.action.as_deref(),
        repository,
    ))
}

/// Build a fact from a pull request object, applying the documented fallbacks.
/// `action` is `None` for pull requests fetched outside an event.
pub fn fact_from_pull_request(
    number: u64,
    pr: &PullRequestPayload,
    action: Option<&str>,
    repository: Option<&str>,
) -> PullRequestFact {
    let draft = pr.draft.unwrap_or(false);
    let merged = pr.merged.unwrap_or(false);
    let status = status::normalize(&StatusSignals {
        draft,
        merged,
        merged_at_present: pr.merged_at.is_some(),
        state: pr.state.as_deref(),
        action,
    });

    PullRequestFact {
        number,
        title: non_empty(pr.title.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("PR #{number}")),
        url: non_empty(pr.html_url.as_deref()).map(str::to_string),
        status,
        author: non_empty(pr.user.as_ref().and_then(|u| u.login.as_deref()))
            .unwrap_or("unknown")
            .to_string(),
        repository: non_empty(repository).unwrap_or("unknown/unknown").to_string(),
        branch: non_empty(pr.head.as_ref().and_then(|h| h.ref_name.as_deref()))
            .unwrap_or("unknown")
            .to_string(),
        created_at: pr.created_at,
        updated_at: pr.updated_at,
        merged,
        draft,
        state: pr.state.clone(),
    }
}

/// Fetch a pull request and its repository from GitHub and snapshot it.
#[instrument(skip(client), fields(owner = %pr_url.owner, repo = %pr_url.repo, pr = pr_url.pr_number))]
pub async fn fetch_fact(client: &GitHubClient, pr_url: &PrUrl) -> Result<PullRequestFact, PrError> {
    let pr = client
        .get_pull_request(&pr_url.owner, &pr_url.repo, pr_url.pr_number)
        .await?;
    let repository = client.get_repository(&pr_url.owner, &pr_url.repo).await?;

    let number = pr.number.unwrap_or(pr_url.pr_number);
    Ok(fact_from_pull_request(
        number,
        &pr,
        None,
        repository.full_name.as_deref(),
    ))
}

/// Log what triggered the run.
pub fn log_pr_event(context: &EventContext) {
    let payload = &context.payload;
    info!(
        event = %context.event_name,
        action = payload.action.as_deref().unwrap_or("-"),
        "GitHub event"
    );

    if let Some(pr) = &payload.pull_request {
        let branch = |b: &Option<types::BranchPayload>| {
            b.as_ref()
                .and_then(|b| b.ref_name.clone())
                .unwrap_or_else(|| "?".to_string())
        };
        info!(
            number = ?pr.number,
            title = pr.title.as_deref().unwrap_or(""),
            state = ?pr.state,
            draft = ?pr.draft,
            merged = ?pr.merged,
            author = ?pr.user.as_ref().and_then(|u| u.login.as_deref()),
            repository = ?payload.repository.as_ref().and_then(|r| r.full_name.as_deref()),
            branches = %format!("{} -> {}", branch(&pr.head), branch(&pr.base)),
            "pull request"
        );
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
