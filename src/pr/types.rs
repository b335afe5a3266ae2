use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Lifecycle label written to the store's status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrStatus {
    Open,
    Closed,
    Merged,
    Draft,
}

impl PrStatus {
    pub const ALL: [PrStatus; 4] = [
        PrStatus::Open,
        PrStatus::Closed,
        PrStatus::Merged,
        PrStatus::Draft,
    ];

    /// Select-option label used in the store.
    pub fn label(self) -> &'static str {
        match self {
            PrStatus::Open => "Open",
            PrStatus::Closed => "Closed",
            PrStatus::Merged => "Merged",
            PrStatus::Draft => "Draft",
        }
    }
}

impl std::fmt::Display for PrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of one pull request at event time, with fallbacks already applied.
/// Built fresh per run and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestFact {
    pub number: u64,
    pub title: String,
    pub url: Option<String>,
    pub status: PrStatus,
    pub author: String,
    /// `owner/name`
    pub repository: String,
    /// Source (head) branch
    pub branch: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub merged: bool,
    pub draft: bool,
    pub state: Option<String>,
}

/// Event name plus payload, as handed over by the workflow runner.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub event_name: String,
    pub payload: EventPayload,
}

/// Webhook payload. Every field is optional: non-PR events share this shape
/// and are rejected during extraction, not during parsing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    pub action: Option<String>,
    pub pull_request: Option<PullRequestPayload>,
    pub repository: Option<RepositoryPayload>,
}

/// Pull request object as found in webhook payloads and in
/// `GET /repos/{owner}/{repo}/pulls/{number}` responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestPayload {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub html_url: Option<String>,
    pub state: Option<String>,
    pub draft: Option<bool>,
    pub merged: Option<bool>,
    pub merged_at: Option<DateTime<Utc>>,
    pub user: Option<UserPayload>,
    pub head: Option<BranchPayload>,
    pub base: Option<BranchPayload>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPayload {
    pub login: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BranchPayload {
    #[serde(rename = "ref")]
    pub ref_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryPayload {
    pub full_name: Option<String>,
}

/// Represents the parsed components of a GitHub PR URL.
#[derive(Debug, Clone)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        let labels: Vec<&str> = PrStatus::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["Open", "Closed", "Merged", "Draft"]);
        assert_eq!(PrStatus::Merged.to_string(), "Merged");
    }

    #[test]
    fn test_payload_tolerates_missing_fields() {
        let payload: EventPayload = serde_json::from_str(r#"{"ref": "refs/heads/main"}"#).unwrap();
        assert!(payload.action.is_none());
        assert!(payload.pull_request.is_none());
        assert!(payload.repository.is_none());
    }

    #[test]
    fn test_payload_parses_pull_request() {
        let payload: EventPayload = serde_json::from_str(
            r#"{
                "action": "closed",
                "pull_request": {
                    "number": 7,
                    "state": "closed",
                    "merged": true,
                    "merged_at": "2023-01-02T00:00:00Z",
                    "head": {"ref": "fix"},
                    "base": {"ref": "main"}
                },
                "repository": {"full_name": "o/r"}
            }"#,
        )
        .unwrap();
        let pr = payload.pull_request.unwrap();
        assert_eq!(pr.number, Some(7));
        assert!(pr.merged_at.is_some());
        assert_eq!(pr.head.unwrap().ref_name.as_deref(), Some("fix"));
        assert_eq!(payload.repository.unwrap().full_name.as_deref(), Some("o/r"));
    }
}
