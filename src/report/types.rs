use crate::pr::PrStatus;
use crate::sync::SyncAction;

/// What a completed sync did, for display.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// PR number
    pub pr_number: u64,
    /// PR title
    pub pr_title: String,
    /// `owner/name`
    pub repository: String,
    /// PR author
    pub author: String,
    /// Source branch
    pub branch: String,
    /// Status written to the record
    pub status: PrStatus,
    /// Record that was created or updated
    pub record_id: String,
    pub action: SyncAction,
    /// Mutation was only logged
    pub dry_run: bool,
}
