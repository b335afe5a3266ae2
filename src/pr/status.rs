use super::types::PrStatus;

/// Raw lifecycle signals a status is derived from.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusSignals<'a> {
    pub draft: bool,
    pub merged: bool,
    pub merged_at_present: bool,
    pub state: Option<&'a str>,
    /// Trigger action of the event, `None` for PRs fetched outside an event.
    pub action: Option<&'a str>,
}

/// Map raw PR flags and the trigger action onto a lifecycle label.
///
/// First match wins: draft, then merged (or closed with a merge timestamp),
/// then closed, then open. Anything else falls back to `Open`.
pub fn normalize(signals: &StatusSignals<'_>) -> PrStatus {
    let action_is = |name: &str| signals.action == Some(name);

    if signals.draft {
        return PrStatus::Draft;
    }
    if signals.merged || (action_is("closed") && signals.merged_at_present) {
        return PrStatus::Merged;
    }
    if signals.state == Some("closed") || action_is("closed") {
        return PrStatus::Closed;
    }
    if signals.state == Some("open") || action_is("opened") || action_is("reopened") {
        return PrStatus::Open;
    }
    PrStatus::Open
}
