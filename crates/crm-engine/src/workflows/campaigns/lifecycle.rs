use serde::Serialize;

use super::domain::CampaignStatus;

/// Events that move a campaign between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignTransition {
    Schedule,
    Reschedule,
    Cancel,
    Dispatch,
    Delivered,
    Requeue,
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {transition:?} a campaign that is {from}")]
pub struct InvalidTransition {
    pub from: CampaignStatus,
    pub transition: CampaignTransition,
}

impl CampaignStatus {
    /// Status reached by applying `transition`, or an error when the state
    /// machine has no such edge.
    pub fn apply(self, transition: CampaignTransition) -> Result<CampaignStatus, InvalidTransition> {
        use CampaignStatus::*;
        use CampaignTransition::*;

        let next = match (self, transition) {
            (Draft | Scheduled | Failed, Schedule) => Scheduled,
            (Scheduled, Reschedule) => Scheduled,
            (Scheduled, Cancel) => Draft,
            (Scheduled, Dispatch) => Sending,
            (Sending, Delivered) => Sent,
            (Sending, Requeue) => Scheduled,
            (Sending, GiveUp) => Failed,
            (from, transition) => return Err(InvalidTransition { from, transition }),
        };
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Sent)
    }
}
