use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::TenantId;

/// Identifier wrapper for marketing campaigns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CampaignId(pub String);

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Sent,
    Failed,
}

impl CampaignStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Sent => "sent",
            CampaignStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub tenant_id: TenantId,
    pub name: String,
    pub status: CampaignStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub timezone: String,
    pub recipients: Vec<String>,
    pub send_attempts: u32,
    pub last_error: Option<String>,
    /// When a poller moved the campaign to `sending`.
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    pub fn draft(
        id: impl Into<String>,
        tenant_id: TenantId,
        name: impl Into<String>,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            id: CampaignId(id.into()),
            tenant_id,
            name: name.into(),
            status: CampaignStatus::Draft,
            scheduled_at: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            recipients,
            send_attempts: 0,
            last_error: None,
            claimed_at: None,
        }
    }

    /// Eligible for pickup by the poller at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Scheduled
            && self.scheduled_at.map_or(false, |at| at <= now)
    }
}

pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Conditional write applied by schedule, reschedule, and cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleUpdate {
    pub status: CampaignStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub timezone: String,
    pub reset_attempts: bool,
}

/// Result of one delivery attempt as written back to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignOutcome {
    pub status: CampaignStatus,
    pub error: Option<String>,
    pub send_attempts: u32,
}

/// Confirmation returned to callers that schedule or reschedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleReceipt {
    pub campaign_id: CampaignId,
    pub status: CampaignStatus,
    pub scheduled_at: DateTime<Utc>,
    pub timezone: String,
}

/// Scheduled campaign annotated with the remaining wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledCampaignView {
    pub campaign_id: CampaignId,
    pub name: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub timezone: String,
    pub send_attempts: u32,
    pub last_error: Option<String>,
    pub time_until_send_secs: i64,
}

impl ScheduledCampaignView {
    pub fn new(campaign: &Campaign, now: DateTime<Utc>) -> Self {
        let time_until_send_secs = campaign
            .scheduled_at
            .map(|at| (at - now).num_seconds().max(0))
            .unwrap_or(0);

        Self {
            campaign_id: campaign.id.clone(),
            name: campaign.name.clone(),
            scheduled_at: campaign.scheduled_at,
            timezone: campaign.timezone.clone(),
            send_attempts: campaign.send_attempts,
            last_error: campaign.last_error.clone(),
            time_until_send_secs,
        }
    }
}
