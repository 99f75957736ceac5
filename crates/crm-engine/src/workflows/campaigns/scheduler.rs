use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::workflows::{RepositoryError, TenantId};

use super::delegate::{CampaignSender, DelegateError};
use super::domain::{
    Campaign, CampaignId, CampaignOutcome, CampaignStatus, ScheduleReceipt, ScheduleUpdate,
    ScheduledCampaignView,
};
use super::lifecycle::{CampaignTransition, InvalidTransition};
use super::repository::CampaignRepository;

const MAX_TIMEZONE_LEN: usize = 64;
/// Slack on top of the send timeout before a `sending` claim counts as abandoned.
const CLAIM_GRACE: Duration = Duration::from_secs(60);

/// Delivery guard rails applied to every due campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub send_timeout: Duration,
    /// Attempts after which a failing campaign is parked as `failed`.
    /// `None` keeps requeueing forever.
    pub max_attempts: Option<u32>,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(30),
            max_attempts: Some(10),
        }
    }
}

/// Tally of one poll. `processed` counts every due campaign attempted,
/// successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub processed: usize,
    pub sent: usize,
    pub requeued: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
    /// Abandoned `sending` claims returned to `scheduled` before the poll.
    pub reclaimed: usize,
    pub ran_at: DateTime<Utc>,
}

impl DispatchSummary {
    fn new(ran_at: DateTime<Utc>) -> Self {
        Self {
            processed: 0,
            sent: 0,
            requeued: 0,
            failed: 0,
            skipped: 0,
            errored: 0,
            reclaimed: 0,
            ran_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchOutcome {
    Sent,
    Requeued,
    GaveUp,
    Skipped,
}

/// Moves campaigns through their schedule and hands due ones to the sender.
pub struct CampaignScheduler<R, S> {
    repository: Arc<R>,
    sender: Arc<S>,
    policy: DispatchPolicy,
}

impl<R, S> CampaignScheduler<R, S>
where
    R: CampaignRepository + 'static,
    S: CampaignSender + 'static,
{
    pub fn new(repository: Arc<R>, sender: Arc<S>, policy: DispatchPolicy) -> Self {
        Self {
            repository,
            sender,
            policy,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Schedule a draft (or failed) campaign, or move an already scheduled one.
    pub fn schedule(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
        scheduled_at: DateTime<Utc>,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<ScheduleReceipt, SchedulerError> {
        ensure_future(scheduled_at, now, "scheduled time must be in the future")?;
        let timezone = normalize_timezone(timezone)?;
        let campaign = self.load(tenant_id, campaign_id)?;
        let status = campaign.status.apply(CampaignTransition::Schedule)?;

        let update = ScheduleUpdate {
            status,
            scheduled_at: Some(scheduled_at),
            timezone: timezone.clone(),
            reset_attempts: campaign.status != CampaignStatus::Scheduled,
        };
        self.apply_update(tenant_id, campaign_id, campaign.status, update)?;

        info!(
            tenant = %tenant_id,
            campaign = %campaign_id,
            %scheduled_at,
            %timezone,
            "campaign scheduled"
        );

        Ok(ScheduleReceipt {
            campaign_id: campaign_id.clone(),
            status,
            scheduled_at,
            timezone,
        })
    }

    /// Move a scheduled campaign to a new future send time.
    pub fn reschedule(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
        new_scheduled_at: DateTime<Utc>,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<ScheduleReceipt, SchedulerError> {
        ensure_future(new_scheduled_at, now, "new scheduled time must be in the future")?;
        let timezone = normalize_timezone(timezone)?;
        let campaign = self.load(tenant_id, campaign_id)?;
        let status = campaign.status.apply(CampaignTransition::Reschedule)?;

        let update = ScheduleUpdate {
            status,
            scheduled_at: Some(new_scheduled_at),
            timezone: timezone.clone(),
            reset_attempts: false,
        };
        self.apply_update(tenant_id, campaign_id, campaign.status, update)?;

        info!(
            tenant = %tenant_id,
            campaign = %campaign_id,
            scheduled_at = %new_scheduled_at,
            "campaign rescheduled"
        );

        Ok(ScheduleReceipt {
            campaign_id: campaign_id.clone(),
            status,
            scheduled_at: new_scheduled_at,
            timezone,
        })
    }

    /// Return a scheduled campaign to draft. Anything not currently scheduled
    /// is rejected with [`SchedulerError::InvalidTransition`].
    pub fn cancel(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
    ) -> Result<CampaignStatus, SchedulerError> {
        let campaign = self.load(tenant_id, campaign_id)?;
        let status = campaign.status.apply(CampaignTransition::Cancel)?;

        let update = ScheduleUpdate {
            status,
            scheduled_at: None,
            timezone: campaign.timezone.clone(),
            reset_attempts: true,
        };
        self.apply_update(tenant_id, campaign_id, campaign.status, update)?;

        info!(tenant = %tenant_id, campaign = %campaign_id, "scheduled campaign cancelled");
        Ok(status)
    }

    /// Scheduled campaigns for a tenant, soonest first.
    pub fn scheduled_campaigns(
        &self,
        tenant_id: &TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledCampaignView>, SchedulerError> {
        let mut campaigns = self.repository.scheduled_for_tenant(tenant_id)?;
        campaigns.sort_by_key(|campaign| campaign.scheduled_at);
        Ok(campaigns
            .iter()
            .map(|campaign| ScheduledCampaignView::new(campaign, now))
            .collect())
    }

    /// Send every campaign that is due at `now`.
    ///
    /// Claims older than the send timeout plus a minute of grace are released
    /// first so a poller that died mid-send does not strand its campaigns.
    /// Only the initial due-campaign query can fail the whole poll; delegate
    /// and storage errors on individual campaigns are logged and counted.
    pub async fn process_due_campaigns(
        &self,
        now: DateTime<Utc>,
    ) -> Result<DispatchSummary, SchedulerError> {
        let reclaimed = self.release_stale_claims(now);

        let due: Vec<Campaign> = self
            .repository
            .get_due_campaigns(now)?
            .into_iter()
            .filter(|campaign| campaign.is_due(now))
            .collect();

        info!(due = due.len(), "processing due campaigns");

        let mut summary = DispatchSummary::new(now);
        summary.reclaimed = reclaimed;
        for campaign in &due {
            summary.processed += 1;
            match self.dispatch(campaign, now).await {
                Ok(DispatchOutcome::Sent) => summary.sent += 1,
                Ok(DispatchOutcome::Requeued) => summary.requeued += 1,
                Ok(DispatchOutcome::GaveUp) => summary.failed += 1,
                Ok(DispatchOutcome::Skipped) => summary.skipped += 1,
                Err(err) => {
                    summary.errored += 1;
                    error!(
                        tenant = %campaign.tenant_id,
                        campaign = %campaign.id,
                        error = %err,
                        "campaign dispatch aborted"
                    );
                }
            }
        }

        info!(
            processed = summary.processed,
            sent = summary.sent,
            requeued = summary.requeued,
            failed = summary.failed,
            skipped = summary.skipped,
            errored = summary.errored,
            reclaimed = summary.reclaimed,
            "campaign poll finished"
        );

        Ok(summary)
    }

    fn release_stale_claims(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = self
            .policy
            .send_timeout
            .checked_add(CLAIM_GRACE)
            .and_then(|window| chrono::Duration::from_std(window).ok())
            .and_then(|window| now.checked_sub_signed(window))
        else {
            return 0;
        };
        match self.repository.release_stale_claims(cutoff) {
            Ok(released) => {
                for campaign_id in &released {
                    warn!(campaign = %campaign_id, %cutoff, "released abandoned delivery claim");
                }
                released.len()
            }
            Err(err) => {
                warn!(error = %err, "stale claim sweep failed");
                0
            }
        }
    }

    async fn dispatch(
        &self,
        campaign: &Campaign,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, SchedulerError> {
        let sending = campaign.status.apply(CampaignTransition::Dispatch)?;
        let Some(scheduled_at) = campaign.scheduled_at else {
            return Ok(DispatchOutcome::Skipped);
        };
        let claimed = self
            .repository
            .claim_due_campaign(&campaign.id, scheduled_at, now)?;
        if !claimed {
            debug!(
                campaign = %campaign.id,
                "campaign claimed or moved by another writer since the due query"
            );
            return Ok(DispatchOutcome::Skipped);
        }

        let attempt = campaign.send_attempts.saturating_add(1);
        info!(
            tenant = %campaign.tenant_id,
            campaign = %campaign.id,
            name = %campaign.name,
            attempt,
            "sending campaign"
        );

        let result = match tokio::time::timeout(self.policy.send_timeout, self.sender.send(campaign))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(DelegateError::TimedOut(self.policy.send_timeout)),
        };

        match result {
            Ok(receipt) => {
                let status = sending.apply(CampaignTransition::Delivered)?;
                self.record_outcome(
                    &campaign.id,
                    sending,
                    CampaignOutcome {
                        status,
                        error: None,
                        send_attempts: attempt,
                    },
                )?;
                info!(
                    campaign = %campaign.id,
                    delivered = receipt.delivered,
                    "campaign sent"
                );
                Ok(DispatchOutcome::Sent)
            }
            Err(err) => {
                let exhausted = self
                    .policy
                    .max_attempts
                    .map_or(false, |max| attempt >= max);
                let transition = if exhausted {
                    CampaignTransition::GiveUp
                } else {
                    CampaignTransition::Requeue
                };
                let status = sending.apply(transition)?;
                self.record_outcome(
                    &campaign.id,
                    sending,
                    CampaignOutcome {
                        status,
                        error: Some(err.to_string()),
                        send_attempts: attempt,
                    },
                )?;
                warn!(
                    campaign = %campaign.id,
                    attempt,
                    error = %err,
                    status = %status,
                    "campaign send failed"
                );
                Ok(if exhausted {
                    DispatchOutcome::GaveUp
                } else {
                    DispatchOutcome::Requeued
                })
            }
        }
    }

    /// Persist a delivery outcome. When that write fails the claim is still
    /// moved off `sending` to the outcome's status so the campaign is not
    /// stranded; the original error is returned either way.
    fn record_outcome(
        &self,
        campaign_id: &CampaignId,
        sending: CampaignStatus,
        outcome: CampaignOutcome,
    ) -> Result<(), SchedulerError> {
        let status = outcome.status;
        let Err(err) = self.repository.record_campaign_outcome(campaign_id, outcome) else {
            return Ok(());
        };
        match self
            .repository
            .compare_and_swap_campaign_status(campaign_id, sending, status)
        {
            Ok(true) => warn!(
                campaign = %campaign_id,
                %status,
                error = %err,
                "outcome write failed, status settled without attempt details"
            ),
            Ok(false) => {}
            Err(settle_err) => error!(
                campaign = %campaign_id,
                error = %settle_err,
                "could not settle claim after outcome write failed"
            ),
        }
        Err(err.into())
    }

    fn load(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
    ) -> Result<Campaign, SchedulerError> {
        self.repository
            .fetch(tenant_id, campaign_id)?
            .ok_or_else(|| SchedulerError::NotFound(campaign_id.clone()))
    }

    fn apply_update(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
        expected: CampaignStatus,
        update: ScheduleUpdate,
    ) -> Result<(), SchedulerError> {
        if self
            .repository
            .update_schedule(tenant_id, campaign_id, expected, update)?
        {
            Ok(())
        } else {
            Err(SchedulerError::StatusChanged(campaign_id.clone()))
        }
    }
}

fn ensure_future(
    at: DateTime<Utc>,
    now: DateTime<Utc>,
    message: &str,
) -> Result<(), SchedulerError> {
    if at <= now {
        return Err(SchedulerError::Validation(message.to_string()));
    }
    Ok(())
}

fn normalize_timezone(raw: &str) -> Result<String, SchedulerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SchedulerError::Validation("timezone must not be empty".to_string()));
    }
    if trimmed.len() > MAX_TIMEZONE_LEN || trimmed.chars().any(char::is_whitespace) {
        return Err(SchedulerError::Validation(format!(
            "timezone '{trimmed}' is not a valid zone name"
        )));
    }
    Ok(trimmed.to_string())
}

/// Error raised by the campaign scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("{0}")]
    Validation(String),
    #[error("campaign {0} not found")]
    NotFound(CampaignId),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("campaign {0} changed status while it was being updated")]
    StatusChanged(CampaignId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
