use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::campaigns::{
    Campaign, CampaignId, CampaignOutcome, CampaignRepository, CampaignScheduler, CampaignSender,
    CampaignStatus, DelegateError, DeliveryReceipt, DispatchPolicy, ScheduleUpdate,
};
use crate::workflows::{RepositoryError, TenantId};

pub(super) fn tenant() -> TenantId {
    TenantId("tenant-kliq".to_string())
}

pub(super) fn other_tenant() -> TenantId {
    TenantId("tenant-other".to_string())
}

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn draft(id: &str) -> Campaign {
    Campaign::draft(
        id,
        tenant(),
        format!("Launch {id}"),
        vec!["a@example.com".to_string(), "b@example.com".to_string()],
    )
}

pub(super) fn scheduled(id: &str, at: DateTime<Utc>) -> Campaign {
    let mut campaign = draft(id);
    campaign.status = CampaignStatus::Scheduled;
    campaign.scheduled_at = Some(at);
    campaign
}

pub(super) fn due(id: &str) -> Campaign {
    scheduled(id, now() - Duration::minutes(1))
}

pub(super) fn id(raw: &str) -> CampaignId {
    CampaignId(raw.to_string())
}

#[derive(Default, Clone)]
pub(super) struct MemoryCampaignRepository {
    campaigns: Arc<Mutex<HashMap<CampaignId, Campaign>>>,
    broken_outcomes: Arc<Mutex<HashSet<CampaignId>>>,
}

impl MemoryCampaignRepository {
    pub(super) fn with_campaign(self, campaign: Campaign) -> Self {
        self.campaigns
            .lock()
            .expect("campaigns mutex poisoned")
            .insert(campaign.id.clone(), campaign);
        self
    }

    /// Make writes of delivery outcomes fail for one campaign.
    pub(super) fn with_broken_outcome(self, campaign_id: &str) -> Self {
        self.broken_outcomes
            .lock()
            .expect("outcomes mutex poisoned")
            .insert(id(campaign_id));
        self
    }

    pub(super) fn get(&self, campaign_id: &str) -> Campaign {
        self.campaigns
            .lock()
            .expect("campaigns mutex poisoned")
            .get(&id(campaign_id))
            .cloned()
            .expect("campaign stored")
    }
}

impl CampaignRepository for MemoryCampaignRepository {
    fn fetch(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
    ) -> Result<Option<Campaign>, RepositoryError> {
        let guard = self.campaigns.lock().expect("campaigns mutex poisoned");
        Ok(guard
            .get(campaign_id)
            .filter(|campaign| &campaign.tenant_id == tenant_id)
            .cloned())
    }

    fn get_due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, RepositoryError> {
        let guard = self.campaigns.lock().expect("campaigns mutex poisoned");
        let mut due: Vec<Campaign> = guard
            .values()
            .filter(|campaign| campaign.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(due)
    }

    fn scheduled_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Campaign>, RepositoryError> {
        let guard = self.campaigns.lock().expect("campaigns mutex poisoned");
        Ok(guard
            .values()
            .filter(|campaign| {
                &campaign.tenant_id == tenant_id && campaign.status == CampaignStatus::Scheduled
            })
            .cloned()
            .collect())
    }

    fn compare_and_swap_campaign_status(
        &self,
        campaign_id: &CampaignId,
        expected: CampaignStatus,
        new: CampaignStatus,
    ) -> Result<bool, RepositoryError> {
        let mut guard = self.campaigns.lock().expect("campaigns mutex poisoned");
        match guard.get_mut(campaign_id) {
            Some(campaign) if campaign.status == expected => {
                campaign.status = new;
                if new != CampaignStatus::Sending {
                    campaign.claimed_at = None;
                }
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn claim_due_campaign(
        &self,
        campaign_id: &CampaignId,
        scheduled_at: DateTime<Utc>,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut guard = self.campaigns.lock().expect("campaigns mutex poisoned");
        let campaign = guard.get_mut(campaign_id).ok_or(RepositoryError::NotFound)?;
        if campaign.status != CampaignStatus::Scheduled
            || campaign.scheduled_at != Some(scheduled_at)
            || scheduled_at > claimed_at
        {
            return Ok(false);
        }
        campaign.status = CampaignStatus::Sending;
        campaign.claimed_at = Some(claimed_at);
        Ok(true)
    }

    fn release_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<Vec<CampaignId>, RepositoryError> {
        let mut guard = self.campaigns.lock().expect("campaigns mutex poisoned");
        let mut released = Vec::new();
        for campaign in guard.values_mut() {
            if campaign.status == CampaignStatus::Sending
                && campaign.claimed_at.map_or(true, |at| at <= claimed_before)
            {
                campaign.status = CampaignStatus::Scheduled;
                campaign.claimed_at = None;
                released.push(campaign.id.clone());
            }
        }
        released.sort();
        Ok(released)
    }

    fn update_schedule(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
        expected: CampaignStatus,
        update: ScheduleUpdate,
    ) -> Result<bool, RepositoryError> {
        let mut guard = self.campaigns.lock().expect("campaigns mutex poisoned");
        let Some(campaign) = guard
            .get_mut(campaign_id)
            .filter(|campaign| &campaign.tenant_id == tenant_id)
        else {
            return Err(RepositoryError::NotFound);
        };
        if campaign.status != expected {
            return Ok(false);
        }
        campaign.status = update.status;
        campaign.scheduled_at = update.scheduled_at;
        campaign.timezone = update.timezone;
        if update.reset_attempts {
            campaign.send_attempts = 0;
            campaign.last_error = None;
        }
        Ok(true)
    }

    fn record_campaign_outcome(
        &self,
        campaign_id: &CampaignId,
        outcome: CampaignOutcome,
    ) -> Result<(), RepositoryError> {
        if self
            .broken_outcomes
            .lock()
            .expect("outcomes mutex poisoned")
            .contains(campaign_id)
        {
            return Err(RepositoryError::Unavailable("outcome write failed".to_string()));
        }
        let mut guard = self.campaigns.lock().expect("campaigns mutex poisoned");
        let campaign = guard.get_mut(campaign_id).ok_or(RepositoryError::NotFound)?;
        campaign.status = outcome.status;
        campaign.last_error = outcome.error;
        campaign.send_attempts = outcome.send_attempts;
        campaign.claimed_at = None;
        Ok(())
    }
}

/// Returns a due list captured earlier, like a second poller that queried
/// just before the first one claimed everything.
pub(super) struct StaleDueRepository {
    pub(super) inner: MemoryCampaignRepository,
    pub(super) snapshot: Vec<Campaign>,
}

impl CampaignRepository for StaleDueRepository {
    fn fetch(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
    ) -> Result<Option<Campaign>, RepositoryError> {
        self.inner.fetch(tenant_id, campaign_id)
    }

    fn get_due_campaigns(&self, _now: DateTime<Utc>) -> Result<Vec<Campaign>, RepositoryError> {
        Ok(self.snapshot.clone())
    }

    fn scheduled_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Campaign>, RepositoryError> {
        self.inner.scheduled_for_tenant(tenant_id)
    }

    fn compare_and_swap_campaign_status(
        &self,
        campaign_id: &CampaignId,
        expected: CampaignStatus,
        new: CampaignStatus,
    ) -> Result<bool, RepositoryError> {
        self.inner
            .compare_and_swap_campaign_status(campaign_id, expected, new)
    }

    fn claim_due_campaign(
        &self,
        campaign_id: &CampaignId,
        scheduled_at: DateTime<Utc>,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.inner
            .claim_due_campaign(campaign_id, scheduled_at, claimed_at)
    }

    fn release_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<Vec<CampaignId>, RepositoryError> {
        self.inner.release_stale_claims(claimed_before)
    }

    fn update_schedule(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
        expected: CampaignStatus,
        update: ScheduleUpdate,
    ) -> Result<bool, RepositoryError> {
        self.inner
            .update_schedule(tenant_id, campaign_id, expected, update)
    }

    fn record_campaign_outcome(
        &self,
        campaign_id: &CampaignId,
        outcome: CampaignOutcome,
    ) -> Result<(), RepositoryError> {
        self.inner.record_campaign_outcome(campaign_id, outcome)
    }
}

/// Sender that replays scripted results, then succeeds.
#[derive(Default)]
pub(super) struct ScriptedSender {
    script: Mutex<VecDeque<Result<DeliveryReceipt, DelegateError>>>,
    delay: Option<StdDuration>,
    calls: AtomicUsize,
}

impl ScriptedSender {
    pub(super) fn failing(times: usize) -> Self {
        let script = (0..times)
            .map(|_| Err(DelegateError::Transport("smtp relay down".to_string())))
            .collect();
        Self {
            script: Mutex::new(script),
            ..Self::default()
        }
    }

    pub(super) fn slow(delay: StdDuration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CampaignSender for ScriptedSender {
    async fn send(&self, campaign: &Campaign) -> Result<DeliveryReceipt, DelegateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().expect("script mutex poisoned").pop_front();
        scripted.unwrap_or(Ok(DeliveryReceipt {
            delivered: campaign.recipients.len(),
        }))
    }
}

pub(super) type TestScheduler = CampaignScheduler<MemoryCampaignRepository, ScriptedSender>;

pub(super) fn build_scheduler(
    repository: MemoryCampaignRepository,
    sender: ScriptedSender,
    policy: DispatchPolicy,
) -> (Arc<TestScheduler>, MemoryCampaignRepository, Arc<ScriptedSender>) {
    let sender = Arc::new(sender);
    let scheduler = CampaignScheduler::new(Arc::new(repository.clone()), sender.clone(), policy);
    (Arc::new(scheduler), repository, sender)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
