use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use crm_engine::workflows::campaigns::{
    Campaign, CampaignId, CampaignOutcome, CampaignRepository, CampaignSender, CampaignStatus,
    DelegateError, DeliveryReceipt, ScheduleUpdate,
};
use crm_engine::workflows::scoring::{
    ContactAttributes, ContactId, EngagementEvent, ScoreRecord, ScoringRepository,
};
use crm_engine::workflows::{RepositoryError, TenantId};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

type ContactKey = (TenantId, ContactId);

#[derive(Default, Clone)]
pub(crate) struct InMemoryContactStore {
    contacts: Arc<Mutex<HashMap<ContactKey, ContactAttributes>>>,
    events: Arc<Mutex<HashMap<ContactKey, Vec<EngagementEvent>>>>,
    scores: Arc<Mutex<HashMap<ContactKey, ScoreRecord>>>,
}

impl InMemoryContactStore {
    pub(crate) fn insert_contact(&self, contact: ContactAttributes) -> Result<(), RepositoryError> {
        let key = (contact.tenant_id.clone(), contact.contact_id.clone());
        lock(&self.contacts)?.insert(key, contact);
        Ok(())
    }

    pub(crate) fn record_event(
        &self,
        tenant_id: &TenantId,
        event: EngagementEvent,
    ) -> Result<(), RepositoryError> {
        let key = (tenant_id.clone(), event.contact_id.clone());
        lock(&self.events)?.entry(key).or_default().push(event);
        Ok(())
    }

    pub(crate) fn contact_ids(&self, tenant_id: &TenantId) -> Result<Vec<ContactId>, RepositoryError> {
        let mut ids: Vec<ContactId> = lock(&self.contacts)?
            .keys()
            .filter(|(tenant, _)| tenant == tenant_id)
            .map(|(_, contact)| contact.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl ScoringRepository for InMemoryContactStore {
    fn get_contact(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<Option<ContactAttributes>, RepositoryError> {
        Ok(lock(&self.contacts)?
            .get(&(tenant_id.clone(), contact_id.clone()))
            .cloned())
    }

    fn get_engagement_events(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<Vec<EngagementEvent>, RepositoryError> {
        Ok(lock(&self.events)?
            .get(&(tenant_id.clone(), contact_id.clone()))
            .cloned()
            .unwrap_or_default())
    }

    fn upsert_score_record(&self, record: ScoreRecord) -> Result<(), RepositoryError> {
        let key = (record.tenant_id.clone(), record.contact_id.clone());
        lock(&self.scores)?.insert(key, record);
        Ok(())
    }

    fn fetch_score_record(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<Option<ScoreRecord>, RepositoryError> {
        Ok(lock(&self.scores)?
            .get(&(tenant_id.clone(), contact_id.clone()))
            .cloned())
    }

    fn top_score_records(
        &self,
        tenant_id: &TenantId,
        limit: usize,
    ) -> Result<Vec<ScoreRecord>, RepositoryError> {
        let mut records: Vec<ScoreRecord> = lock(&self.scores)?
            .values()
            .filter(|record| &record.tenant_id == tenant_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
        records.truncate(limit);
        Ok(records)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCampaignStore {
    campaigns: Arc<Mutex<HashMap<CampaignId, Campaign>>>,
}

impl InMemoryCampaignStore {
    pub(crate) fn insert(&self, campaign: Campaign) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.campaigns)?;
        if guard.contains_key(&campaign.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(campaign.id.clone(), campaign);
        Ok(())
    }
}

impl CampaignRepository for InMemoryCampaignStore {
    fn fetch(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
    ) -> Result<Option<Campaign>, RepositoryError> {
        Ok(lock(&self.campaigns)?
            .get(campaign_id)
            .filter(|campaign| &campaign.tenant_id == tenant_id)
            .cloned())
    }

    fn get_due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, RepositoryError> {
        let mut due: Vec<Campaign> = lock(&self.campaigns)?
            .values()
            .filter(|campaign| campaign.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|campaign| campaign.scheduled_at);
        Ok(due)
    }

    fn scheduled_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Campaign>, RepositoryError> {
        Ok(lock(&self.campaigns)?
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
        let mut guard = lock(&self.campaigns)?;
        let campaign = guard.get_mut(campaign_id).ok_or(RepositoryError::NotFound)?;
        if campaign.status != expected {
            return Ok(false);
        }
        campaign.status = new;
        if new != CampaignStatus::Sending {
            campaign.claimed_at = None;
        }
        Ok(true)
    }

    fn claim_due_campaign(
        &self,
        campaign_id: &CampaignId,
        scheduled_at: DateTime<Utc>,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut guard = lock(&self.campaigns)?;
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
        let mut guard = lock(&self.campaigns)?;
        Ok(guard
            .values_mut()
            .filter(|campaign| {
                campaign.status == CampaignStatus::Sending
                    && campaign.claimed_at.map_or(true, |at| at <= claimed_before)
            })
            .map(|campaign| {
                campaign.status = CampaignStatus::Scheduled;
                campaign.claimed_at = None;
                campaign.id.clone()
            })
            .collect())
    }

    fn update_schedule(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
        expected: CampaignStatus,
        update: ScheduleUpdate,
    ) -> Result<bool, RepositoryError> {
        let mut guard = lock(&self.campaigns)?;
        let campaign = guard
            .get_mut(campaign_id)
            .filter(|campaign| &campaign.tenant_id == tenant_id)
            .ok_or(RepositoryError::NotFound)?;
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
        let mut guard = lock(&self.campaigns)?;
        let campaign = guard.get_mut(campaign_id).ok_or(RepositoryError::NotFound)?;
        campaign.status = outcome.status;
        campaign.last_error = outcome.error;
        campaign.send_attempts = outcome.send_attempts;
        campaign.claimed_at = None;
        Ok(())
    }
}

/// Stand-in provider that logs each delivery instead of emailing anyone.
#[derive(Debug, Default, Clone)]
pub(crate) struct LoggingSender;

#[async_trait]
impl CampaignSender for LoggingSender {
    async fn send(&self, campaign: &Campaign) -> Result<DeliveryReceipt, DelegateError> {
        if campaign.recipients.is_empty() {
            return Err(DelegateError::Rejected("campaign has no recipients".to_string()));
        }
        info!(
            tenant = %campaign.tenant_id,
            campaign = %campaign.id,
            recipients = campaign.recipients.len(),
            "campaign handed to log-only provider"
        );
        Ok(DeliveryReceipt {
            delivered: campaign.recipients.len(),
        })
    }
}

pub(crate) fn demo_tenant() -> TenantId {
    TenantId("tenant-demo".to_string())
}

/// Populate the stores with a handful of creators and campaigns so a fresh
/// process has something to score and send.
pub(crate) fn seed_demo_data(
    contacts: &InMemoryContactStore,
    campaigns: &InMemoryCampaignStore,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let tenant = demo_tenant();
    let creators = [
        ("contact-ava", "Life Coach", 40_000, "Growing", Some("Full Platform User")),
        ("contact-ben", "Course Creator", 3_500, "Starting Out", None),
        ("contact-cleo", "Fitness Coach", 150_000, "Scaling", Some("Custom App Owner")),
        ("contact-dev", "Podcaster", 800, "Established", Some("Single Feature User")),
    ];
    for (id, creator_type, audience, stage, commitment) in creators {
        contacts.insert_contact(ContactAttributes {
            tenant_id: tenant.clone(),
            contact_id: ContactId(id.to_string()),
            creator_type: Some(creator_type.to_string()),
            audience_size: Some(audience),
            business_stage: Some(stage.to_string()),
            platform_commitment: commitment.map(str::to_string),
        })?;
    }

    let activity = [
        ("contact-ava", "coaching.session_booked", 1),
        ("contact-ava", "course.purchased", 10),
        ("contact-ava", "email.opened", 2),
        ("contact-ava", "email.clicked", 2),
        ("contact-ben", "content.viewed", 3),
        ("contact-ben", "email.opened", 20),
        ("contact-cleo", "app.downloaded", 0),
        ("contact-cleo", "subscription.upgraded", 5),
        ("contact-cleo", "livestream.attended", 30),
        ("contact-dev", "website.visited", 45),
    ];
    for (id, event_type, days_ago) in activity {
        contacts.record_event(
            &tenant,
            EngagementEvent::new(
                ContactId(id.to_string()),
                event_type,
                now - Duration::days(days_ago),
            ),
        )?;
    }

    let audience = |count: usize| -> Vec<String> {
        (1..=count)
            .map(|n| format!("subscriber-{n}@example.com"))
            .collect()
    };

    let mut overdue = Campaign::draft("cmp-welcome", tenant.clone(), "Welcome series", audience(3));
    overdue.status = CampaignStatus::Scheduled;
    overdue.scheduled_at = Some(now - Duration::minutes(5));
    campaigns.insert(overdue)?;

    let mut upcoming = Campaign::draft(
        "cmp-masterclass",
        tenant.clone(),
        "Masterclass launch",
        audience(12),
    );
    upcoming.status = CampaignStatus::Scheduled;
    upcoming.scheduled_at = Some(now + Duration::hours(6));
    upcoming.timezone = "America/Los_Angeles".to_string();
    campaigns.insert(upcoming)?;

    let mut empty = Campaign::draft("cmp-empty-list", tenant.clone(), "Re-engagement", Vec::new());
    empty.status = CampaignStatus::Scheduled;
    empty.scheduled_at = Some(now - Duration::minutes(1));
    campaigns.insert(empty)?;

    campaigns.insert(Campaign::draft(
        "cmp-newsletter",
        tenant,
        "October newsletter",
        audience(40),
    ))?;

    Ok(())
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn seeded_store_has_due_and_upcoming_campaigns() {
        let contacts = InMemoryContactStore::default();
        let campaigns = InMemoryCampaignStore::default();
        seed_demo_data(&contacts, &campaigns, now()).expect("seed succeeds");

        let due = campaigns.get_due_campaigns(now()).expect("due list");
        let ids: Vec<&str> = due.iter().map(|campaign| campaign.id.0.as_str()).collect();
        assert_eq!(ids, vec!["cmp-welcome", "cmp-empty-list"]);
        assert_eq!(
            contacts.contact_ids(&demo_tenant()).expect("ids").len(),
            4
        );
    }

    #[test]
    fn duplicate_campaign_ids_conflict() {
        let campaigns = InMemoryCampaignStore::default();
        let campaign = Campaign::draft("cmp-1", demo_tenant(), "Launch", Vec::new());
        campaigns.insert(campaign.clone()).expect("first insert");
        assert_eq!(campaigns.insert(campaign), Err(RepositoryError::Conflict));
    }

    #[test]
    fn parses_offsets_into_utc() {
        let parsed = parse_timestamp("2025-10-01T11:00:00+02:00").expect("valid timestamp");
        assert_eq!(parsed, now());
        assert!(parse_timestamp("tomorrow").is_err());
    }

    #[tokio::test]
    async fn log_only_provider_rejects_empty_audiences() {
        let campaign = Campaign::draft("cmp-1", demo_tenant(), "Launch", Vec::new());
        let error = LoggingSender.send(&campaign).await.expect_err("no recipients");
        assert!(matches!(error, DelegateError::Rejected(_)));
    }
}
