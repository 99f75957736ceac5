use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::scoring::{
    ContactAttributes, ContactId, EngagementEvent, LeadScoringService, ScoreRecord,
    ScoringConfiguration, ScoringPolicy, ScoringRepository,
};
use crate::workflows::{RepositoryError, TenantId};

pub(super) fn tenant() -> TenantId {
    TenantId("tenant-kliq".to_string())
}

pub(super) fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn policy() -> ScoringPolicy {
    ScoringPolicy::new(ScoringConfiguration::default()).expect("default policy valid")
}

/// Contact worth exactly 70 fit points under the default rubric.
pub(super) fn coach(id: &str) -> ContactAttributes {
    ContactAttributes {
        tenant_id: tenant(),
        contact_id: ContactId(id.to_string()),
        creator_type: Some("Life Coach".to_string()),
        audience_size: Some(40_000),
        business_stage: Some("Growing".to_string()),
        platform_commitment: None,
    }
}

pub(super) fn event(id: &str, event_type: &str, days_ago: i64) -> EngagementEvent {
    EngagementEvent::new(
        ContactId(id.to_string()),
        event_type,
        as_of() - Duration::days(days_ago),
    )
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    contacts: Arc<Mutex<HashMap<(TenantId, ContactId), ContactAttributes>>>,
    events: Arc<Mutex<Vec<EngagementEvent>>>,
    pub(super) scores: Arc<Mutex<HashMap<(TenantId, ContactId), ScoreRecord>>>,
}

impl MemoryRepository {
    pub(super) fn with_contact(self, contact: ContactAttributes) -> Self {
        self.contacts
            .lock()
            .expect("contacts mutex poisoned")
            .insert((contact.tenant_id.clone(), contact.contact_id.clone()), contact);
        self
    }

    pub(super) fn with_event(self, event: EngagementEvent) -> Self {
        self.events.lock().expect("events mutex poisoned").push(event);
        self
    }

    pub(super) fn score_count(&self) -> usize {
        self.scores.lock().expect("scores mutex poisoned").len()
    }
}

impl ScoringRepository for MemoryRepository {
    fn get_contact(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<Option<ContactAttributes>, RepositoryError> {
        let guard = self.contacts.lock().expect("contacts mutex poisoned");
        Ok(guard.get(&(tenant_id.clone(), contact_id.clone())).cloned())
    }

    fn get_engagement_events(
        &self,
        _tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<Vec<EngagementEvent>, RepositoryError> {
        let guard = self.events.lock().expect("events mutex poisoned");
        Ok(guard
            .iter()
            .filter(|event| &event.contact_id == contact_id)
            .cloned()
            .collect())
    }

    fn upsert_score_record(&self, record: ScoreRecord) -> Result<(), RepositoryError> {
        let mut guard = self.scores.lock().expect("scores mutex poisoned");
        guard.insert(
            (record.tenant_id.clone(), record.contact_id.clone()),
            record,
        );
        Ok(())
    }

    fn fetch_score_record(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<Option<ScoreRecord>, RepositoryError> {
        let guard = self.scores.lock().expect("scores mutex poisoned");
        Ok(guard.get(&(tenant_id.clone(), contact_id.clone())).cloned())
    }

    fn top_score_records(
        &self,
        tenant_id: &TenantId,
        limit: usize,
    ) -> Result<Vec<ScoreRecord>, RepositoryError> {
        let guard = self.scores.lock().expect("scores mutex poisoned");
        let mut records: Vec<ScoreRecord> = guard
            .values()
            .filter(|record| &record.tenant_id == tenant_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
        records.truncate(limit);
        Ok(records)
    }
}

/// Serves contacts but refuses writes.
pub(super) struct ReadOnlyRepository(pub(super) MemoryRepository);

impl ScoringRepository for ReadOnlyRepository {
    fn get_contact(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<Option<ContactAttributes>, RepositoryError> {
        self.0.get_contact(tenant_id, contact_id)
    }

    fn get_engagement_events(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<Vec<EngagementEvent>, RepositoryError> {
        self.0.get_engagement_events(tenant_id, contact_id)
    }

    fn upsert_score_record(&self, _record: ScoreRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only replica".to_string()))
    }

    fn fetch_score_record(
        &self,
        _tenant_id: &TenantId,
        _contact_id: &ContactId,
    ) -> Result<Option<ScoreRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("read only replica".to_string()))
    }

    fn top_score_records(
        &self,
        _tenant_id: &TenantId,
        _limit: usize,
    ) -> Result<Vec<ScoreRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("read only replica".to_string()))
    }
}

pub(super) fn build_service(
    repository: MemoryRepository,
) -> (LeadScoringService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(repository);
    let service = LeadScoringService::new(repository.clone(), policy());
    (service, repository)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
