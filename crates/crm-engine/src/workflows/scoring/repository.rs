use crate::workflows::{RepositoryError, TenantId};

use super::domain::{ContactAttributes, ContactId, EngagementEvent, ScoreRecord};

/// Storage abstraction for contacts, their engagement history, and score records.
pub trait ScoringRepository: Send + Sync {
    fn get_contact(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<Option<ContactAttributes>, RepositoryError>;

    fn get_engagement_events(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<Vec<EngagementEvent>, RepositoryError>;

    /// Insert or replace the record keyed by tenant and contact.
    fn upsert_score_record(&self, record: ScoreRecord) -> Result<(), RepositoryError>;

    fn fetch_score_record(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<Option<ScoreRecord>, RepositoryError>;

    /// Records ordered by combined score, highest first.
    fn top_score_records(
        &self,
        tenant_id: &TenantId,
        limit: usize,
    ) -> Result<Vec<ScoreRecord>, RepositoryError>;
}
