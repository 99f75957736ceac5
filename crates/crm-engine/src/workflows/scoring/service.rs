use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::workflows::{RepositoryError, TenantId};

use super::config::ScoringPolicy;
use super::domain::{ContactId, ScoreRecord};
use super::engine::{ScoreBreakdown, ScoringEngine};
use super::repository::ScoringRepository;
use super::validation::ConfigurationError;

pub const DEFAULT_TOP_LEADS: usize = 50;

/// Service composing the scoring engine with contact and score storage.
pub struct LeadScoringService<R> {
    repository: Arc<R>,
    engine: Arc<ScoringEngine>,
}

/// Result of a batch rescoring pass. One failure never aborts the batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchScoreReport {
    pub scored: Vec<ScoreRecord>,
    pub failures: Vec<BatchScoreFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchScoreFailure {
    pub contact_id: ContactId,
    pub error: String,
}

impl<R> LeadScoringService<R>
where
    R: ScoringRepository + 'static,
{
    pub fn new(repository: Arc<R>, policy: ScoringPolicy) -> Self {
        Self {
            repository,
            engine: Arc::new(ScoringEngine::new(policy)),
        }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        self.engine.policy()
    }

    /// Compute without persisting, for previews and audits.
    pub fn explain(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
        as_of: DateTime<Utc>,
    ) -> Result<ScoreBreakdown, ScoringServiceError> {
        let contact = self
            .repository
            .get_contact(tenant_id, contact_id)?
            .ok_or_else(|| ScoringServiceError::ContactNotFound(contact_id.clone()))?;
        let events = self.repository.get_engagement_events(tenant_id, contact_id)?;
        Ok(self.engine.score(&contact, &events, as_of)?)
    }

    /// Score a contact as of `as_of` and upsert the resulting record.
    pub fn score_contact(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
        as_of: DateTime<Utc>,
    ) -> Result<ScoreRecord, ScoringServiceError> {
        let contact = self
            .repository
            .get_contact(tenant_id, contact_id)?
            .ok_or_else(|| ScoringServiceError::ContactNotFound(contact_id.clone()))?;
        let events = self.repository.get_engagement_events(tenant_id, contact_id)?;

        let record = self.engine.score_record(&contact, &events, as_of)?;
        self.repository.upsert_score_record(record.clone())?;

        debug!(
            tenant = %tenant_id,
            contact = %contact_id,
            fit = record.fit_score,
            intent = record.intent_score,
            combined = record.combined_score,
            "contact scored"
        );

        Ok(record)
    }

    pub fn score_batch(
        &self,
        tenant_id: &TenantId,
        contact_ids: &[ContactId],
        as_of: DateTime<Utc>,
    ) -> BatchScoreReport {
        let mut report = BatchScoreReport::default();
        for contact_id in contact_ids {
            match self.score_contact(tenant_id, contact_id, as_of) {
                Ok(record) => report.scored.push(record),
                Err(err) => {
                    warn!(tenant = %tenant_id, contact = %contact_id, error = %err, "scoring failed");
                    report.failures.push(BatchScoreFailure {
                        contact_id: contact_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        report
    }

    pub fn score_for(
        &self,
        tenant_id: &TenantId,
        contact_id: &ContactId,
    ) -> Result<ScoreRecord, ScoringServiceError> {
        self.repository
            .fetch_score_record(tenant_id, contact_id)?
            .ok_or_else(|| ScoringServiceError::ScoreNotFound(contact_id.clone()))
    }

    pub fn top_leads(
        &self,
        tenant_id: &TenantId,
        limit: usize,
    ) -> Result<Vec<ScoreRecord>, ScoringServiceError> {
        Ok(self.repository.top_score_records(tenant_id, limit)?)
    }
}

/// Error raised by the lead scoring service.
#[derive(Debug, thiserror::Error)]
pub enum ScoringServiceError {
    #[error("contact {0} not found")]
    ContactNotFound(ContactId),
    #[error("no score recorded for contact {0}")]
    ScoreNotFound(ContactId),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
