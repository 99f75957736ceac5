use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::{CombinedWeights, ScoringPolicy};
use super::domain::{ContactAttributes, EngagementCounters, EngagementEvent, ScoreRecord};
use super::rules::{fit_components, intent_components, ScoreComponent};
use super::validation::{check_weights, ConfigurationError};

/// Weighted blend of the fit and intent scores.
pub fn compute_combined_score(
    fit_score: f64,
    intent_score: f64,
    weights: &CombinedWeights,
) -> Result<f64, ConfigurationError> {
    check_weights(weights)?;
    Ok(fit_score * weights.fit_weight + intent_score * weights.intent_weight)
}

/// Scores and tiers for one contact, with the contributions that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub fit_score: f64,
    pub intent_score: f64,
    pub combined_score: f64,
    pub fit_tier: String,
    pub intent_tier: String,
    pub components: Vec<ScoreComponent>,
}

/// Stateless evaluator that applies a validated policy to a contact.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    policy: ScoringPolicy,
}

impl ScoringEngine {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn score(
        &self,
        contact: &ContactAttributes,
        events: &[EngagementEvent],
        as_of: DateTime<Utc>,
    ) -> Result<ScoreBreakdown, ConfigurationError> {
        let config = self.policy.configuration();

        let fit = fit_components(contact, &config.fit_rules);
        let fit_score = fit
            .iter()
            .map(|component| component.points)
            .sum::<f64>()
            .max(0.0);

        let intent = intent_components(events, config, as_of);
        let intent_score = intent.iter().map(|component| component.points).sum::<f64>();

        let combined_score =
            compute_combined_score(fit_score, intent_score, &config.combined_weights)?;

        let mut components = fit;
        components.extend(intent);

        Ok(ScoreBreakdown {
            fit_tier: self.policy.fit_ladder().classify(fit_score).to_string(),
            intent_tier: self.policy.intent_ladder().classify(intent_score).to_string(),
            fit_score,
            intent_score,
            combined_score,
            components,
        })
    }

    /// Score a contact and shape the result into the persisted record.
    pub fn score_record(
        &self,
        contact: &ContactAttributes,
        events: &[EngagementEvent],
        as_of: DateTime<Utc>,
    ) -> Result<ScoreRecord, ConfigurationError> {
        let breakdown = self.score(contact, events, as_of)?;
        Ok(ScoreRecord {
            tenant_id: contact.tenant_id.clone(),
            contact_id: contact.contact_id.clone(),
            fit_score: breakdown.fit_score,
            intent_score: breakdown.intent_score,
            combined_score: breakdown.combined_score,
            fit_tier: breakdown.fit_tier,
            intent_tier: breakdown.intent_tier,
            counters: EngagementCounters::from_events(events),
            computed_at: as_of,
        })
    }
}
