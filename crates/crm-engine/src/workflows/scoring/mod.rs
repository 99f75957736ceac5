//! Lead scoring: fit rules over static contact attributes, time-decayed intent
//! from engagement events, and the weighted combination of both.

pub mod config;
pub mod domain;
mod engine;
pub mod repository;
pub mod router;
mod rules;
pub mod service;
mod tiers;
mod validation;

#[cfg(test)]
mod tests;

pub use config::{
    AudienceBracket, CombinedWeights, FitRules, IntentEventRule, NamedRule, ScoringConfiguration,
    ScoringPolicy,
};
pub use domain::{
    ContactAttributes, ContactId, EngagementCounters, EngagementEvent, ScoreRecord,
};
pub use engine::{compute_combined_score, ScoreBreakdown, ScoringEngine};
pub use repository::ScoringRepository;
pub use router::scoring_router;
pub use rules::{
    compute_fit_score, compute_intent_score, decay_factor, ScoreComponent, ScoreFactor,
};
pub use service::{
    BatchScoreFailure, BatchScoreReport, LeadScoringService, ScoringServiceError, DEFAULT_TOP_LEADS,
};
pub use tiers::{TierLadder, TierThreshold};
pub use validation::{check_weights, validate_configuration, ConfigurationError, WEIGHT_EPSILON};
