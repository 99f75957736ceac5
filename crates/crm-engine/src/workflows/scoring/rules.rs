use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::{FitRules, NamedRule, ScoringConfiguration};
use super::domain::{ContactAttributes, EngagementEvent};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Which rule produced a score contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    CreatorType,
    AudienceSize,
    BusinessStage,
    PlatformCommitment,
    IntentEvent,
}

/// Discrete contribution to a score, kept so operators can audit a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: ScoreFactor,
    pub points: f64,
    pub notes: String,
}

/// Sum of matched fit rule points, never below zero.
pub fn compute_fit_score(contact: &ContactAttributes, rules: &FitRules) -> f64 {
    fit_components(contact, rules)
        .iter()
        .map(|component| component.points)
        .sum::<f64>()
        .max(0.0)
}

pub(crate) fn fit_components(
    contact: &ContactAttributes,
    rules: &FitRules,
) -> Vec<ScoreComponent> {
    let mut components = Vec::new();

    let named = [
        (
            ScoreFactor::CreatorType,
            contact.creator_type.as_deref(),
            &rules.creator_types,
        ),
        (
            ScoreFactor::BusinessStage,
            contact.business_stage.as_deref(),
            &rules.business_stages,
        ),
        (
            ScoreFactor::PlatformCommitment,
            contact.platform_commitment.as_deref(),
            &rules.platform_commitment,
        ),
    ];

    for (factor, value, category) in named {
        if let Some(rule) = value.and_then(|value| first_named_match(category, value)) {
            components.push(ScoreComponent {
                factor,
                points: rule.points,
                notes: format!("matched '{}'", rule.name),
            });
        }
    }

    if let Some(audience) = contact.audience_size {
        if let Some(bracket) = rules
            .audience_sizes
            .iter()
            .find(|bracket| bracket.contains(audience))
        {
            let label = if bracket.label.is_empty() {
                match bracket.max {
                    Some(max) => format!("{}-{}", bracket.min, max),
                    None => format!("{}+", bracket.min),
                }
            } else {
                bracket.label.clone()
            };
            components.push(ScoreComponent {
                factor: ScoreFactor::AudienceSize,
                points: bracket.points,
                notes: format!("audience {audience} in {label}"),
            });
        }
    }

    components
}

fn first_named_match<'a>(rules: &'a [NamedRule], value: &str) -> Option<&'a NamedRule> {
    rules.iter().find(|rule| rule.matches(value))
}

/// Fraction of an event's points left after `elapsed_days`.
///
/// Negative elapsed time (events stamped after `as_of`) keeps full weight.
pub fn decay_factor(elapsed_days: f64, half_life_days: f64) -> f64 {
    let elapsed = elapsed_days.max(0.0);
    0.5_f64.powf(elapsed / half_life_days)
}

pub(crate) fn elapsed_days(occurred_at: DateTime<Utc>, as_of: DateTime<Utc>) -> f64 {
    let millis = (as_of - occurred_at).num_milliseconds();
    (millis as f64 / MILLIS_PER_DAY).max(0.0)
}

/// Decayed sum of configured event points as of `as_of`. Unknown event types
/// contribute nothing.
pub fn compute_intent_score(
    events: &[EngagementEvent],
    config: &ScoringConfiguration,
    as_of: DateTime<Utc>,
) -> f64 {
    intent_components(events, config, as_of)
        .iter()
        .map(|component| component.points)
        .sum()
}

pub(crate) fn intent_components(
    events: &[EngagementEvent],
    config: &ScoringConfiguration,
    as_of: DateTime<Utc>,
) -> Vec<ScoreComponent> {
    events
        .iter()
        .filter_map(|event| {
            let points = config.intent_points(&event.event_type)?.max(0.0);
            let days = elapsed_days(event.occurred_at, as_of);
            let decayed = points * decay_factor(days, config.decay_half_life_days);
            Some(ScoreComponent {
                factor: ScoreFactor::IntentEvent,
                points: decayed,
                notes: format!("{} {:.1} days ago ({points} pts)", event.event_type, days),
            })
        })
        .collect()
}
