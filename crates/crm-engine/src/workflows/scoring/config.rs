use serde::{Deserialize, Serialize};

use super::tiers::{TierLadder, TierThreshold};
use super::validation::{validate_configuration, ConfigurationError};

/// Operator-editable scoring rubric.
///
/// Deserialized from JSON and only used once it has been wrapped in a
/// [`ScoringPolicy`], which is the single validation entry point.
///
/// ```json
/// {
///   "fit_rules": { "creator_types": [{ "name": "Life Coach", "points": 25 }] },
///   "intent_events": [{ "event_type": "course.purchased", "points": 20 }],
///   "decay_half_life_days": 14,
///   "fit_tiers": [{ "label": "A", "min": 70 }, { "label": "B", "min": 0, "max": 70 }],
///   "intent_tiers": [{ "label": "Hot", "min": 0 }],
///   "combined_weights": { "fit_weight": 0.5, "intent_weight": 0.5 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfiguration {
    #[serde(default)]
    pub fit_rules: FitRules,
    #[serde(default)]
    pub intent_events: Vec<IntentEventRule>,
    pub decay_half_life_days: f64,
    pub fit_tiers: Vec<TierThreshold>,
    pub intent_tiers: Vec<TierThreshold>,
    pub combined_weights: CombinedWeights,
}

/// Fit rule categories. Every category is optional; an empty list never matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FitRules {
    #[serde(default)]
    pub creator_types: Vec<NamedRule>,
    #[serde(default)]
    pub audience_sizes: Vec<AudienceBracket>,
    #[serde(default)]
    pub business_stages: Vec<NamedRule>,
    #[serde(default)]
    pub platform_commitment: Vec<NamedRule>,
}

/// Exact-match rule (creator type, business stage, platform commitment level).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedRule {
    pub name: String,
    pub points: f64,
}

impl NamedRule {
    pub fn new(name: impl Into<String>, points: f64) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    pub(crate) fn matches(&self, value: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(value.trim())
    }
}

/// Audience-size bracket covering `[min, max)`; `max = None` is open-ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudienceBracket {
    pub min: u64,
    #[serde(default)]
    pub max: Option<u64>,
    pub points: f64,
    #[serde(default)]
    pub label: String,
}

impl AudienceBracket {
    pub(crate) fn contains(&self, audience: u64) -> bool {
        audience >= self.min && self.max.map_or(true, |max| audience < max)
    }
}

/// Points awarded for one engagement event type before decay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntentEventRule {
    pub event_type: String,
    pub points: f64,
    #[serde(default)]
    pub label: String,
}

impl IntentEventRule {
    pub fn new(event_type: impl Into<String>, points: f64, label: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            points,
            label: label.into(),
        }
    }

    pub(crate) fn matches(&self, event_type: &str) -> bool {
        self.event_type.trim() == event_type.trim()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CombinedWeights {
    pub fit_weight: f64,
    pub intent_weight: f64,
}

impl ScoringConfiguration {
    /// Points for an event type. Surrounding whitespace on either side is
    /// ignored, matching how validation detects duplicates.
    pub fn intent_points(&self, event_type: &str) -> Option<f64> {
        self.intent_events
            .iter()
            .find(|rule| rule.matches(event_type))
            .map(|rule| rule.points)
    }

    pub fn add_creator_type(&mut self, name: impl Into<String>, points: f64) {
        self.fit_rules.creator_types.push(NamedRule::new(name, points));
    }

    /// Returns `false` when no creator type carried that name.
    pub fn remove_creator_type(&mut self, name: &str) -> bool {
        let before = self.fit_rules.creator_types.len();
        self.fit_rules
            .creator_types
            .retain(|rule| !rule.matches(name));
        before != self.fit_rules.creator_types.len()
    }

    pub fn add_intent_event(&mut self, rule: IntentEventRule) {
        self.intent_events.push(rule);
    }

    pub fn remove_intent_event(&mut self, event_type: &str) -> bool {
        let before = self.intent_events.len();
        self.intent_events
            .retain(|rule| !rule.matches(event_type));
        before != self.intent_events.len()
    }
}

impl Default for ScoringConfiguration {
    /// Rubric tuned for coaches and creators.
    fn default() -> Self {
        let creator_types = [
            "Life Coach",
            "Business Coach",
            "Fitness Coach",
            "Educational Creator",
            "Course Creator",
        ]
        .into_iter()
        .map(|name| NamedRule::new(name, 25.0))
        .collect();

        let audience_sizes = vec![
            bracket(1_000, Some(5_000), 15.0, "Growing (1K-5K)"),
            bracket(5_000, Some(25_000), 20.0, "Established (5K-25K)"),
            bracket(25_000, Some(100_000), 25.0, "Influential (25K-100K)"),
            bracket(100_000, None, 25.0, "Major Creator (100K+)"),
        ];

        let business_stages = vec![
            NamedRule::new("Starting Out", 10.0),
            NamedRule::new("Growing", 20.0),
            NamedRule::new("Scaling", 25.0),
            NamedRule::new("Established", 20.0),
        ];

        let platform_commitment = vec![
            NamedRule::new("Single Feature User", 5.0),
            NamedRule::new("Multiple Features", 15.0),
            NamedRule::new("Full Platform User", 25.0),
            NamedRule::new("Custom App Owner", 30.0),
        ];

        let intent_events = vec![
            IntentEventRule::new("coaching.session_booked", 25.0, "1:1 Session Booked"),
            IntentEventRule::new("course.purchased", 20.0, "Course Purchased"),
            IntentEventRule::new("subscription.upgraded", 20.0, "Plan Upgraded"),
            IntentEventRule::new("livestream.attended", 15.0, "Live Stream Attended"),
            IntentEventRule::new("community.post_created", 10.0, "Community Post"),
            IntentEventRule::new("app.downloaded", 25.0, "Mobile App Downloaded"),
            IntentEventRule::new("digital_product.purchased", 15.0, "Digital Product Bought"),
            IntentEventRule::new("ama.attended", 12.0, "AMA Session Attended"),
            IntentEventRule::new("content.viewed", 5.0, "Content Viewed"),
            IntentEventRule::new("email.clicked", 3.0, "Email Link Clicked"),
        ];

        Self {
            fit_rules: FitRules {
                creator_types,
                audience_sizes,
                business_stages,
                platform_commitment,
            },
            intent_events,
            decay_half_life_days: 14.0,
            fit_tiers: vec![
                TierThreshold::new("A", 70.0, None),
                TierThreshold::new("B", 40.0, Some(70.0)),
                TierThreshold::new("C", 0.0, Some(40.0)),
            ],
            intent_tiers: vec![
                TierThreshold::new("Hot", 60.0, None),
                TierThreshold::new("Warm", 25.0, Some(60.0)),
                TierThreshold::new("Cold", 0.0, Some(25.0)),
            ],
            combined_weights: CombinedWeights {
                fit_weight: 0.5,
                intent_weight: 0.5,
            },
        }
    }
}

fn bracket(min: u64, max: Option<u64>, points: f64, label: &str) -> AudienceBracket {
    AudienceBracket {
        min,
        max,
        points,
        label: label.to_string(),
    }
}

/// Validated scoring configuration plus the tier ladders derived from it.
///
/// The only way to obtain one is through [`ScoringPolicy::new`] or
/// [`ScoringPolicy::revise`], so every engine works from a configuration that
/// has passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringPolicy {
    configuration: ScoringConfiguration,
    fit_ladder: TierLadder,
    intent_ladder: TierLadder,
}

impl ScoringPolicy {
    pub fn new(configuration: ScoringConfiguration) -> Result<Self, ConfigurationError> {
        validate_configuration(&configuration)?;
        let fit_ladder = TierLadder::new("fit_tiers", configuration.fit_tiers.clone())?;
        let intent_ladder = TierLadder::new("intent_tiers", configuration.intent_tiers.clone())?;

        Ok(Self {
            configuration,
            fit_ladder,
            intent_ladder,
        })
    }

    /// Apply an edit to a copy of the configuration and validate the result.
    /// The current policy is left untouched when the edit is rejected.
    pub fn revise<F>(&self, edit: F) -> Result<Self, ConfigurationError>
    where
        F: FnOnce(&mut ScoringConfiguration),
    {
        let mut configuration = self.configuration.clone();
        edit(&mut configuration);
        Self::new(configuration)
    }

    pub fn configuration(&self) -> &ScoringConfiguration {
        &self.configuration
    }

    pub fn fit_ladder(&self) -> &TierLadder {
        &self.fit_ladder
    }

    pub fn intent_ladder(&self) -> &TierLadder {
        &self.intent_ladder
    }
}
