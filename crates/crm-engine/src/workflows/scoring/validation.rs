use std::collections::HashSet;

use super::config::{CombinedWeights, NamedRule, ScoringConfiguration};
use super::tiers::check_thresholds;

/// Tolerance applied when checking that the combined weights sum to one.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Invalid scoring configuration. Carries every problem found, not just the first.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid scoring configuration: {}", .issues.join("; "))]
pub struct ConfigurationError {
    pub issues: Vec<String>,
}

impl ConfigurationError {
    pub fn new(issues: Vec<String>) -> Self {
        Self { issues }
    }
}

/// Validate the full configuration before any scoring happens.
pub fn validate_configuration(config: &ScoringConfiguration) -> Result<(), ConfigurationError> {
    let mut issues = Vec::new();

    if !config.decay_half_life_days.is_finite() || config.decay_half_life_days <= 0.0 {
        issues.push(format!(
            "decay_half_life_days: must be a positive number (found {})",
            config.decay_half_life_days
        ));
    }

    if let Err(err) = check_weights(&config.combined_weights) {
        issues.extend(err.issues);
    }

    check_named_rules("fit_rules.creator_types", &config.fit_rules.creator_types, &mut issues);
    check_named_rules("fit_rules.business_stages", &config.fit_rules.business_stages, &mut issues);
    check_named_rules(
        "fit_rules.platform_commitment",
        &config.fit_rules.platform_commitment,
        &mut issues,
    );

    let brackets = &config.fit_rules.audience_sizes;
    for (i, bracket) in brackets.iter().enumerate() {
        check_points(&format!("fit_rules.audience_sizes[{i}]"), bracket.points, &mut issues);
        match bracket.max {
            Some(max) if max <= bracket.min => issues.push(format!(
                "fit_rules.audience_sizes[{i}]: max {max} must be greater than min {}",
                bracket.min
            )),
            None if i + 1 != brackets.len() => issues.push(format!(
                "fit_rules.audience_sizes[{i}]: only the last bracket may be open-ended"
            )),
            _ => {}
        }
    }
    for (i, pair) in brackets.windows(2).enumerate() {
        if let Some(max) = pair[0].max {
            if pair[1].min < max {
                issues.push(format!(
                    "fit_rules.audience_sizes[{}]: starts at {} inside the previous bracket ending at {max}",
                    i + 1,
                    pair[1].min
                ));
            }
        }
    }

    let mut seen = HashSet::new();
    for (i, rule) in config.intent_events.iter().enumerate() {
        let key = rule.event_type.trim();
        if key.is_empty() {
            issues.push(format!("intent_events[{i}]: event_type must not be empty"));
        } else if !seen.insert(key.to_string()) {
            issues.push(format!("intent_events[{i}]: duplicate event_type '{key}'"));
        }
        check_points(&format!("intent_events[{i}]"), rule.points, &mut issues);
    }

    check_thresholds("fit_tiers", &config.fit_tiers, &mut issues);
    check_thresholds("intent_tiers", &config.intent_tiers, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigurationError::new(issues))
    }
}

/// Weights must be fractions in `[0, 1]` summing to one within [`WEIGHT_EPSILON`].
pub fn check_weights(weights: &CombinedWeights) -> Result<(), ConfigurationError> {
    let mut issues = Vec::new();
    for (name, value) in [
        ("fit_weight", weights.fit_weight),
        ("intent_weight", weights.intent_weight),
    ] {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            issues.push(format!(
                "combined_weights.{name}: must be between 0 and 1 (found {value})"
            ));
        }
    }

    let sum = weights.fit_weight + weights.intent_weight;
    if !((sum - 1.0).abs() <= WEIGHT_EPSILON) {
        issues.push(format!(
            "combined_weights: fit_weight + intent_weight must equal 1 (found {sum})"
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigurationError::new(issues))
    }
}

fn check_named_rules(path: &str, rules: &[NamedRule], issues: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for (i, rule) in rules.iter().enumerate() {
        let key = rule.name.trim().to_ascii_lowercase();
        if key.is_empty() {
            issues.push(format!("{path}[{i}]: name must not be empty"));
        } else if !seen.insert(key) {
            issues.push(format!("{path}[{i}]: duplicate entry '{}'", rule.name.trim()));
        }
        check_points(&format!("{path}[{i}]"), rule.points, issues);
    }
}

fn check_points(path: &str, points: f64, issues: &mut Vec<String>) {
    if !points.is_finite() || points < 0.0 {
        issues.push(format!("{path}: points must be a non-negative number (found {points})"));
    }
}
