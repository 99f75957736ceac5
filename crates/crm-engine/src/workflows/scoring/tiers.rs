use serde::{Deserialize, Serialize};

use super::validation::ConfigurationError;

/// One rung of a tier ladder covering `[min, max)`; `max = None` is unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierThreshold {
    pub label: String,
    pub min: f64,
    #[serde(default)]
    pub max: Option<f64>,
}

impl TierThreshold {
    pub fn new(label: impl Into<String>, min: f64, max: Option<f64>) -> Self {
        Self {
            label: label.into(),
            min,
            max,
        }
    }

    fn contains(&self, score: f64) -> bool {
        self.min <= score && self.max.map_or(true, |max| score < max)
    }
}

/// Thresholds ordered from the highest tier down, checked to cover `[0, inf)`
/// exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct TierLadder {
    thresholds: Vec<TierThreshold>,
}

impl TierLadder {
    pub fn new(name: &str, thresholds: Vec<TierThreshold>) -> Result<Self, ConfigurationError> {
        let mut issues = Vec::new();
        check_thresholds(name, &thresholds, &mut issues);
        if issues.is_empty() {
            Ok(Self { thresholds })
        } else {
            Err(ConfigurationError::new(issues))
        }
    }

    /// Label of the first tier whose range holds `score`.
    ///
    /// Scores below zero or NaN never come out of the engine; they fall into
    /// the lowest tier so the lookup stays total.
    pub fn classify(&self, score: f64) -> &str {
        self.thresholds
            .iter()
            .find(|threshold| threshold.contains(score))
            .or_else(|| self.thresholds.last())
            .map(|threshold| threshold.label.as_str())
            .unwrap_or_default()
    }

    pub fn thresholds(&self) -> &[TierThreshold] {
        &self.thresholds
    }
}

pub(crate) fn check_thresholds(name: &str, thresholds: &[TierThreshold], issues: &mut Vec<String>) {
    let Some(top) = thresholds.first() else {
        issues.push(format!("{name}: at least one tier is required"));
        return;
    };

    if let Some(max) = top.max {
        issues.push(format!(
            "{name}[0] '{}': the highest tier must not have an upper bound (found max {max})",
            top.label
        ));
    }

    for (index, threshold) in thresholds.iter().enumerate() {
        if threshold.label.trim().is_empty() {
            issues.push(format!("{name}[{index}]: label must not be empty"));
        }
        if !threshold.min.is_finite() || threshold.min < 0.0 {
            issues.push(format!(
                "{name}[{index}] '{}': min must be a non-negative number",
                threshold.label
            ));
        }
        if let Some(max) = threshold.max {
            if !max.is_finite() || max <= threshold.min {
                issues.push(format!(
                    "{name}[{index}] '{}': max {max} must be greater than min {}",
                    threshold.label, threshold.min
                ));
            }
        }
    }

    for (index, pair) in thresholds.windows(2).enumerate() {
        let (upper, lower) = (&pair[0], &pair[1]);
        let position = index + 1;
        if lower.min >= upper.min {
            issues.push(format!(
                "{name}[{position}] '{}': tiers must be ordered by descending min",
                lower.label
            ));
            continue;
        }
        match lower.max {
            Some(max) if max < upper.min => issues.push(format!(
                "{name}[{position}] '{}': gap between {max} and {}",
                lower.label, upper.min
            )),
            Some(max) if max > upper.min => issues.push(format!(
                "{name}[{position}] '{}': overlaps '{}' above {}",
                lower.label, upper.label, upper.min
            )),
            _ => {}
        }
    }

    if let Some(bottom) = thresholds.last() {
        if bottom.min != 0.0 {
            issues.push(format!(
                "{name}: lowest tier '{}' must start at 0 (found {})",
                bottom.label, bottom.min
            ));
        }
    }
}
