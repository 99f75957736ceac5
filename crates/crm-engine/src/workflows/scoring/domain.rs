use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::TenantId;

/// Identifier wrapper for CRM contacts (people).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub String);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static attributes the fit rules are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactAttributes {
    pub tenant_id: TenantId,
    pub contact_id: ContactId,
    pub creator_type: Option<String>,
    pub audience_size: Option<u64>,
    pub business_stage: Option<String>,
    pub platform_commitment: Option<String>,
}

/// Recorded engagement signal. Events are append-only and never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub contact_id: ContactId,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
}

impl EngagementEvent {
    pub fn new(contact_id: ContactId, event_type: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            contact_id,
            event_type: event_type.into(),
            occurred_at,
        }
    }
}

pub const EMAIL_OPENED: &str = "email.opened";
pub const EMAIL_CLICKED: &str = "email.clicked";
pub const EMAIL_REPLIED: &str = "email.replied";
pub const WEBSITE_VISITED: &str = "website.visited";

/// Raw activity tallies stored next to the scores for list views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub email_opens: u32,
    pub email_clicks: u32,
    pub email_replies: u32,
    pub website_visits: u32,
}

impl EngagementCounters {
    pub fn from_events(events: &[EngagementEvent]) -> Self {
        events
            .iter()
            .fold(Self::default(), |mut counters, event| {
                match event.event_type.as_str() {
                    EMAIL_OPENED => counters.email_opens += 1,
                    EMAIL_CLICKED => counters.email_clicks += 1,
                    EMAIL_REPLIED => counters.email_replies += 1,
                    WEBSITE_VISITED => counters.website_visits += 1,
                    _ => {}
                }
                counters
            })
    }
}

/// Persisted scoring result, one per tenant and contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub tenant_id: TenantId,
    pub contact_id: ContactId,
    pub fit_score: f64,
    pub intent_score: f64,
    pub combined_score: f64,
    pub fit_tier: String,
    pub intent_tier: String,
    pub counters: EngagementCounters,
    pub computed_at: DateTime<Utc>,
}
