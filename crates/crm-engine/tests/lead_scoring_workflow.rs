use chrono::{DateTime, Duration, TimeZone, Utc};
use crm_engine::workflows::scoring::{
    decay_factor, ContactAttributes, ContactId, EngagementEvent, IntentEventRule,
    ScoringConfiguration, ScoringEngine, ScoringPolicy,
};
use crm_engine::workflows::TenantId;

fn scored_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0)
        .single()
        .expect("valid scoring timestamp")
}

fn default_policy() -> ScoringPolicy {
    ScoringPolicy::new(ScoringConfiguration::default()).expect("default rubric validates")
}

fn fitness_coach() -> ContactAttributes {
    ContactAttributes {
        tenant_id: TenantId("tenant-kliq".to_string()),
        contact_id: ContactId("contact-ava".to_string()),
        creator_type: Some("fitness coach".to_string()),
        audience_size: Some(5_000),
        business_stage: Some("Scaling".to_string()),
        platform_commitment: Some("Full Platform User".to_string()),
    }
}

fn activity(event_type: &str, days_ago: i64) -> EngagementEvent {
    EngagementEvent::new(
        ContactId("contact-ava".to_string()),
        event_type,
        scored_at() - Duration::days(days_ago),
    )
}

#[test]
fn default_rubric_scores_an_engaged_coach() {
    let engine = ScoringEngine::new(default_policy());
    let events = vec![
        activity("coaching.session_booked", 0),
        activity("course.purchased", 14),
        activity("email.clicked", 28),
        activity("email.opened", 1),
        activity("website.visited", 2),
    ];

    let record = engine
        .score_record(&fitness_coach(), &events, scored_at())
        .expect("default rubric scores");

    // 25 creator type + 20 audience (5K sits in the 5K-25K bracket) + 25 stage + 25 platform
    assert_eq!(record.fit_score, 95.0);
    assert_eq!(record.fit_tier, "A");

    let expected_intent = 25.0 + 20.0 * 0.5 + 3.0 * 0.25;
    assert!((record.intent_score - expected_intent).abs() < 1e-9);
    assert_eq!(record.intent_tier, "Warm");
    assert!((record.combined_score - (95.0 + expected_intent) / 2.0).abs() < 1e-9);

    assert_eq!(record.counters.email_opens, 1);
    assert_eq!(record.counters.email_clicks, 1);
    assert_eq!(record.counters.website_visits, 1);
    assert_eq!(record.computed_at, scored_at());
}

#[test]
fn rescoring_later_decays_intent_but_not_fit() {
    let engine = ScoringEngine::new(default_policy());
    let events = vec![activity("app.downloaded", 0)];

    let today = engine
        .score(&fitness_coach(), &events, scored_at())
        .expect("scores today");
    let next_month = engine
        .score(&fitness_coach(), &events, scored_at() + Duration::days(28))
        .expect("scores next month");

    assert_eq!(today.fit_score, next_month.fit_score);
    assert_eq!(today.intent_score, 25.0);
    assert!((next_month.intent_score - 25.0 * decay_factor(28.0, 14.0)).abs() < 1e-9);
    assert_eq!(next_month.intent_tier, "Cold");
}

#[test]
fn revised_policy_picks_up_new_intent_events() {
    let policy = default_policy()
        .revise(|config| {
            config.add_intent_event(IntentEventRule::new("webinar.registered", 30.0, "Webinar"));
        })
        .expect("revision validates");
    let engine = ScoringEngine::new(policy);

    let breakdown = engine
        .score(&fitness_coach(), &[activity("webinar.registered", 0)], scored_at())
        .expect("scores");
    assert_eq!(breakdown.intent_score, 30.0);
    assert_eq!(breakdown.intent_tier, "Warm");
}

#[test]
fn invalid_revisions_are_rejected_with_every_issue() {
    let error = default_policy()
        .revise(|config| {
            config.combined_weights.fit_weight = 0.9;
            config.decay_half_life_days = 0.0;
        })
        .expect_err("revision rejected");

    assert!(error.issues.len() >= 2, "issues: {:?}", error.issues);
}
