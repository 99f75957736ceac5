use crate::infra::{
    demo_tenant, seed_demo_data, InMemoryCampaignStore, InMemoryContactStore,
    LoggingSender,
};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use crm_engine::config::AppConfig;
use crm_engine::error::AppError;
use crm_engine::telemetry;
use crm_engine::workflows::campaigns::{
    CampaignId, CampaignScheduler, DispatchPolicy, DispatchSummary, ScheduledCampaignView,
};
use crm_engine::workflows::scoring::{
    ContactId, LeadScoringService, ScoreRecord, ScoringPolicy, DEFAULT_TOP_LEADS,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DispatchArgs {
    /// Treat this RFC 3339 instant as "now" (defaults to the current time)
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Contact to score, e.g. contact-ava
    pub(crate) contact: String,
    /// Scoring instant in RFC 3339 (defaults to the current time)
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) as_of: Option<DateTime<Utc>>,
    /// Print every rule contribution instead of the stored record
    #[arg(long)]
    pub(crate) explain: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Run the walkthrough as of this RFC 3339 instant (defaults to now)
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) as_of: Option<DateTime<Utc>>,
    /// Skip the campaign scheduling portion of the demo
    #[arg(long)]
    pub(crate) skip_campaigns: bool,
}

type DemoScoring = LeadScoringService<InMemoryContactStore>;
type DemoScheduler = CampaignScheduler<InMemoryCampaignStore, LoggingSender>;

struct DemoStack {
    contacts: InMemoryContactStore,
    scoring: DemoScoring,
    scheduler: DemoScheduler,
}

fn demo_stack(
    policy: ScoringPolicy,
    dispatch: DispatchPolicy,
    now: DateTime<Utc>,
) -> Result<DemoStack, AppError> {
    let contacts = InMemoryContactStore::default();
    let campaigns = InMemoryCampaignStore::default();
    seed_demo_data(&contacts, &campaigns, now)?;

    Ok(DemoStack {
        scoring: LeadScoringService::new(Arc::new(contacts.clone()), policy),
        scheduler: CampaignScheduler::new(Arc::new(campaigns), Arc::new(LoggingSender), dispatch),
        contacts,
    })
}

fn print_json<T: Serialize>(label: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("{label} unavailable: {err}"),
    }
}

pub(crate) async fn run_dispatch(args: DispatchArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let now = args.as_of.unwrap_or_else(Utc::now);
    let stack = demo_stack(
        config.scoring.load_policy()?,
        config.scheduler.dispatch_policy(),
        now,
    )?;

    let summary = stack.scheduler.process_due_campaigns(now).await?;
    print_json("Dispatch summary", &summary);
    Ok(())
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let now = args.as_of.unwrap_or_else(Utc::now);
    let stack = demo_stack(
        config.scoring.load_policy()?,
        config.scheduler.dispatch_policy(),
        now,
    )?;

    let tenant = demo_tenant();
    let contact = ContactId(args.contact);
    if args.explain {
        let breakdown = stack.scoring.explain(&tenant, &contact, now)?;
        print_json("Score breakdown", &breakdown);
    } else {
        let record = stack.scoring.score_contact(&tenant, &contact, now)?;
        print_json("Score record", &record);
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        as_of,
        skip_campaigns,
    } = args;
    let config = AppConfig::load()?;
    let now = as_of.unwrap_or_else(Utc::now);
    let stack = demo_stack(
        config.scoring.load_policy()?,
        config.scheduler.dispatch_policy(),
        now,
    )?;
    let tenant = demo_tenant();

    println!("CRM engine demo ({})", now.to_rfc3339());
    println!("\nLead scoring");
    let contact_ids = stack.contacts.contact_ids(&tenant)?;
    let report = stack.scoring.score_batch(&tenant, &contact_ids, now);
    for failure in &report.failures {
        println!("  {} could not be scored: {}", failure.contact_id, failure.error);
    }

    let leads = stack.scoring.top_leads(&tenant, DEFAULT_TOP_LEADS)?;
    render_leads(&leads);

    if skip_campaigns {
        return Ok(());
    }

    println!("\nCampaign scheduling");
    let newsletter = CampaignId("cmp-newsletter".to_string());
    match stack.scheduler.schedule(
        &tenant,
        &newsletter,
        now + Duration::hours(2),
        "Europe/Berlin",
        now,
    ) {
        Ok(receipt) => println!(
            "  Scheduled {} for {} ({})",
            receipt.campaign_id,
            receipt.scheduled_at.to_rfc3339(),
            receipt.timezone
        ),
        Err(err) => println!("  Scheduling failed: {err}"),
    }

    let rejected = stack
        .scheduler
        .schedule(&tenant, &newsletter, now - Duration::hours(1), "UTC", now);
    if let Err(err) = rejected {
        println!("  Backdated schedule rejected: {err}");
    }

    render_schedule(&stack.scheduler.scheduled_campaigns(&tenant, now)?);

    println!("\nDispatch pass");
    let summary = stack.scheduler.process_due_campaigns(now).await?;
    render_summary(&summary);

    render_schedule(&stack.scheduler.scheduled_campaigns(&tenant, now)?);
    Ok(())
}

fn render_leads(leads: &[ScoreRecord]) {
    if leads.is_empty() {
        println!("  No scored leads");
        return;
    }
    println!(
        "  {:<14} {:>6} {:>6} {:>8}  {:<4} {:<5} {:>6} {:>7}",
        "contact", "fit", "intent", "combined", "fit", "tier", "opens", "clicks"
    );
    for lead in leads {
        println!(
            "  {:<14} {:>6.1} {:>6.1} {:>8.1}  {:<4} {:<5} {:>6} {:>7}",
            lead.contact_id,
            lead.fit_score,
            lead.intent_score,
            lead.combined_score,
            lead.fit_tier,
            lead.intent_tier,
            lead.counters.email_opens,
            lead.counters.email_clicks,
        );
    }
}

fn render_schedule(views: &[ScheduledCampaignView]) {
    if views.is_empty() {
        println!("  Scheduled campaigns: none");
        return;
    }
    println!("  Scheduled campaigns");
    for view in views {
        let status = match &view.last_error {
            Some(error) => format!("retry #{} after: {error}", view.send_attempts),
            None => "pending".to_string(),
        };
        println!(
            "  - {} \"{}\" in {} min [{}] {}",
            view.campaign_id,
            view.name,
            view.time_until_send_secs / 60,
            view.timezone,
            status
        );
    }
}

fn render_summary(summary: &DispatchSummary) {
    println!(
        "  Processed {} | sent {} | requeued {} | failed {} | skipped {} | errored {}",
        summary.processed,
        summary.sent,
        summary.requeued,
        summary.failed,
        summary.skipped,
        summary.errored
    );
}
