use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::delegate::CampaignSender;
use super::repository::CampaignRepository;
use super::scheduler::CampaignScheduler;

/// Poll for due campaigns every `poll_interval` until `shutdown` flips to `true`.
///
/// A poll that overruns the interval delays the next one instead of stacking
/// ticks, so two polls from the same worker never overlap.
pub async fn run_poller<R, S>(
    scheduler: Arc<CampaignScheduler<R, S>>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    R: CampaignRepository + 'static,
    S: CampaignSender + 'static,
{
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_secs = poll_interval.as_secs(), "campaign poller started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                if let Err(err) = scheduler.process_due_campaigns(Utc::now()).await {
                    error!(error = %err, "campaign poll failed");
                }
            }
        }
    }

    info!("campaign poller stopped");
}
