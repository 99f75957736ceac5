//! Campaign scheduling: schedule/cancel/reschedule operations guarded by a
//! status state machine, and a poller that hands due campaigns to a send
//! delegate with at-most-once claiming per poll.

pub mod delegate;
pub mod domain;
mod lifecycle;
pub mod repository;
pub mod router;
pub mod scheduler;
mod worker;

#[cfg(test)]
mod tests;

pub use delegate::{CampaignSender, DelegateError, DeliveryReceipt};
pub use domain::{
    Campaign, CampaignId, CampaignOutcome, CampaignStatus, ScheduleReceipt, ScheduleUpdate,
    ScheduledCampaignView, DEFAULT_TIMEZONE,
};
pub use lifecycle::{CampaignTransition, InvalidTransition};
pub use repository::CampaignRepository;
pub use router::campaign_router;
pub use scheduler::{CampaignScheduler, DispatchPolicy, DispatchSummary, SchedulerError};
pub use worker::run_poller;
