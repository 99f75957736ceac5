use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::domain::Campaign;

/// Outbound delivery hook (email provider adapters, queues, etc.).
#[async_trait]
pub trait CampaignSender: Send + Sync {
    async fn send(&self, campaign: &Campaign) -> Result<DeliveryReceipt, DelegateError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub delivered: usize,
}

/// Send delegate failure. Always handled by the scheduler as a requeue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DelegateError {
    #[error("provider rejected campaign: {0}")]
    Rejected(String),
    #[error("delivery transport unavailable: {0}")]
    Transport(String),
    #[error("send timed out after {0:?}")]
    TimedOut(Duration),
}
