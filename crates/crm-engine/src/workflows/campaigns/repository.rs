use chrono::{DateTime, Utc};

use crate::workflows::{RepositoryError, TenantId};

use super::domain::{Campaign, CampaignId, CampaignOutcome, CampaignStatus, ScheduleUpdate};

/// Storage abstraction for campaigns.
///
/// Every status change goes through a conditional write so that two pollers
/// racing on the same campaign cannot both claim it.
pub trait CampaignRepository: Send + Sync {
    fn fetch(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
    ) -> Result<Option<Campaign>, RepositoryError>;

    /// Campaigns with `status = scheduled` and `scheduled_at <= now`, across tenants.
    fn get_due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, RepositoryError>;

    fn scheduled_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Campaign>, RepositoryError>;

    /// Atomically set `new` when the stored status equals `expected`.
    /// Returns `false` without writing when another writer got there first.
    /// Leaving `sending` clears any delivery claim.
    fn compare_and_swap_campaign_status(
        &self,
        campaign_id: &CampaignId,
        expected: CampaignStatus,
        new: CampaignStatus,
    ) -> Result<bool, RepositoryError>;

    /// Claim a due campaign for delivery: `scheduled` becomes `sending` and
    /// `claimed_at` is stamped, but only while the stored `scheduled_at` still
    /// equals `scheduled_at` and is not later than `claimed_at`.
    fn claim_due_campaign(
        &self,
        campaign_id: &CampaignId,
        scheduled_at: DateTime<Utc>,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Return `sending` campaigns claimed at or before `claimed_before` to
    /// `scheduled`, clearing the claim. Yields the released ids.
    fn release_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<Vec<CampaignId>, RepositoryError>;

    /// Conditional schedule write, same contract as the status swap.
    fn update_schedule(
        &self,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
        expected: CampaignStatus,
        update: ScheduleUpdate,
    ) -> Result<bool, RepositoryError>;

    /// Store the result of a delivery attempt and clear the claim.
    fn record_campaign_outcome(
        &self,
        campaign_id: &CampaignId,
        outcome: CampaignOutcome,
    ) -> Result<(), RepositoryError>;
}
