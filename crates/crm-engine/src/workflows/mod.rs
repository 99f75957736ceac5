pub mod campaigns;
pub mod scoring;
mod storage;

pub use storage::{RepositoryError, TenantId};
