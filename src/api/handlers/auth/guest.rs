//! Guest-record migration collaborator.
//!
//! Applications submitted before an account existed are keyed by bare email.
//! After register, first Google sign-in, or invitation acceptance, those
//! records are reassigned to the new user id. The migration itself lives in
//! the applications service; this seam only invokes it.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

#[async_trait]
pub trait GuestMigrator: Send + Sync {
    async fn attach(&self, email: &str, user_id: Uuid) -> Result<()>;
}

/// Local dev migrator that logs instead of calling the applications service.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogGuestMigrator;

#[async_trait]
impl GuestMigrator for LogGuestMigrator {
    async fn attach(&self, email: &str, user_id: Uuid) -> Result<()> {
        info!(email = %email, user_id = %user_id, "guest record migration stub");
        Ok(())
    }
}
