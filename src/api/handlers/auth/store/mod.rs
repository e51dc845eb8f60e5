//! Repository interfaces for users, linked accounts, and email tokens.
//!
//! Handlers never touch the database directly; they talk to these traits so
//! flow logic can be exercised against the in-memory stores in tests while
//! production uses Postgres. The backing store must keep token consumption
//! atomic: two concurrent consumes of the same token resolve to exactly one
//! success.

pub(crate) mod postgres;

#[cfg(test)]
pub(crate) mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

/// External provider identifier for Google-linked accounts.
pub(crate) const PROVIDER_GOOGLE: &str = "google";
/// Synthetic provider recorded when an invited user sets local credentials.
pub(crate) const PROVIDER_CREDENTIALS: &str = "credentials";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::User => "user",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "staff" => Some(Self::Staff),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum PermissionLevel {
    CanRead,
    CanWrite,
    CanManage,
}

impl PermissionLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CanRead => "canRead",
            Self::CanWrite => "canWrite",
            Self::CanManage => "canManage",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "canRead" => Some(Self::CanRead),
            "canWrite" => Some(Self::CanWrite),
            "canManage" => Some(Self::CanManage),
            _ => None,
        }
    }
}

/// One entry of a user's ordered role set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleAssignment {
    pub role: Role,
    pub permission_level: Option<PermissionLevel>,
}

/// Account state as the flows see it.
///
/// `password_hash = None` means the account has no local credential yet
/// (Google-only, or invited and not accepted). `is_active = false` marks an
/// invited user who has not completed acceptance or a deactivated account.
#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    pub roles: Vec<RoleAssignment>,
}

impl User {
    #[must_use]
    pub fn role_names(&self) -> Vec<String> {
        self.roles
            .iter()
            .map(|assignment| assignment.role.as_str().to_string())
            .collect()
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|assignment| assignment.role == role)
    }
}

/// Input for creating a user; emails must already be normalized.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    pub roles: Vec<RoleAssignment>,
}

#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(User),
    EmailTaken,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn create(&self, new_user: NewUser) -> Result<CreateUserOutcome>;
    async fn set_password_digest(&self, id: Uuid, digest: &str) -> Result<()>;
    async fn mark_email_verified(&self, id: Uuid) -> Result<()>;
    async fn record_login(&self, id: Uuid) -> Result<()>;
    /// Invitation acceptance: set name and digest, flip `is_active` in one step.
    async fn activate_invited(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
        digest: &str,
    ) -> Result<()>;
}

/// Result of linking an external identity at commit time.
///
/// Both uniqueness invariants are re-checked by the store itself so
/// interleaved link attempts cannot create a double binding.
#[derive(Debug, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
    ProviderIdentityTaken,
}

#[async_trait]
pub trait LinkedAccountStore: Send + Sync {
    async fn find_user_by_provider(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<Uuid>>;
    async fn user_has_provider(&self, user_id: Uuid, provider: &str) -> Result<bool>;
    async fn link(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<LinkOutcome>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Verification,
    PasswordReset,
    MagicLink,
    Invitation,
    AccountLink,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::PasswordReset => "password_reset",
            Self::MagicLink => "magic_link",
            Self::Invitation => "invitation",
            Self::AccountLink => "account_link",
        }
    }

    /// Fixed issuance TTL per kind; not configurable per call.
    #[must_use]
    pub const fn ttl(self) -> Duration {
        match self {
            Self::Verification => Duration::from_secs(24 * 60 * 60),
            Self::PasswordReset => Duration::from_secs(60 * 60),
            Self::MagicLink | Self::AccountLink => Duration::from_secs(15 * 60),
            Self::Invitation => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Outcome of an atomic token consumption.
///
/// Expired tokens are deleted as a side effect, so a given raw token reports
/// `Expired` at most once and `NotFound` afterwards.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenConsume {
    Consumed { email: String },
    NotFound,
    Expired,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Issue a token and return the raw value; only a hash is persisted.
    async fn issue(&self, email: &str, kind: TokenKind, ttl: Duration) -> Result<String>;
    /// Atomically look up and delete a token.
    async fn consume(&self, raw_token: &str, kind: TokenKind) -> Result<TokenConsume>;
    /// Read-only validity check; does not delete the token.
    async fn peek(&self, raw_token: &str, kind: TokenKind) -> Result<Option<String>>;
    /// Drop existing tokens of this kind so only the newest one is usable.
    async fn replace_for_email(&self, email: &str, kind: TokenKind) -> Result<u64>;
    /// Seconds since the newest token of this kind was issued, if any.
    async fn seconds_since_last_issue(&self, email: &str, kind: TokenKind)
    -> Result<Option<i64>>;
}
