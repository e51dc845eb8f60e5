//! Issuance cooldown for token-sending flows.
//!
//! The window is measured from the newest token's `created_at` for a given
//! (email, kind), so it applies whether or not an account exists behind the
//! address. Flows check this before issuing a replacement token.

use anyhow::Result;

use super::store::{TokenKind, TokenStore};

pub const DEFAULT_COOLDOWN_SECONDS: i64 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownDecision {
    Allowed,
    Active { remaining_seconds: i64 },
}

#[derive(Clone, Copy, Debug)]
pub struct CooldownPolicy {
    window_seconds: i64,
}

impl CooldownPolicy {
    #[must_use]
    pub const fn new(window_seconds: i64) -> Self {
        Self { window_seconds }
    }

    #[must_use]
    pub const fn window_seconds(&self) -> i64 {
        self.window_seconds
    }

    /// Decide whether a new token of this kind may be issued yet.
    ///
    /// # Errors
    /// Returns an error if the token store cannot be read.
    pub async fn check(
        &self,
        tokens: &dyn TokenStore,
        email: &str,
        kind: TokenKind,
    ) -> Result<CooldownDecision> {
        if self.window_seconds <= 0 {
            return Ok(CooldownDecision::Allowed);
        }
        match tokens.seconds_since_last_issue(email, kind).await? {
            Some(age) if age < self.window_seconds => Ok(CooldownDecision::Active {
                remaining_seconds: self.window_seconds - age,
            }),
            _ => Ok(CooldownDecision::Allowed),
        }
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_SECONDS)
    }
}
