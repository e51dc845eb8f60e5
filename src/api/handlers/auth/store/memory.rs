//! In-memory stores used by flow tests.
//!
//! Same contracts as the Postgres stores, including atomic consumption: all
//! mutations happen under a single mutex, so two concurrent consumes of the
//! same token still resolve to exactly one success.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use super::super::utils::{generate_email_token, hash_email_token};
use super::{
    CreateUserOutcome, LinkOutcome, LinkedAccountStore, NewUser, TokenConsume, TokenKind,
    TokenStore, User, UserStore,
};

#[derive(Clone, Debug)]
struct TokenRow {
    email: String,
    kind: TokenKind,
    created_at: SystemTime,
    expires_at: SystemTime,
}

#[derive(Default)]
pub(crate) struct MemoryTokenStore {
    rows: Mutex<HashMap<Vec<u8>, TokenRow>>,
}

impl MemoryTokenStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pretend `by` has elapsed for all tokens of this (email, kind).
    pub(crate) fn age_tokens(&self, email: &str, kind: TokenKind, by: Duration) {
        let mut rows = self.rows.lock().expect("token store lock");
        for row in rows.values_mut() {
            if row.email == email && row.kind == kind {
                row.created_at = row.created_at.checked_sub(by).unwrap_or(row.created_at);
                row.expires_at = row.expires_at.checked_sub(by).unwrap_or(row.expires_at);
            }
        }
    }

    pub(crate) fn live_count(&self, email: &str, kind: TokenKind) -> usize {
        let rows = self.rows.lock().expect("token store lock");
        rows.values()
            .filter(|row| row.email == email && row.kind == kind)
            .count()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn issue(&self, email: &str, kind: TokenKind, ttl: Duration) -> Result<String> {
        let token = generate_email_token()?;
        let now = SystemTime::now();
        let mut rows = self.rows.lock().expect("token store lock");
        rows.insert(
            hash_email_token(&token),
            TokenRow {
                email: email.to_string(),
                kind,
                created_at: now,
                expires_at: now.checked_add(ttl).unwrap_or(now),
            },
        );
        Ok(token)
    }

    async fn consume(&self, raw_token: &str, kind: TokenKind) -> Result<TokenConsume> {
        let hash = hash_email_token(raw_token);
        let mut rows = self.rows.lock().expect("token store lock");
        let matches_kind = rows.get(&hash).is_some_and(|row| row.kind == kind);
        if !matches_kind {
            return Ok(TokenConsume::NotFound);
        }
        let Some(row) = rows.remove(&hash) else {
            return Ok(TokenConsume::NotFound);
        };
        if row.expires_at > SystemTime::now() {
            Ok(TokenConsume::Consumed { email: row.email })
        } else {
            Ok(TokenConsume::Expired)
        }
    }

    async fn peek(&self, raw_token: &str, kind: TokenKind) -> Result<Option<String>> {
        let hash = hash_email_token(raw_token);
        let rows = self.rows.lock().expect("token store lock");
        Ok(rows
            .get(&hash)
            .filter(|row| row.kind == kind && row.expires_at > SystemTime::now())
            .map(|row| row.email.clone()))
    }

    async fn replace_for_email(&self, email: &str, kind: TokenKind) -> Result<u64> {
        let mut rows = self.rows.lock().expect("token store lock");
        let before = rows.len();
        rows.retain(|_, row| !(row.email == email && row.kind == kind));
        Ok(u64::try_from(before - rows.len()).unwrap_or(0))
    }

    async fn seconds_since_last_issue(
        &self,
        email: &str,
        kind: TokenKind,
    ) -> Result<Option<i64>> {
        let rows = self.rows.lock().expect("token store lock");
        let newest = rows
            .values()
            .filter(|row| row.email == email && row.kind == kind)
            .map(|row| row.created_at)
            .max();
        Ok(newest.map(|created_at| {
            SystemTime::now()
                .duration_since(created_at)
                .map(|age| i64::try_from(age.as_secs()).unwrap_or(i64::MAX))
                .unwrap_or(0)
        }))
    }
}

#[derive(Default)]
pub(crate) struct MemoryUserStore {
    users: Mutex<Vec<User>>,
    logins: Mutex<HashMap<Uuid, usize>>,
}

impl MemoryUserStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn login_count(&self, id: Uuid) -> usize {
        self.logins
            .lock()
            .expect("login lock")
            .get(&id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.lock().expect("user store lock");
        Ok(users.iter().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let users = self.users.lock().expect("user store lock");
        Ok(users.iter().find(|user| user.id == id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<CreateUserOutcome> {
        let mut users = self.users.lock().expect("user store lock");
        if users.iter().any(|user| user.email == new_user.email) {
            return Ok(CreateUserOutcome::EmailTaken);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash: new_user.password_hash,
            email_verified: new_user.email_verified,
            is_active: new_user.is_active,
            roles: new_user.roles,
        };
        users.push(user.clone());
        Ok(CreateUserOutcome::Created(user))
    }

    async fn set_password_digest(&self, id: Uuid, digest: &str) -> Result<()> {
        let mut users = self.users.lock().expect("user store lock");
        if let Some(user) = users.iter_mut().find(|user| user.id == id) {
            user.password_hash = Some(digest.to_string());
        }
        Ok(())
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<()> {
        let mut users = self.users.lock().expect("user store lock");
        if let Some(user) = users.iter_mut().find(|user| user.id == id) {
            user.email_verified = true;
        }
        Ok(())
    }

    async fn record_login(&self, id: Uuid) -> Result<()> {
        let mut logins = self.logins.lock().expect("login lock");
        *logins.entry(id).or_insert(0) += 1;
        Ok(())
    }

    async fn activate_invited(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
        digest: &str,
    ) -> Result<()> {
        let mut users = self.users.lock().expect("user store lock");
        if let Some(user) = users.iter_mut().find(|user| user.id == id) {
            user.first_name = Some(first_name.to_string());
            user.last_name = Some(last_name.to_string());
            user.password_hash = Some(digest.to_string());
            user.is_active = true;
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryLinkedAccountStore {
    links: Mutex<Vec<(Uuid, String, String)>>,
}

impl MemoryLinkedAccountStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkedAccountStore for MemoryLinkedAccountStore {
    async fn find_user_by_provider(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<Uuid>> {
        let links = self.links.lock().expect("link store lock");
        Ok(links
            .iter()
            .find(|(_, p, a)| p == provider && a == provider_account_id)
            .map(|(user_id, _, _)| *user_id))
    }

    async fn user_has_provider(&self, user_id: Uuid, provider: &str) -> Result<bool> {
        let links = self.links.lock().expect("link store lock");
        Ok(links.iter().any(|(u, p, _)| *u == user_id && p == provider))
    }

    async fn link(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<LinkOutcome> {
        // Check-then-insert happens under one lock, mirroring the database
        // enforcing both unique constraints in a single statement.
        let mut links = self.links.lock().expect("link store lock");
        if links.iter().any(|(u, p, _)| *u == user_id && p == provider) {
            return Ok(LinkOutcome::AlreadyLinked);
        }
        if links
            .iter()
            .any(|(_, p, a)| p == provider && a == provider_account_id)
        {
            return Ok(LinkOutcome::ProviderIdentityTaken);
        }
        links.push((
            user_id,
            provider.to_string(),
            provider_account_id.to_string(),
        ));
        Ok(LinkOutcome::Linked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consume_is_single_use() -> Result<()> {
        let store = MemoryTokenStore::new();
        let token = store
            .issue("a@example.com", TokenKind::Verification, Duration::from_secs(60))
            .await?;
        assert_eq!(
            store.consume(&token, TokenKind::Verification).await?,
            TokenConsume::Consumed {
                email: "a@example.com".to_string()
            }
        );
        assert_eq!(
            store.consume(&token, TokenKind::Verification).await?,
            TokenConsume::NotFound
        );
        Ok(())
    }

    #[tokio::test]
    async fn consume_checks_kind() -> Result<()> {
        let store = MemoryTokenStore::new();
        let token = store
            .issue("a@example.com", TokenKind::Verification, Duration::from_secs(60))
            .await?;
        assert_eq!(
            store.consume(&token, TokenKind::PasswordReset).await?,
            TokenConsume::NotFound
        );
        // The mismatched consume must not have deleted the token.
        assert_eq!(
            store.consume(&token, TokenKind::Verification).await?,
            TokenConsume::Consumed {
                email: "a@example.com".to_string()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_reports_once_then_not_found() -> Result<()> {
        let store = MemoryTokenStore::new();
        let token = store
            .issue("a@example.com", TokenKind::MagicLink, Duration::ZERO)
            .await?;
        assert_eq!(
            store.consume(&token, TokenKind::MagicLink).await?,
            TokenConsume::Expired
        );
        assert_eq!(
            store.consume(&token, TokenKind::MagicLink).await?,
            TokenConsume::NotFound
        );
        Ok(())
    }

    #[tokio::test]
    async fn replace_invalidates_previous_tokens() -> Result<()> {
        let store = MemoryTokenStore::new();
        let first = store
            .issue("a@example.com", TokenKind::PasswordReset, Duration::from_secs(60))
            .await?;
        store
            .replace_for_email("a@example.com", TokenKind::PasswordReset)
            .await?;
        let second = store
            .issue("a@example.com", TokenKind::PasswordReset, Duration::from_secs(60))
            .await?;
        assert_eq!(
            store.consume(&first, TokenKind::PasswordReset).await?,
            TokenConsume::NotFound
        );
        assert_eq!(
            store.consume(&second, TokenKind::PasswordReset).await?,
            TokenConsume::Consumed {
                email: "a@example.com".to_string()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn link_enforces_both_invariants() -> Result<()> {
        let store = MemoryLinkedAccountStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        assert_eq!(store.link(alice, "google", "sub-1").await?, LinkOutcome::Linked);
        assert_eq!(
            store.link(alice, "google", "sub-2").await?,
            LinkOutcome::AlreadyLinked
        );
        assert_eq!(
            store.link(bob, "google", "sub-1").await?,
            LinkOutcome::ProviderIdentityTaken
        );
        Ok(())
    }
}
