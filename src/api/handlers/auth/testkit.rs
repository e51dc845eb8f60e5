//! Shared fixtures for flow-level tests.

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::api::email::{EmailMessage, Mailer};

use super::guest::GuestMigrator;
use super::principal::RoleAuthorizer;
use super::provider::{ExternalProfile, IdentityProvider, ProviderError};
use super::session::SessionSigner;
use super::state::{AuthConfig, AuthState};
use super::store::memory::{MemoryLinkedAccountStore, MemoryTokenStore, MemoryUserStore};

/// Captures outbound email instead of sending it.
#[derive(Default)]
pub(super) struct RecordingMailer {
    messages: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub(super) fn sent_count(&self) -> usize {
        self.messages.lock().expect("mailer lock").len()
    }

    /// Raw token parsed out of the most recent message's link fragment.
    pub(super) fn last_token(&self) -> Option<String> {
        let messages = self.messages.lock().expect("mailer lock");
        let html = &messages.last()?.html;
        let start = html.find("#token=")? + "#token=".len();
        let rest = &html[start..];
        let end = rest.find('"').unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        self.messages
            .lock()
            .expect("mailer lock")
            .push(message.clone());
        Ok(())
    }
}

/// Serves canned profiles keyed by access token.
#[derive(Default)]
pub(super) struct StaticIdentityProvider {
    profiles: Mutex<HashMap<String, ExternalProfile>>,
}

impl StaticIdentityProvider {
    pub(super) fn insert(&self, access_token: &str, profile: ExternalProfile) {
        self.profiles
            .lock()
            .expect("provider lock")
            .insert(access_token.to_string(), profile);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, ProviderError> {
        self.profiles
            .lock()
            .expect("provider lock")
            .get(access_token)
            .cloned()
            .ok_or(ProviderError::InvalidToken)
    }
}

/// Records guest-record migrations instead of performing them.
#[derive(Default)]
pub(super) struct RecordingMigrator {
    attached: Mutex<Vec<(String, Uuid)>>,
}

impl RecordingMigrator {
    pub(super) fn attach_count(&self) -> usize {
        self.attached.lock().expect("migrator lock").len()
    }
}

#[async_trait]
impl GuestMigrator for RecordingMigrator {
    async fn attach(&self, email: &str, user_id: Uuid) -> Result<()> {
        self.attached
            .lock()
            .expect("migrator lock")
            .push((email.to_string(), user_id));
        Ok(())
    }
}

pub(super) struct TestBackend {
    pub(super) state: Arc<AuthState>,
    pub(super) users: Arc<MemoryUserStore>,
    pub(super) tokens: Arc<MemoryTokenStore>,
    pub(super) links: Arc<MemoryLinkedAccountStore>,
    pub(super) mailer: Arc<RecordingMailer>,
    pub(super) provider: Arc<StaticIdentityProvider>,
    pub(super) migrator: Arc<RecordingMigrator>,
}

/// Build a fully wired state over in-memory stores.
pub(super) fn backend() -> TestBackend {
    let users = Arc::new(MemoryUserStore::new());
    let tokens = Arc::new(MemoryTokenStore::new());
    let links = Arc::new(MemoryLinkedAccountStore::new());
    let mailer = Arc::new(RecordingMailer::default());
    let provider = Arc::new(StaticIdentityProvider::default());
    let migrator = Arc::new(RecordingMigrator::default());

    let config = AuthConfig::new("http://localhost:3000".to_string());
    let signer = SessionSigner::new(SecretString::from("test-secret".to_string()));
    let state = Arc::new(AuthState::new(
        config,
        signer,
        users.clone(),
        tokens.clone(),
        links.clone(),
        mailer.clone(),
        provider.clone(),
        migrator.clone(),
        Arc::new(RoleAuthorizer),
    ));

    TestBackend {
        state,
        users,
        tokens,
        links,
        mailer,
        provider,
        migrator,
    }
}

/// Verified Google profile fixture.
pub(super) fn google_profile(email: &str, subject_id: &str) -> ExternalProfile {
    ExternalProfile {
        subject_id: subject_id.to_string(),
        email: email.to_string(),
        email_verified: true,
        given_name: Some("Grace".to_string()),
        family_name: Some("Hopper".to_string()),
    }
}
