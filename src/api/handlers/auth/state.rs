//! Auth configuration and shared flow state.

use std::sync::Arc;

use crate::api::email::Mailer;

use super::cooldown::{CooldownPolicy, DEFAULT_COOLDOWN_SECONDS};
use super::credentials::CredentialHasher;
use super::guest::GuestMigrator;
use super::principal::Authorizer;
use super::provider::IdentityProvider;
use super::session::SessionSigner;
use super::store::{LinkedAccountStore, TokenStore, UserStore};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    cookie_cross_site: bool,
    cooldown_seconds: i64,
    session_ttl_seconds: i64,
    google_userinfo_url: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            cookie_cross_site: false,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            google_userinfo_url: DEFAULT_GOOGLE_USERINFO_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_cookie_cross_site(mut self, cross_site: bool) -> Self {
        self.cookie_cross_site = cross_site;
        self
    }

    #[must_use]
    pub fn with_cooldown_seconds(mut self, seconds: i64) -> Self {
        self.cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_google_userinfo_url(mut self, url: String) -> Self {
        self.google_userinfo_url = url;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn google_userinfo_url(&self) -> &str {
        &self.google_userinfo_url
    }

    pub(super) fn cookie_cross_site(&self) -> bool {
        self.cookie_cross_site
    }

    /// Secure cookies for production (https frontend) or cross-origin setups.
    pub(super) fn cookie_secure(&self) -> bool {
        self.cookie_cross_site || self.frontend_base_url.starts_with("https://")
    }

    pub(super) fn cooldown_seconds(&self) -> i64 {
        self.cooldown_seconds
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }
}

/// Everything a flow needs, injected once at server startup.
pub struct AuthState {
    config: AuthConfig,
    cooldown: CooldownPolicy,
    hasher: CredentialHasher,
    signer: SessionSigner,
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    links: Arc<dyn LinkedAccountStore>,
    mailer: Arc<dyn Mailer>,
    provider: Arc<dyn IdentityProvider>,
    migrator: Arc<dyn GuestMigrator>,
    authorizer: Arc<dyn Authorizer>,
}

impl AuthState {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: AuthConfig,
        signer: SessionSigner,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        links: Arc<dyn LinkedAccountStore>,
        mailer: Arc<dyn Mailer>,
        provider: Arc<dyn IdentityProvider>,
        migrator: Arc<dyn GuestMigrator>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let cooldown = CooldownPolicy::new(config.cooldown_seconds());
        Self {
            config,
            cooldown,
            hasher: CredentialHasher,
            signer,
            users,
            tokens,
            links,
            mailer,
            provider,
            migrator,
            authorizer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn cooldown(&self) -> &CooldownPolicy {
        &self.cooldown
    }

    pub(super) fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    pub(crate) fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    pub(super) fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    pub(super) fn tokens(&self) -> &dyn TokenStore {
        self.tokens.as_ref()
    }

    pub(super) fn links(&self) -> &dyn LinkedAccountStore {
        self.links.as_ref()
    }

    pub(super) fn mailer(&self) -> &Arc<dyn Mailer> {
        &self.mailer
    }

    pub(super) fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    pub(super) fn migrator(&self) -> &dyn GuestMigrator {
        self.migrator.as_ref()
    }

    pub(super) fn authorizer(&self) -> &dyn Authorizer {
        self.authorizer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://talentgate.dev".to_string());

        assert_eq!(config.frontend_base_url(), "https://talentgate.dev");
        assert_eq!(config.cooldown_seconds(), DEFAULT_COOLDOWN_SECONDS);
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert!(!config.cookie_cross_site());
        assert!(config.cookie_secure());
        assert_eq!(config.google_userinfo_url(), DEFAULT_GOOGLE_USERINFO_URL);

        let config = config
            .with_cooldown_seconds(30)
            .with_session_ttl_seconds(3600)
            .with_cookie_cross_site(true)
            .with_google_userinfo_url("https://accounts.test/userinfo".to_string());

        assert_eq!(config.cooldown_seconds(), 30);
        assert_eq!(config.session_ttl_seconds(), 3600);
        assert!(config.cookie_cross_site());
        assert_eq!(
            config.google_userinfo_url(),
            "https://accounts.test/userinfo"
        );
    }

    #[test]
    fn http_frontend_without_cross_site_is_not_secure() {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        assert!(!config.cookie_secure());
    }
}
