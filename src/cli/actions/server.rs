use crate::api;
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub session_secret: String,
    pub session_ttl_seconds: i64,
    pub email_cooldown_seconds: i64,
    pub cookie_cross_site: bool,
    pub google_userinfo_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = api::handlers::auth::AuthConfig::new(args.frontend_base_url)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_cooldown_seconds(args.email_cooldown_seconds)
        .with_cookie_cross_site(args.cookie_cross_site)
        .with_google_userinfo_url(args.google_userinfo_url);

    api::new(
        args.port,
        args.dsn,
        SecretString::from(args.session_secret),
        auth_config,
    )
    .await
}
