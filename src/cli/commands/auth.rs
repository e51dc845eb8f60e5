use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_EMAIL_COOLDOWN_SECONDS: &str = "email-cooldown-seconds";
pub const ARG_COOKIE_CROSS_SITE: &str = "cookie-cross-site";
pub const ARG_GOOGLE_USERINFO_URL: &str = "google-userinfo-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for links in outbound emails")
                .env("TALENTGATE_FRONTEND_BASE_URL")
                .default_value("https://talentgate.dev"),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session tokens")
                .env("TALENTGATE_SESSION_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("TALENTGATE_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_EMAIL_COOLDOWN_SECONDS)
                .long(ARG_EMAIL_COOLDOWN_SECONDS)
                .help("Cooldown between token emails of the same kind")
                .env("TALENTGATE_EMAIL_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_COOKIE_CROSS_SITE)
                .long(ARG_COOKIE_CROSS_SITE)
                .help("Frontend is served from another origin (SameSite=None cookies)")
                .env("TALENTGATE_COOKIE_CROSS_SITE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_GOOGLE_USERINFO_URL)
                .long(ARG_GOOGLE_USERINFO_URL)
                .help("Google OAuth2 userinfo endpoint")
                .env("TALENTGATE_GOOGLE_USERINFO_URL")
                .default_value("https://www.googleapis.com/oauth2/v3/userinfo"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub session_secret: String,
    pub session_ttl_seconds: i64,
    pub email_cooldown_seconds: i64,
    pub cookie_cross_site: bool,
    pub google_userinfo_url: String,
}

impl Options {
    /// Extract auth options from validated CLI matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
            session_secret: matches
                .get_one::<String>(ARG_SESSION_SECRET)
                .cloned()
                .context("missing required argument: --session-secret")?,
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(604_800),
            email_cooldown_seconds: matches
                .get_one::<i64>(ARG_EMAIL_COOLDOWN_SECONDS)
                .copied()
                .unwrap_or(60),
            cookie_cross_site: matches
                .get_one::<bool>(ARG_COOKIE_CROSS_SITE)
                .copied()
                .unwrap_or(false),
            google_userinfo_url: matches
                .get_one::<String>(ARG_GOOGLE_USERINFO_URL)
                .cloned()
                .context("missing required argument: --google-userinfo-url")?,
        })
    }
}
