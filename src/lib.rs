//! # Talentgate (Job Board Authentication & Identity)
//!
//! `talentgate` is the authentication and identity-linking service behind the
//! Talentgate job board. It owns single-use email tokens, password
//! credentials, Google account linking, and session issuance; job and
//! application data live in other services.
//!
//! ## Email Tokens
//!
//! Every email-driven flow (verification, password reset, magic link,
//! invitations, account linking) is backed by a single-use token. Raw tokens
//! are only ever sent to the user; the database stores a SHA-256 hash, and
//! consumption is a single atomic delete so a token can never validate twice.
//!
//! ## Enumeration Safety
//!
//! Recovery-style flows (resend verification, forgot password) answer with
//! the same accepted-shaped response whether or not an account exists, and
//! the issuance cooldown is tracked per email address rather than per user so
//! response timing cannot be used to probe for registered emails.
//!
//! ## Account Linking
//!
//! A Google sign-in that collides with an existing password account is never
//! linked automatically. The owner must prove the password through a
//! short-lived link token before the Google identity is attached.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
