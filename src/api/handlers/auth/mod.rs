//! Auth flows and supporting modules.
//!
//! This module coordinates registration, password and passwordless login,
//! email verification, staff invitations, and Google account linking.
//!
//! ## Single-Use Tokens
//!
//! Every email-driven flow issues an opaque random token whose SHA-256 hash
//! is stored with a per-kind TTL. Consumption is one atomic delete, so a
//! token can never validate twice, and issuing a replacement sweeps older
//! tokens of the same kind for that email.
//!
//! ## Issuance Cooldown
//!
//! User-initiated token emails honor a 60 second cooldown per (email, kind),
//! measured from the newest token's creation time. The window is tracked for
//! addresses without an account too, so cooldown behavior cannot be used to
//! probe which emails are registered.
//!
//! ## Collision Handling
//!
//! A Google sign-in whose email matches an existing password account returns
//! a `link_required` conflict instead of linking silently. The client proves
//! the password against a short-lived account-link token, redoes the OAuth
//! handshake, and only then is the provider identity bound, with both
//! uniqueness invariants re-checked at commit time.

pub(crate) mod cooldown;
pub(crate) mod credentials;
pub(crate) mod error;
pub(crate) mod google;
mod guest;
pub(crate) mod invite;
mod linker;
pub(crate) mod login;
pub(crate) mod magic;
pub(crate) mod password;
pub(crate) mod principal;
mod provider;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod store;
pub(crate) mod types;
mod utils;

pub use cooldown::CooldownPolicy;
pub use credentials::CredentialHasher;
pub use guest::{GuestMigrator, LogGuestMigrator};
pub use principal::{Authorizer, Capability, Principal, RoleAuthorizer};
pub use provider::{GoogleIdentityProvider, IdentityProvider};
pub use session::SessionSigner;
pub use state::{AuthConfig, AuthState};
pub use store::postgres::{PgLinkedAccountStore, PgTokenStore, PgUserStore};

#[cfg(test)]
mod testkit;
