//! Reconciles Google sign-ins with local account state.
//!
//! The decision procedure runs three disjoint cases in order: an existing
//! link authenticates directly, an email collision with a credentialed
//! account demands the two-step confirm/complete sub-protocol, and an unknown
//! email creates a fresh account. Auto-linking on email match alone is never
//! done; a provider-asserted email is not proof of account ownership.

use tracing::warn;

use super::error::AuthError;
use super::provider::ProviderError;
use super::state::AuthState;
use super::store::{
    CreateUserOutcome, LinkOutcome, NewUser, PROVIDER_GOOGLE, Role, RoleAssignment, TokenConsume,
    TokenKind, User,
};
use super::utils::normalize_email;

/// Collision payload handed back to the client so it can drive the
/// confirm/complete sub-protocol.
#[derive(Debug)]
pub(super) struct LinkChallenge {
    pub(super) token: String,
    pub(super) email: String,
    pub(super) display_name: String,
    pub(super) provider_account_id: String,
}

#[derive(Debug)]
pub(super) enum ProviderSignIn {
    Session { user: User, is_new_user: bool },
    LinkRequired(LinkChallenge),
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidToken => Self::Unauthorized,
            ProviderError::Unavailable(inner) => Self::Internal(inner),
        }
    }
}

/// Case analysis for a Google sign-in attempt.
pub(super) async fn sign_in_with_provider(
    state: &AuthState,
    access_token: &str,
) -> Result<ProviderSignIn, AuthError> {
    let profile = state.provider().fetch_profile(access_token).await?;
    if !profile.email_verified {
        return Err(AuthError::Validation(
            "Google account email is not verified".to_string(),
        ));
    }
    let email = normalize_email(&profile.email);

    // Case 1: this provider identity is already bound to a user.
    if let Some(user_id) = state
        .links()
        .find_user_by_provider(PROVIDER_GOOGLE, &profile.subject_id)
        .await?
    {
        let user = state
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }
        return Ok(ProviderSignIn::Session {
            user,
            is_new_user: false,
        });
    }

    // Case 2: no link, but the email belongs to an existing account.
    if let Some(user) = state.users().find_by_email(&email).await? {
        if user.password_hash.is_none() {
            // Mid-invitation accounts cannot be bootstrapped via Google.
            return Err(AuthError::RequiresInvitationAcceptance);
        }
        // Collision with a credentialed account: demand password proof.
        let token = state
            .tokens()
            .issue(&email, TokenKind::AccountLink, TokenKind::AccountLink.ttl())
            .await?;
        return Ok(ProviderSignIn::LinkRequired(LinkChallenge {
            token,
            email,
            display_name: profile.display_name(),
            provider_account_id: profile.subject_id,
        }));
    }

    // Case 3: brand new user; the provider already verified the email.
    let outcome = state
        .users()
        .create(NewUser {
            email: email.clone(),
            first_name: profile.given_name.clone(),
            last_name: profile.family_name.clone(),
            password_hash: None,
            email_verified: true,
            is_active: true,
            roles: vec![RoleAssignment {
                role: Role::User,
                permission_level: None,
            }],
        })
        .await?;
    let user = match outcome {
        CreateUserOutcome::Created(user) => user,
        // Lost a race with a concurrent registration; treat it as a collision.
        CreateUserOutcome::EmailTaken => {
            return Err(AuthError::EmailAlreadyRegistered);
        }
    };

    match state.links().link(user.id, PROVIDER_GOOGLE, &profile.subject_id).await? {
        LinkOutcome::Linked => {}
        LinkOutcome::AlreadyLinked => return Err(AuthError::AlreadyLinked),
        LinkOutcome::ProviderIdentityTaken => return Err(AuthError::ProviderIdentityTaken),
    }

    if let Err(err) = state.migrator().attach(&email, user.id).await {
        warn!(email = %email, "guest record migration failed: {err}");
    }

    Ok(ProviderSignIn::Session {
        user,
        is_new_user: true,
    })
}

/// First step of collision resolution: consume the link token and prove
/// password ownership. The caller then redoes the OAuth handshake, so the
/// provider identity presented at completion is fresh.
pub(super) async fn confirm_link(
    state: &AuthState,
    raw_token: &str,
    password: &str,
) -> Result<String, AuthError> {
    let email = match state
        .tokens()
        .consume(raw_token, TokenKind::AccountLink)
        .await?
    {
        TokenConsume::Consumed { email } => email,
        TokenConsume::NotFound => return Err(AuthError::InvalidToken),
        TokenConsume::Expired => return Err(AuthError::ExpiredToken),
    };

    let user = state
        .users()
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::InvalidToken)?;
    let digest = user
        .password_hash
        .as_deref()
        .ok_or(AuthError::NoLocalCredentials)?;
    if !state.hasher().verify(password, digest) {
        return Err(AuthError::InvalidCredentials);
    }

    Ok(email)
}

/// Second step: after a fresh OAuth handshake, bind the provider identity.
///
/// Uniqueness is re-validated at commit time by the store, closing the race
/// where two tabs complete linking concurrently.
pub(super) async fn complete_link(
    state: &AuthState,
    access_token: &str,
) -> Result<User, AuthError> {
    let profile = state.provider().fetch_profile(access_token).await?;
    if !profile.email_verified {
        return Err(AuthError::Validation(
            "Google account email is not verified".to_string(),
        ));
    }
    let email = normalize_email(&profile.email);

    let user = state
        .users()
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::NoAccountFound)?;
    if state
        .links()
        .user_has_provider(user.id, PROVIDER_GOOGLE)
        .await?
    {
        return Err(AuthError::AlreadyLinked);
    }

    match state
        .links()
        .link(user.id, PROVIDER_GOOGLE, &profile.subject_id)
        .await?
    {
        LinkOutcome::Linked => {}
        LinkOutcome::AlreadyLinked => return Err(AuthError::AlreadyLinked),
        LinkOutcome::ProviderIdentityTaken => return Err(AuthError::ProviderIdentityTaken),
    }

    if !user.email_verified {
        state.users().mark_email_verified(user.id).await?;
    }

    let mut user = user;
    user.email_verified = true;
    Ok(user)
}
