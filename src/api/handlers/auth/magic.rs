//! Passwordless ("magic link") sign-in endpoints.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use crate::api::email::{self, EmailMessage};

use super::cooldown::CooldownDecision;
use super::error::AuthError;
use super::session::issue_session;
use super::state::AuthState;
use super::store::{TokenConsume, TokenKind, User};
use super::types::{AcceptedResponse, EmailRequest, VerifyEmailRequest};
use super::utils::{build_token_url, normalize_email, valid_email};

fn magic_link_email(frontend_base_url: &str, email: &str, token: &str) -> EmailMessage {
    let url = build_token_url(frontend_base_url, "magic-link", token);
    EmailMessage {
        to: email.to_string(),
        subject: "Your Talentgate sign-in link".to_string(),
        html: format!(
            "<p><a href=\"{url}\">Sign in to Talentgate</a></p>\
             <p>The link expires in 15 minutes and can be used once.</p>"
        ),
    }
}

/// Request a sign-in link.
///
/// Unlike password recovery this is the primary sign-in path, so a missing
/// account is an explicit `NoAccountFound` rather than an opaque accept.
/// The cooldown check always runs first.
pub(super) async fn magic_link_request_flow(
    state: &AuthState,
    email: &str,
) -> Result<(), AuthError> {
    let email = normalize_email(email);
    if !valid_email(&email) {
        return Err(AuthError::Validation("Invalid email address".to_string()));
    }

    if let CooldownDecision::Active { remaining_seconds } = state
        .cooldown()
        .check(state.tokens(), &email, TokenKind::MagicLink)
        .await?
    {
        return Err(AuthError::CooldownActive { remaining_seconds });
    }

    let user = state
        .users()
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::NoAccountFound)?;
    if !user.is_active {
        return Err(AuthError::AccountDeactivated);
    }

    state
        .tokens()
        .replace_for_email(&email, TokenKind::MagicLink)
        .await?;
    let token = state
        .tokens()
        .issue(&email, TokenKind::MagicLink, TokenKind::MagicLink.ttl())
        .await?;
    email::dispatch(
        state.mailer(),
        magic_link_email(state.config().frontend_base_url(), &email, &token),
    );

    Ok(())
}

/// Consume a sign-in link and authenticate.
///
/// Receiving the link proves control of the mailbox, so the email is marked
/// verified on the way through.
pub(super) async fn magic_link_verify_flow(
    state: &AuthState,
    raw_token: &str,
) -> Result<User, AuthError> {
    let email = match state
        .tokens()
        .consume(raw_token, TokenKind::MagicLink)
        .await?
    {
        TokenConsume::Consumed { email } => email,
        TokenConsume::NotFound => return Err(AuthError::InvalidToken),
        TokenConsume::Expired => return Err(AuthError::ExpiredToken),
    };

    let mut user = state
        .users()
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::InvalidToken)?;
    if !user.is_active {
        return Err(AuthError::AccountDeactivated);
    }

    if !user.email_verified {
        state.users().mark_email_verified(user.id).await?;
        user.email_verified = true;
    }

    Ok(user)
}

#[utoipa::path(
    post,
    path = "/v1/auth/magic-link",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Sign-in link sent", body = AcceptedResponse),
        (status = 404, description = "No account for this email", body = super::error::ErrorResponse),
        (status = 429, description = "Cooldown active", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn magic_link_request(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<EmailRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match magic_link_request_flow(&state, &request.email).await {
        Ok(()) => (
            StatusCode::OK,
            Json(AcceptedResponse {
                message: "Check your email for a sign-in link".to_string(),
                cooldown_seconds: state.cooldown().window_seconds(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/magic-link/verify",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Authenticated; session cookie set", body = super::types::SessionResponse),
        (status = 401, description = "Invalid or expired link", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn magic_link_verify(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match magic_link_verify_flow(&state, request.token.trim()).await {
        Ok(user) => match issue_session(&state, &user, None).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        },
        Err(err) => err.into_response(),
    }
}
