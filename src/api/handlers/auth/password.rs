//! Password recovery and lifecycle endpoints.

use axum::{Json, extract::Extension, http::{HeaderMap, StatusCode}, response::IntoResponse};
use std::sync::Arc;

use crate::api::email::{self, EmailMessage};

use super::cooldown::CooldownDecision;
use super::credentials::acceptable_password;
use super::error::AuthError;
use super::principal::{Principal, require_auth};
use super::register::accepted_response;
use super::state::AuthState;
use super::store::{TokenConsume, TokenKind};
use super::types::{
    ChangePasswordRequest, EmailRequest, MessageResponse, ResetPasswordRequest, SetPasswordRequest,
};
use super::utils::{build_token_url, normalize_email, valid_email};

fn reset_email(frontend_base_url: &str, email: &str, token: &str) -> EmailMessage {
    let url = build_token_url(frontend_base_url, "reset-password", token);
    EmailMessage {
        to: email.to_string(),
        subject: "Reset your Talentgate password".to_string(),
        html: format!(
            "<p>Someone requested a password reset for this address.</p>\
             <p><a href=\"{url}\">Choose a new password</a></p>\
             <p>The link expires in 1 hour. If this wasn't you, ignore this email.</p>"
        ),
    }
}

/// Start a password reset.
///
/// The token is issued whether or not an account exists (it is keyed by the
/// email string alone), so the cooldown and the response shape are identical
/// in both cases; only the email send is conditional.
pub(super) async fn forgot_password_flow(state: &AuthState, email: &str) -> Result<(), AuthError> {
    let email = normalize_email(email);
    if !valid_email(&email) {
        return Ok(());
    }

    if let CooldownDecision::Active { remaining_seconds } = state
        .cooldown()
        .check(state.tokens(), &email, TokenKind::PasswordReset)
        .await?
    {
        return Err(AuthError::CooldownActive { remaining_seconds });
    }

    state
        .tokens()
        .replace_for_email(&email, TokenKind::PasswordReset)
        .await?;
    let token = state
        .tokens()
        .issue(
            &email,
            TokenKind::PasswordReset,
            TokenKind::PasswordReset.ttl(),
        )
        .await?;

    if state.users().find_by_email(&email).await?.is_some() {
        email::dispatch(
            state.mailer(),
            reset_email(state.config().frontend_base_url(), &email, &token),
        );
    }

    Ok(())
}

/// Consume a reset token and replace the digest.
///
/// No current-password proof here: possession of the emailed token is the
/// gate. Deactivated accounts are rejected after the token is consumed.
pub(super) async fn reset_password_flow(
    state: &AuthState,
    raw_token: &str,
    password: &str,
) -> Result<(), AuthError> {
    if !acceptable_password(password) {
        return Err(AuthError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let email = match state
        .tokens()
        .consume(raw_token, TokenKind::PasswordReset)
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
    if !user.is_active {
        return Err(AuthError::AccountDeactivated);
    }

    let digest = state.hasher().hash(password)?;
    state.users().set_password_digest(user.id, &digest).await?;
    Ok(())
}

/// Authenticated password change with current-password proof.
pub(super) async fn change_password_flow(
    state: &AuthState,
    principal: &Principal,
    request: ChangePasswordRequest,
) -> Result<(), AuthError> {
    let user = state
        .users()
        .find_by_id(principal.user_id)
        .await?
        .ok_or(AuthError::Unauthorized)?;
    let Some(digest) = user.password_hash.as_deref() else {
        return Err(AuthError::NoLocalCredentials);
    };

    if !state.hasher().verify(&request.current_password, digest) {
        return Err(AuthError::InvalidCurrentPassword);
    }
    if !acceptable_password(&request.new_password) {
        return Err(AuthError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if state.hasher().verify(&request.new_password, digest) {
        return Err(AuthError::SameAsCurrentPassword);
    }

    let new_digest = state.hasher().hash(&request.new_password)?;
    state
        .users()
        .set_password_digest(user.id, &new_digest)
        .await?;
    Ok(())
}

/// First local credential for a Google-only account.
pub(super) async fn set_password_flow(
    state: &AuthState,
    principal: &Principal,
    password: &str,
) -> Result<(), AuthError> {
    let user = state
        .users()
        .find_by_id(principal.user_id)
        .await?
        .ok_or(AuthError::Unauthorized)?;
    if user.password_hash.is_some() {
        return Err(AuthError::AlreadyHasCredentials);
    }
    if !acceptable_password(password) {
        return Err(AuthError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let digest = state.hasher().hash(password)?;
    state.users().set_password_digest(user.id, &digest).await?;
    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset accepted (shape is identical whether or not the account exists)", body = super::types::AcceptedResponse),
        (status = 429, description = "Cooldown active", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<EmailRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match forgot_password_flow(&state, &request.email).await {
        Ok(()) => accepted_response(&state),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = MessageResponse),
        (status = 401, description = "Invalid or expired token", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match reset_password_flow(&state, request.token.trim(), &request.password).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Password updated; you can sign in now".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Not signed in or wrong current password", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match change_password_flow(&state, &principal, request).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Password changed".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/set-password",
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Password set", body = MessageResponse),
        (status = 400, description = "Account already has a password", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn set_password(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<SetPasswordRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match set_password_flow(&state, &principal, &request.password).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Password set".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
