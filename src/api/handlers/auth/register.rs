//! Registration and email verification endpoints.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::warn;

use crate::api::email::{self, EmailMessage};

use super::cooldown::CooldownDecision;
use super::credentials::acceptable_password;
use super::error::AuthError;
use super::state::AuthState;
use super::store::{
    CreateUserOutcome, NewUser, Role, RoleAssignment, TokenConsume, TokenKind, User,
};
use super::types::{
    AcceptedResponse, EmailRequest, RegisterRequest, RegisterResponse, UserSummary,
    VerifyEmailRequest, VerifyEmailResponse,
};
use super::utils::{build_token_url, normalize_email, valid_email};

pub(super) fn verification_email(frontend_base_url: &str, email: &str, token: &str) -> EmailMessage {
    let url = build_token_url(frontend_base_url, "verify-email", token);
    EmailMessage {
        to: email.to_string(),
        subject: "Verify your Talentgate email".to_string(),
        html: format!(
            "<p>Welcome to Talentgate!</p>\
             <p><a href=\"{url}\">Verify your email address</a></p>\
             <p>The link expires in 24 hours.</p>"
        ),
    }
}

/// Create the account, queue the verification email, and report the summary.
pub(super) async fn register_flow(
    state: &AuthState,
    request: RegisterRequest,
) -> Result<User, AuthError> {
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::Validation("Invalid email address".to_string()));
    }
    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(AuthError::Validation(
            "First and last name are required".to_string(),
        ));
    }
    if !acceptable_password(&request.password) {
        return Err(AuthError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let digest = state.hasher().hash(&request.password)?;
    let outcome = state
        .users()
        .create(NewUser {
            email: email.clone(),
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            password_hash: Some(digest),
            email_verified: false,
            is_active: true,
            roles: vec![RoleAssignment {
                role: Role::User,
                permission_level: None,
            }],
        })
        .await?;
    let user = match outcome {
        CreateUserOutcome::Created(user) => user,
        // Registration is the one flow allowed to reveal that the email is taken.
        CreateUserOutcome::EmailTaken => return Err(AuthError::EmailAlreadyRegistered),
    };

    if let Err(err) = state.migrator().attach(&email, user.id).await {
        warn!(email = %email, "guest record migration failed: {err}");
    }

    // Token commits before the email attempt; send failure never rolls it back.
    state
        .tokens()
        .replace_for_email(&email, TokenKind::Verification)
        .await?;
    let token = state
        .tokens()
        .issue(&email, TokenKind::Verification, TokenKind::Verification.ttl())
        .await?;
    email::dispatch(
        state.mailer(),
        verification_email(state.config().frontend_base_url(), &email, &token),
    );

    Ok(user)
}

/// Consume a verification token and flip `email_verified`.
pub(super) async fn verify_email_flow(
    state: &AuthState,
    raw_token: &str,
) -> Result<bool, AuthError> {
    let email = match state
        .tokens()
        .consume(raw_token, TokenKind::Verification)
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

    if user.email_verified {
        return Ok(false);
    }
    state.users().mark_email_verified(user.id).await?;
    Ok(true)
}

/// Reissue a verification token if (and only if) the account needs one.
///
/// All branches produce the same accepted-shaped result; missing accounts,
/// already-verified accounts, and active cooldowns are silent no-ops.
pub(super) async fn resend_verification_flow(
    state: &AuthState,
    email: &str,
) -> Result<(), AuthError> {
    let email = normalize_email(email);
    if !valid_email(&email) {
        return Ok(());
    }

    let user = match state.users().find_by_email(&email).await? {
        Some(user) if !user.email_verified => user,
        _ => return Ok(()),
    };

    if let CooldownDecision::Active { .. } = state
        .cooldown()
        .check(state.tokens(), &email, TokenKind::Verification)
        .await?
    {
        return Ok(());
    }

    state
        .tokens()
        .replace_for_email(&email, TokenKind::Verification)
        .await?;
    let token = state
        .tokens()
        .issue(&email, TokenKind::Verification, TokenKind::Verification.ttl())
        .await?;
    email::dispatch(
        state.mailer(),
        verification_email(state.config().frontend_base_url(), &user.email, &token),
    );

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification email queued", body = RegisterResponse),
        (status = 400, description = "Validation failed or email already registered", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match register_flow(&state, request).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                message: "Account created; check your email to verify the address".to_string(),
                user: UserSummary::from(&user),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = VerifyEmailResponse),
        (status = 401, description = "Invalid or expired token", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let token = request.token.trim();
    if token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    }

    match verify_email_flow(&state, token).await {
        Ok(status_updated) => (
            StatusCode::OK,
            Json(VerifyEmailResponse {
                message: "Email verified".to_string(),
                status_updated,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/resend-verification",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Resend accepted (shape is identical whether or not the account exists)", body = AcceptedResponse)
    ),
    tag = "auth"
)]
pub async fn resend_verification(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<EmailRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match resend_verification_flow(&state, &request.email).await {
        Ok(()) => accepted_response(&state),
        Err(AuthError::Internal(err)) => AuthError::Internal(err).into_response(),
        // Keep the response opaque even for unexpected flow errors.
        Err(_) => accepted_response(&state),
    }
}

/// Shared accepted-shape body for enumeration-safe flows.
pub(super) fn accepted_response(state: &AuthState) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(AcceptedResponse {
            message: "If the account exists, an email is on its way".to_string(),
            cooldown_seconds: state.cooldown().window_seconds(),
        }),
    )
        .into_response()
}
