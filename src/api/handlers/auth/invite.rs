//! Staff invitation endpoints (admin-gated).

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::warn;

use crate::api::email::{self, EmailMessage};

use super::error::AuthError;
use super::principal::{Capability, Principal, require_auth};
use super::session::issue_session;
use super::state::AuthState;
use super::store::{
    CreateUserOutcome, LinkOutcome, NewUser, PROVIDER_CREDENTIALS, PermissionLevel, Role,
    RoleAssignment, TokenConsume, TokenKind, User,
};
use super::types::{
    AcceptInvitationRequest, InvitationStatusResponse, InviteRequest, InviteResponse,
    MessageResponse, UserSummary,
};
use super::credentials::acceptable_password;
use super::utils::{build_token_url, normalize_email, valid_email};

fn invitation_email(frontend_base_url: &str, email: &str, token: &str) -> EmailMessage {
    let url = build_token_url(frontend_base_url, "accept-invitation", token);
    EmailMessage {
        to: email.to_string(),
        subject: "You have been invited to Talentgate".to_string(),
        html: format!(
            "<p>You've been invited to join the Talentgate team.</p>\
             <p><a href=\"{url}\">Accept the invitation</a></p>\
             <p>The invitation expires in 7 days.</p>"
        ),
    }
}

fn require_invite_capability(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<Principal, AuthError> {
    let principal = require_auth(headers, state)?;
    if !state
        .authorizer()
        .can(&principal, Capability::ManageInvitations)
    {
        return Err(AuthError::Forbidden);
    }
    Ok(principal)
}

/// Create an inactive account and issue the 7-day invitation token.
///
/// Invitations are admin-initiated, so the end-user issuance cooldown does
/// not apply; resend reuses the same path deliberately.
pub(super) async fn invite_flow(state: &AuthState, request: InviteRequest) -> Result<User, AuthError> {
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::Validation("Invalid email address".to_string()));
    }
    let role = Role::parse(&request.role).ok_or(AuthError::RoleNotFound)?;
    let permission_level = if role == Role::Staff {
        match request.permission_level.as_deref() {
            Some(raw) => Some(
                PermissionLevel::parse(raw)
                    .ok_or_else(|| AuthError::Validation("Unknown permission level".to_string()))?,
            ),
            None => None,
        }
    } else {
        None
    };

    if state.users().find_by_email(&email).await?.is_some() {
        return Err(AuthError::EmailAlreadyRegistered);
    }

    let outcome = state
        .users()
        .create(NewUser {
            email: email.clone(),
            first_name: None,
            last_name: None,
            password_hash: None,
            email_verified: false,
            is_active: false,
            roles: vec![RoleAssignment {
                role,
                permission_level,
            }],
        })
        .await?;
    let user = match outcome {
        CreateUserOutcome::Created(user) => user,
        CreateUserOutcome::EmailTaken => return Err(AuthError::EmailAlreadyRegistered),
    };

    state
        .tokens()
        .replace_for_email(&email, TokenKind::Invitation)
        .await?;
    let token = state
        .tokens()
        .issue(&email, TokenKind::Invitation, TokenKind::Invitation.ttl())
        .await?;
    email::dispatch(
        state.mailer(),
        invitation_email(state.config().frontend_base_url(), &email, &token),
    );

    Ok(user)
}

/// Reissue an invitation; prior tokens for the email are swept.
pub(super) async fn resend_invitation_flow(state: &AuthState, email: &str) -> Result<(), AuthError> {
    let email = normalize_email(email);

    let user = state
        .users()
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::NoAccountFound)?;
    if user.password_hash.is_some() || user.is_active {
        return Err(AuthError::Validation(
            "Invitation has already been accepted".to_string(),
        ));
    }

    state
        .tokens()
        .replace_for_email(&email, TokenKind::Invitation)
        .await?;
    let token = state
        .tokens()
        .issue(&email, TokenKind::Invitation, TokenKind::Invitation.ttl())
        .await?;
    email::dispatch(
        state.mailer(),
        invitation_email(state.config().frontend_base_url(), &email, &token),
    );

    Ok(())
}

/// Read-only validity check for the acceptance page.
///
/// Valid iff a live invitation token exists and the account still has no
/// local credential. Never consumes the token.
pub(super) async fn verify_invitation_flow(
    state: &AuthState,
    raw_token: &str,
) -> Result<InvitationStatusResponse, AuthError> {
    let invalid = InvitationStatusResponse {
        valid: false,
        email: None,
        role: None,
    };

    let Some(email) = state.tokens().peek(raw_token, TokenKind::Invitation).await? else {
        return Ok(invalid);
    };
    let Some(user) = state.users().find_by_email(&email).await? else {
        return Ok(invalid);
    };
    if user.password_hash.is_some() {
        return Ok(invalid);
    }

    Ok(InvitationStatusResponse {
        valid: true,
        email: Some(user.email.clone()),
        role: user
            .roles
            .first()
            .map(|assignment| assignment.role.as_str().to_string()),
    })
}

/// Consume the invitation, set name and credentials, and activate the user.
pub(super) async fn accept_invitation_flow(
    state: &AuthState,
    request: AcceptInvitationRequest,
) -> Result<User, AuthError> {
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

    let email = match state
        .tokens()
        .consume(request.token.trim(), TokenKind::Invitation)
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
    if user.password_hash.is_some() {
        return Err(AuthError::AlreadyHasCredentials);
    }

    let digest = state.hasher().hash(&request.password)?;
    state
        .users()
        .activate_invited(user.id, first_name, last_name, &digest)
        .await?;

    if let Err(err) = state.migrator().attach(&email, user.id).await {
        warn!(email = %email, "guest record migration failed: {err}");
    }
    // Record the local credential as a linked account alongside any future
    // provider bindings.
    match state
        .links()
        .link(user.id, PROVIDER_CREDENTIALS, &user.id.to_string())
        .await?
    {
        LinkOutcome::Linked => {}
        outcome => warn!(user_id = %user.id, "credentials link skipped: {outcome:?}"),
    }

    let mut user = user;
    user.first_name = Some(first_name.to_string());
    user.last_name = Some(last_name.to_string());
    user.password_hash = Some(digest);
    user.is_active = true;
    Ok(user)
}

#[utoipa::path(
    post,
    path = "/v1/auth/invitations",
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Invitation created and emailed", body = InviteResponse),
        (status = 400, description = "Email already registered or unknown role", body = super::error::ErrorResponse),
        (status = 403, description = "Caller may not manage invitations", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn invite(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<InviteRequest>>,
) -> impl IntoResponse {
    if let Err(err) = require_invite_capability(&headers, &state) {
        return err.into_response();
    }
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match invite_flow(&state, request).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(InviteResponse {
                message: "Invitation sent".to_string(),
                user: UserSummary::from(&user),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/invitations/resend",
    request_body = super::types::EmailRequest,
    responses(
        (status = 200, description = "Invitation reissued", body = MessageResponse),
        (status = 404, description = "No invited user for this email", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn resend_invitation(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<super::types::EmailRequest>>,
) -> impl IntoResponse {
    if let Err(err) = require_invite_capability(&headers, &state) {
        return err.into_response();
    }
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match resend_invitation_flow(&state, &request.email).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Invitation sent".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/invitations/{token}",
    params(
        ("token" = String, Path, description = "Raw invitation token")
    ),
    responses(
        (status = 200, description = "Invitation status", body = InvitationStatusResponse)
    ),
    tag = "auth"
)]
pub async fn verify_invitation(
    state: Extension<Arc<AuthState>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    match verify_invitation_flow(&state, token.trim()).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/invitations/accept",
    request_body = AcceptInvitationRequest,
    responses(
        (status = 200, description = "Invitation accepted; session cookie set", body = super::types::SessionResponse),
        (status = 401, description = "Invalid or expired invitation", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn accept_invitation(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<AcceptInvitationRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match accept_invitation_flow(&state, request).await {
        Ok(user) => match issue_session(&state, &user, None).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        },
        Err(err) => err.into_response(),
    }
}
