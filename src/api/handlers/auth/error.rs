//! Flow error taxonomy and its HTTP mapping.
//!
//! Every auth flow recovers into one of these variants at the handler
//! boundary. Only genuine infrastructure failures travel through `Internal`,
//! and those surface as a generic 500 without internal detail.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("This account has been deactivated")]
    AccountDeactivated,
    #[error("Please verify your email address before signing in")]
    EmailNotVerified,
    #[error("This account uses Google sign-in; use Google or set a password first")]
    NoLocalCredentials,
    #[error("This account already has a password")]
    AlreadyHasCredentials,
    #[error("New password must be different from the current password")]
    SameAsCurrentPassword,
    #[error("Current password is incorrect")]
    InvalidCurrentPassword,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("This link has expired; request a new one")]
    ExpiredToken,
    #[error("Please wait before requesting another email")]
    CooldownActive { remaining_seconds: i64 },
    #[error("An account with this email already exists")]
    EmailAlreadyRegistered,
    #[error("No account found for this email")]
    NoAccountFound,
    #[error("Finish accepting your invitation before signing in with Google")]
    RequiresInvitationAcceptance,
    #[error("This Google account is already linked")]
    AlreadyLinked,
    #[error("This Google account is linked to a different user")]
    ProviderIdentityTaken,
    #[error("Unknown role")]
    RoleNotFound,
    #[error("{0}")]
    Validation(String),
    #[error("Forbidden")]
    Forbidden,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::InvalidCurrentPassword
            | Self::InvalidToken
            | Self::ExpiredToken
            | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::AccountDeactivated
            | Self::EmailNotVerified
            | Self::RequiresInvitationAcceptance
            | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NoAccountFound => StatusCode::NOT_FOUND,
            Self::AlreadyLinked | Self::ProviderIdentityTaken => StatusCode::CONFLICT,
            Self::NoLocalCredentials
            | Self::AlreadyHasCredentials
            | Self::SameAsCurrentPassword
            | Self::EmailAlreadyRegistered
            | Self::RoleNotFound
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountDeactivated => "account_deactivated",
            Self::EmailNotVerified => "email_not_verified",
            Self::NoLocalCredentials => "no_local_credentials",
            Self::AlreadyHasCredentials => "already_has_credentials",
            Self::SameAsCurrentPassword => "same_as_current_password",
            Self::InvalidCurrentPassword => "invalid_current_password",
            Self::InvalidToken => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::CooldownActive { .. } => "cooldown_active",
            Self::EmailAlreadyRegistered => "email_already_registered",
            Self::NoAccountFound => "no_account_found",
            Self::RequiresInvitationAcceptance => "requires_invitation_acceptance",
            Self::AlreadyLinked => "already_linked",
            Self::ProviderIdentityTaken => "provider_identity_taken",
            Self::RoleNotFound => "role_not_found",
            Self::Validation(_) => "validation",
            Self::Forbidden => "forbidden",
            Self::Unauthorized => "unauthorized",
            Self::Internal(_) => "internal",
        }
    }
}

/// Structured failure payload returned by every auth flow.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_seconds: Option<i64>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Never leak infrastructure detail to the caller.
            Self::Internal(err) => {
                error!("auth flow failed: {err:?}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let cooldown_seconds = match &self {
            Self::CooldownActive { remaining_seconds } => Some(*remaining_seconds),
            _ => None,
        };
        let body = ErrorResponse {
            error: self.kind().to_string(),
            message,
            cooldown_seconds,
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn status_mapping_matches_contract() {
        assert_eq!(
            AuthError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::AccountDeactivated.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::CooldownActive {
                remaining_seconds: 42
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AuthError::AlreadyLinked.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::EmailAlreadyRegistered.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::NoAccountFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AuthError::Internal(anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_error_message_is_generic() {
        let response = AuthError::Internal(anyhow!("connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn cooldown_kind_and_seconds() {
        let err = AuthError::CooldownActive {
            remaining_seconds: 17,
        };
        assert_eq!(err.kind(), "cooldown_active");
    }
}
