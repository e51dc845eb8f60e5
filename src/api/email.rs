//! Best-effort email dispatch.
//!
//! Token-sending flows commit their state first and then hand the message to
//! a spawned task; delivery failure is logged and never fails the flow, so a
//! user who did not receive the email retries via the resend endpoints.
//!
//! The default sender for local dev is `LogMailer`, which logs and returns
//! `Ok(())`. A real deployment implements `Mailer` against SMTP or an email
//! API.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Email delivery abstraction used by the auth flows.
pub trait Mailer: Send + Sync {
    /// Deliver a message or return an error; errors are logged by dispatch.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

/// Fire-and-forget delivery on a background task.
///
/// Callers must have committed any related state already; nothing is rolled
/// back when delivery fails.
pub fn dispatch(mailer: &Arc<dyn Mailer>, message: EmailMessage) {
    let mailer = Arc::clone(mailer);
    tokio::spawn(async move {
        if let Err(err) = mailer.send(&message) {
            error!(to = %message.to, "failed to send email: {err}");
        }
    });
}
