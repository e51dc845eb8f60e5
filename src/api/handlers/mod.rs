//! API handlers for Talentgate.
//!
//! This module organizes the service's route handlers: the auth subsystem,
//! the health check, and the undocumented root banner.

pub mod auth;
pub mod health;
pub mod root;
