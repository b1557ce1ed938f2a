//! Common library for the vibes backend
//!
//! This crate provides functionality shared by the accounts and vibes
//! services: database connectivity and migrations, store error types, the
//! uniform response envelope, field-error normalization, session tokens and
//! the token authentication middleware.

pub mod database;
pub mod envelope;
pub mod error;
pub mod middleware;
pub mod session;
pub mod validation;
