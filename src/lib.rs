//! `contactd`: authenticated, owner-scoped contact service.
//!
//! - [`auth`]: credential store, session tokens, revocation list, auth guard
//! - [`contacts`]: contact records and field validation
//! - [`gateway`]: axum HTTP surface
//! - [`config`], [`db`], [`error`]: ambient plumbing

pub mod auth;
pub mod config;
pub mod contacts;
pub mod db;
pub mod error;
pub mod gateway;
