//! Contact records owned by a single user.
//!
//! The owner is always the authenticated principal; it is never read from
//! request input.

pub mod store;
pub mod validate;

pub use store::{Contact, ContactPatch, ContactStore, NewContact};
