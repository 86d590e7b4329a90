//! JSON API used by the technician and sales field apps.
//!
//! Authenticated endpoints take a `Bearer` token from `POST /api/login`.
//! Every error is returned as `{"error": "..."}`.

pub mod account;
pub mod auth;
pub mod contracts;
pub mod guest_order;
pub mod orders;
pub mod services;
pub mod territories;
