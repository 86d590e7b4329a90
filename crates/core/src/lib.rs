//! CFAC Core - Shared domain types.
//!
//! This crate provides the types used across all CFAC components:
//! - `web` - The booking site, staff back office, and JSON API
//! - `cli` - Command-line tools for migrations, staff accounts, and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Pricing and geometry live here so they can be unit
//! tested without a running server.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, contact details, statuses, vehicle sizes
//! - [`pricing`] - Order price breakdown and Stripe amount conversion
//! - [`geo`] - Territory polygon normalisation, bounding box, centroid

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod geo;
pub mod pricing;
pub mod types;

pub use types::*;
