//! Core types for CFAC.
//!
//! This module provides type-safe wrappers for common domain concepts.

#[macro_use]
mod string_enum;

pub mod address;
pub mod email;
pub mod id;
pub mod phone;
pub mod status;
pub mod vehicle;

pub use address::{Address, AddressError, ZipCode, ZipCodeError};
pub use email::{Email, EmailError};
pub use id::*;
pub use phone::{PhoneError, PhoneNumber};
pub use status::*;
pub use vehicle::VehicleSize;
