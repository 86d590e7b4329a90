//! Business logic and external clients.
//!
//! # Services
//!
//! - `auth` - Password login, registration, and reset tokens
//! - `catalogue` - Cached active service catalogue
//! - `email` - Email delivery via SMTP
//! - `jwt` - Bearer tokens for the field-app API
//! - `notifications` - Order event emails and texts
//! - `sms` - Twilio SMS client
//! - `stripe` - Stripe payments client and webhook verification

pub mod auth;
pub mod catalogue;
pub mod email;
pub mod jwt;
pub mod notifications;
pub mod sms;
pub mod stripe;

pub use auth::{AuthError, AuthService, ResetTokens};
pub use catalogue::Catalogue;
pub use email::{EmailError, EmailService, OrderSummary};
pub use jwt::{JwtError, JwtKeys};
pub use notifications::Notifier;
pub use sms::{SmsClient, SmsError};
pub use stripe::{StripeClient, StripeError};
