//! Domain models.
//!
//! Validated types handed between repositories, services, and routes. Database
//! row types stay private to `crate::db`.

pub mod contract;
pub mod lead;
pub mod order;
pub mod service;
pub mod session;
pub mod territory;
pub mod user;

pub use contract::Contract;
pub use lead::{Applicant, EstimateRequest};
pub use order::{Order, OrderLine};
pub use service::Service;
pub use session::{CartItem, CurrentUser};
pub use territory::Territory;
pub use user::User;
