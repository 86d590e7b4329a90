//! Inbound leads: estimate requests from the public site and job applications
//! from the careers page.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cfac_core::{ApplicantId, EstimateRequestId};

/// A prospective customer asking for a quote.
#[derive(Debug, Clone, Serialize)]
pub struct EstimateRequest {
    pub id: EstimateRequestId,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub vehicle_size: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Someone who applied to work as a technician or salesperson, waiting for
/// an admin to review them.
#[derive(Debug, Clone, Serialize)]
pub struct Applicant {
    pub id: ApplicantId,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub desired_role: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
