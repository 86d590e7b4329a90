//! Customer and staff notifications for order events.
//!
//! Every send is best effort: failures are logged and the order change that
//! triggered them stands.

use sqlx::PgPool;
use tracing::{info, warn};

use cfac_core::{PaymentMethod, Role};

use super::email::{EmailError, EmailService, OrderSummary};
use super::sms::SmsClient;
use crate::db::UserRepository;
use crate::models::{Order, User};

/// Sends the emails and texts that follow order events.
pub struct Notifier<'a> {
    pool: &'a PgPool,
    email: &'a EmailService,
    sms: Option<&'a SmsClient>,
}

impl<'a> Notifier<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService, sms: Option<&'a SmsClient>) -> Self {
        Self { pool, email, sms }
    }

    /// A customer checked out: confirm to them and tell every technician.
    pub async fn order_placed(&self, order: &Order, customer: Option<&User>) {
        let summary = OrderSummary::new(order, customer);
        match order.customer_email(customer) {
            Some(to) => {
                if let Err(e) = self.email.send_order_confirmation(&to, &summary).await {
                    warn!(order_id = %order.id, error = %e, "Failed to send order confirmation");
                }
            }
            None => warn!(order_id = %order.id, "No customer email for order confirmation"),
        }
        self.new_job_available(&summary).await;
    }

    /// The field app created a guest order: tell admins and technicians.
    pub async fn guest_order_created(&self, order: &Order) {
        let summary = OrderSummary::new(order, None);
        let body = format!(
            "A new guest order #{} was created for {}.",
            order.id, summary.customer_name
        );
        for admin in self.staff(Role::Admin).await {
            self.email_user(&admin, "Admin Notif: New Guest Order", &body, Some(&summary))
                .await;
        }
        self.new_job_available(&summary).await;
    }

    /// Tell the customer their order was scheduled.
    ///
    /// # Errors
    ///
    /// Returns the email failure so the technician can be warned; the order
    /// stays scheduled either way.
    pub async fn order_scheduled(
        &self,
        order: &Order,
        customer: Option<&User>,
        tech: &User,
    ) -> Result<(), EmailError> {
        let to = order
            .customer_email(customer)
            .ok_or_else(|| EmailError::InvalidAddress(String::new()))?;
        let summary = OrderSummary::new(order, customer);
        self.email
            .send_order_scheduled(&to, &summary, tech.display_name())
            .await
    }

    /// A payment was taken in the field or confirmed by Stripe.
    ///
    /// Emails and texts the customer, the collecting employee, and every
    /// admin. Card payments also tell the order's technician, or every
    /// technician while nobody has taken the job.
    pub async fn payment_collected(
        &self,
        order: &Order,
        customer: Option<&User>,
        collector: Option<&User>,
        method: PaymentMethod,
    ) {
        let summary = OrderSummary::new(order, customer);
        let method_label = method.label();

        let customer_text = format!(
            "Dear {}, your payment for Order {} has been successfully received via {method_label}.",
            summary.customer_name, order.id
        );
        if let Some(to) = order.customer_email(customer) {
            self.email_address(&to, "Payment Confirmation - CFAC", &customer_text, Some(&summary))
                .await;
        }
        if let Some(customer) = customer {
            self.text_user(customer, &customer_text).await;
        }

        let collector_name = collector.map_or("Unknown", User::display_name);
        if let Some(collector) = collector {
            let text = format!(
                "Dear {collector_name}, you have successfully collected a payment for Order {} via {method_label}.",
                order.id
            );
            self.email_user(collector, "Payment Collected - CFAC", &text, Some(&summary))
                .await;
            self.text_user(collector, &text).await;
        }

        let admin_text = format!(
            "A payment for Order {} has been collected via {method_label} by Salesperson {collector_name}.",
            order.id
        );
        for admin in self.staff(Role::Admin).await {
            self.email_user(&admin, "Payment Collected - CFAC", &admin_text, Some(&summary))
                .await;
            self.text_user(&admin, &admin_text).await;
        }

        if method == PaymentMethod::Card {
            let body = format!("Order #{} has been paid and is now available to schedule.", order.id);
            for tech in assigned_or_all(order, self.staff(Role::Tech).await) {
                self.email_user(&tech, "Order now available", &body, Some(&summary))
                    .await;
            }
        }

        info!(order_id = %order.id, method = %method, "Payment notifications sent");
    }

    async fn new_job_available(&self, summary: &OrderSummary) {
        let body = format!(
            "A new job (Order #{}) is available for scheduling.",
            summary.order_id
        );
        for tech in self.staff(Role::Tech).await {
            self.email_user(&tech, "Tech Notif: New Job Available", &body, Some(summary))
                .await;
        }
    }

    async fn staff(&self, role: Role) -> Vec<User> {
        UserRepository::new(self.pool)
            .list_by_role(role)
            .await
            .unwrap_or_else(|e| {
                warn!(role = %role, error = %e, "Failed to load notification recipients");
                Vec::new()
            })
    }

    async fn email_user(&self, user: &User, subject: &str, body: &str, summary: Option<&OrderSummary>) {
        match user.email.as_ref() {
            Some(email) => {
                self.email_address(email.as_str(), subject, body, summary)
                    .await;
            }
            None => warn!(user_id = %user.id, subject, "User has no email address"),
        }
    }

    async fn email_address(&self, to: &str, subject: &str, body: &str, summary: Option<&OrderSummary>) {
        if let Err(e) = self.email.send_notice(to, subject, body, summary).await {
            warn!(to = %to, subject, error = %e, "Failed to send notification email");
        }
    }

    async fn text_user(&self, user: &User, body: &str) {
        let (Some(sms), Some(to)) = (self.sms, user.sms_number()) else {
            return;
        };
        if let Err(e) = sms.send(&to, body).await {
            warn!(user_id = %user.id, error = %e, "Failed to send SMS");
        }
    }
}

/// The order's technician when one has taken it, otherwise every technician.
fn assigned_or_all(order: &Order, techs: Vec<User>) -> Vec<User> {
    match order.scheduled_by {
        Some(id) => techs.into_iter().filter(|t| t.id == id).collect(),
        None => techs,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cfac_core::UserId;

    use super::*;
    use crate::models::order::tests::order;
    use crate::models::user::tests::user;

    fn techs() -> Vec<User> {
        [4, 7]
            .into_iter()
            .map(|id| {
                let mut tech = user(Role::Tech);
                tech.id = UserId::new(id);
                tech
            })
            .collect()
    }

    #[test]
    fn test_card_payment_goes_to_assigned_tech() {
        let mut o = order();
        o.scheduled_by = Some(UserId::new(7));
        let to = assigned_or_all(&o, techs());
        assert_eq!(to.len(), 1);
        assert_eq!(to[0].id, UserId::new(7));
    }

    #[test]
    fn test_unassigned_order_goes_to_every_tech() {
        let mut o = order();
        o.scheduled_by = None;
        assert_eq!(assigned_or_all(&o, techs()).len(), 2);
    }
}
