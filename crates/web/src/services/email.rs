//! Email service for order and account notifications.
//!
//! Uses SMTP via lettre (Postmark's SMTP relay) with Askama HTML and text templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::filters;
use crate::models::{Order, User};

/// What every order email shows about the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub order_id: String,
    pub customer_name: String,
    pub services: String,
    pub service_date: String,
    pub address: String,
    pub total: String,
}

impl OrderSummary {
    #[must_use]
    pub fn new(order: &Order, customer: Option<&User>) -> Self {
        Self {
            order_id: order.id.to_string(),
            customer_name: order.customer_name(customer).to_string(),
            services: order.service_names(),
            service_date: order.service_date_display(),
            address: order
                .service_address(customer)
                .map(|a| a.full_address())
                .unwrap_or_else(|| "Not provided".to_string()),
            total: filters::format_currency(order.total()),
        }
    }
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a OrderSummary,
    orders_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a OrderSummary,
    orders_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_scheduled.html")]
struct OrderScheduledHtml<'a> {
    order: &'a OrderSummary,
    tech_name: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_scheduled.txt")]
struct OrderScheduledText<'a> {
    order: &'a OrderSummary,
    tech_name: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    name: &'a str,
    reset_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    name: &'a str,
    reset_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/payment_links.html")]
struct PaymentLinksHtml<'a> {
    order: &'a OrderSummary,
    downpayment_url: Option<&'a str>,
    remaining_url: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/payment_links.txt")]
struct PaymentLinksText<'a> {
    order: &'a OrderSummary,
    downpayment_url: Option<&'a str>,
    remaining_url: Option<&'a str>,
}

/// A short staff or payment notice with an optional order block.
#[derive(Template)]
#[template(path = "email/notice.html")]
struct NoticeHtml<'a> {
    heading: &'a str,
    body: &'a str,
    order: Option<&'a OrderSummary>,
}

#[derive(Template)]
#[template(path = "email/notice.txt")]
struct NoticeText<'a> {
    heading: &'a str,
    body: &'a str,
    order: Option<&'a OrderSummary>,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    base_url: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// Postmark uses the server token as both SMTP username and password.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay settings are invalid.
    pub fn new(config: &EmailConfig, base_url: &str) -> Result<Self, SmtpError> {
        let token = config.server_token.expose_secret().to_string();
        let credentials = Credentials::new(token.clone(), token);

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.sender.clone(),
            base_url: base_url.to_string(),
        })
    }

    /// Send the customer their order confirmation.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        order: &OrderSummary,
    ) -> Result<(), EmailError> {
        let orders_url = format!("{}/customer/my_orders", self.base_url);
        let html = OrderConfirmationHtml {
            order,
            orders_url: &orders_url,
        }
        .render()?;
        let text = OrderConfirmationText {
            order,
            orders_url: &orders_url,
        }
        .render()?;

        self.send_multipart_email(to, "Your Order Confirmation", &text, &html)
            .await
    }

    /// Tell the customer a technician has scheduled their job.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_scheduled(
        &self,
        to: &str,
        order: &OrderSummary,
        tech_name: &str,
    ) -> Result<(), EmailError> {
        let html = OrderScheduledHtml { order, tech_name }.render()?;
        let text = OrderScheduledText { order, tech_name }.render()?;

        self.send_multipart_email(to, "Your Order Has Been Scheduled!", &text, &html)
            .await
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(
        &self,
        to: &str,
        name: &str,
        reset_url: &str,
    ) -> Result<(), EmailError> {
        let html = PasswordResetHtml { name, reset_url }.render()?;
        let text = PasswordResetText { name, reset_url }.render()?;

        self.send_multipart_email(to, "Password Reset Request", &text, &html)
            .await
    }

    /// Send the down-payment and remaining-balance checkout links.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_payment_links(
        &self,
        to: &str,
        order: &OrderSummary,
        downpayment_url: Option<&str>,
        remaining_url: Option<&str>,
    ) -> Result<(), EmailError> {
        let html = PaymentLinksHtml {
            order,
            downpayment_url,
            remaining_url,
        }
        .render()?;
        let text = PaymentLinksText {
            order,
            downpayment_url,
            remaining_url,
        }
        .render()?;

        self.send_multipart_email(to, "Your CFAC Payment Links", &text, &html)
            .await
    }

    /// Send a short notice; `body` is one plain-text paragraph.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_notice(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        order: Option<&OrderSummary>,
    ) -> Result<(), EmailError> {
        let html = NoticeHtml {
            heading: subject,
            body,
            order,
        }
        .render()?;
        let text = NoticeText {
            heading: subject,
            body,
            order,
        }
        .render()?;

        self.send_multipart_email(to, subject, &text, &html).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = build_message(&self.from_address, to, subject, text_body, html_body)?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

fn build_message(
    from: &str,
    to: &str,
    subject: &str,
    text_body: &str,
    html_body: &str,
) -> Result<Message, EmailError> {
    let message = Message::builder()
        .from(
            from.parse()
                .map_err(|_| EmailError::InvalidAddress(from.to_string()))?,
        )
        .to(to
            .parse()
            .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
        .subject(subject)
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text_body.to_string()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html_body.to_string()),
                ),
        )?;
    Ok(message)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::order::tests::order;

    fn summary() -> OrderSummary {
        OrderSummary::new(&order(), None)
    }

    #[test]
    fn test_order_summary() {
        let s = summary();
        assert_eq!(s.order_id, "10");
        assert_eq!(s.customer_name, "Sam Guest");
        assert_eq!(s.total, "$200.00");
        assert_eq!(s.address, "Not provided");
    }

    #[test]
    fn test_invalid_recipient_is_rejected_before_sending() {
        let result = build_message("bookings@cfac.test", "not an address", "Hi", "t", "<p>h</p>");
        assert!(matches!(result, Err(EmailError::InvalidAddress(_))));
    }

    #[test]
    fn test_templates_render() {
        let s = summary();
        let text = OrderConfirmationText {
            order: &s,
            orders_url: "http://localhost:3000/customer/my_orders",
        }
        .render()
        .unwrap();
        assert!(text.contains("Order #10"));
        assert!(text.contains("Sedan Complete Detailing"));

        let html = NoticeHtml {
            heading: "Tech Notif: New Job Available",
            body: "A new <job> is available.",
            order: Some(&s),
        }
        .render()
        .unwrap();
        assert!(html.contains("is available."));
        assert!(!html.contains("<job>"));

        let links = PaymentLinksText {
            order: &s,
            downpayment_url: Some("https://pay.example/dp"),
            remaining_url: None,
        }
        .render()
        .unwrap();
        assert!(links.contains("https://pay.example/dp"));
    }
}
