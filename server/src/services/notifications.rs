use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmailConfig;
use crate::models::{Event, PaymentStatus};
use crate::utils::error::AppError;

const EMAIL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), AppError>;
}

/// Posts messages to the serverless mail function.
pub struct HttpEmailNotifier {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    sender: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl HttpEmailNotifier {
    pub fn new(url: String, config: &EmailConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(EMAIL_TIMEOUT)
            .build()
            .map_err(|e| AppError::ConfigError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url,
            api_key: config.function_key.clone(),
            sender: config.sender.clone(),
        })
    }
}

#[async_trait]
impl Notifier for HttpEmailNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), AppError> {
        let mut request = self.client.post(&self.url).json(&SendEmailRequest {
            from: &self.sender,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("email function: {}", e)))?;
        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "email function returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), AppError> {
        tracing::info!(to = %message.to, subject = %message.subject, "Email (not sent, no mail function configured)");
        Ok(())
    }
}

pub fn notifier_from_config(config: &EmailConfig) -> Result<Arc<dyn Notifier>, AppError> {
    match &config.function_url {
        Some(url) => Ok(Arc::new(HttpEmailNotifier::new(url.clone(), config)?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

/// Sends in the background. Failures are logged and never reach the caller.
pub fn dispatch(notifier: Arc<dyn Notifier>, message: EmailMessage) {
    tokio::spawn(async move {
        let to = message.to.clone();
        if let Err(e) = notifier.send(message).await {
            tracing::warn!(error = %e, to = %to, "Failed to send notification email");
        }
    });
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn registration_confirmation(
    to: &str,
    attendee: &str,
    event: &Event,
    ticket_id: uuid::Uuid,
    status: PaymentStatus,
) -> EmailMessage {
    let payment_line = match status {
        PaymentStatus::Paid => "Your payment has been received.",
        PaymentStatus::Free => "This event is free to attend.",
        PaymentStatus::Pending => "Your payment is still pending.",
    };
    let html = format!(
        "<p>Hi {name},</p>\
         <p>You're registered for <strong>{title}</strong> at {location} on {date}.</p>\
         <p>{payment_line}</p>\
         <p>Your ticket id is <code>{ticket}</code>. Show its QR code at the entrance.</p>",
        name = escape_html(attendee),
        title = escape_html(&event.title),
        location = escape_html(&event.location),
        date = event.starts_at.format("%d %b %Y, %H:%M UTC"),
        payment_line = payment_line,
        ticket = ticket_id,
    );
    EmailMessage {
        to: to.to_string(),
        subject: format!("Your ticket for {}", event.title),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_confirmation_escapes_user_input() {
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            organization_id: None,
            created_by: Uuid::new_v4(),
            title: "Hack Night".to_string(),
            description: None,
            location: "Lab 3".to_string(),
            starts_at: now,
            ends_at: None,
            price: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        let ticket = Uuid::new_v4();
        let message =
            registration_confirmation("ana@x.io", "<b>Ana</b>", &event, ticket, PaymentStatus::Free);

        assert_eq!(message.subject, "Your ticket for Hack Night");
        assert!(message.html.contains("&lt;b&gt;Ana&lt;/b&gt;"));
        assert!(message.html.contains(&ticket.to_string()));
        assert!(message.html.contains("free to attend"));
    }

    #[test]
    fn test_log_notifier_selected_without_function_url() {
        let config = EmailConfig {
            function_url: None,
            function_key: None,
            sender: "events@localhost".to_string(),
        };
        assert!(notifier_from_config(&config).is_ok());
    }
}
