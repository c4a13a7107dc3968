use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Submitted form answers, keyed by field name.
pub type FormAnswers = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Free,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Free => "free",
            PaymentStatus::Paid => "paid",
        }
    }

    /// Whether the ticket is settled and needs no further payment.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Free | PaymentStatus::Paid)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    // Legacy rows were written as "PAID".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "free" => Ok(PaymentStatus::Free),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub ticket_id: Uuid,
    pub form_data: Value,
    pub payment_status: PaymentStatus,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Name to greet the attendee with at the door.
    pub fn display_name(&self) -> String {
        self.form_data
            .as_object()
            .map(display_name_from)
            .unwrap_or_else(|| "Attendee".to_string())
    }
}

/// Picks `name`, then `full_name`, then any answer whose key mentions "name".
pub fn display_name_from(answers: &FormAnswers) -> String {
    let text_of = |key: &str| {
        answers
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    text_of("name")
        .or_else(|| text_of("full_name"))
        .or_else(|| {
            answers
                .keys()
                .filter(|k| k.to_lowercase().contains("name"))
                .find_map(|k| text_of(k))
        })
        .unwrap_or_else(|| "Attendee".to_string())
}

/// Gateway references proving a payment was captured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registration_with(form_data: Value) -> Registration {
        let now = Utc::now();
        Registration {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            form_data,
            payment_status: PaymentStatus::Free,
            order_id: None,
            payment_id: None,
            checked_in: false,
            checked_in_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_display_name_prefers_name_key() {
        let reg = registration_with(json!({"Team Name": "Rustaceans", "name": "Ana"}));
        assert_eq!(reg.display_name(), "Ana");
    }

    #[test]
    fn test_display_name_falls_back_to_any_name_key() {
        let reg = registration_with(json!({"Your Name": "Ravi", "email": "r@x.io"}));
        assert_eq!(reg.display_name(), "Ravi");

        let anonymous = registration_with(json!({"email": "r@x.io"}));
        assert_eq!(anonymous.display_name(), "Attendee");
    }

    #[test]
    fn test_payment_status_accepts_legacy_casing() {
        assert_eq!("PAID".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::Free.to_string(), "free");
        assert!(PaymentStatus::Paid.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
    }
}
