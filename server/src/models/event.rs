use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

/// Largest price a NUMERIC(12, 2) column holds.
fn max_price() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    /// The organizer who may edit the event and see its attendees.
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Ticket price in major currency units. Zero means the event is free.
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_free(&self) -> bool {
        self.price.is_zero()
    }

    /// Price in the gateway's minor units (paise for INR).
    pub fn price_minor_units(&self) -> Result<i64, AppError> {
        self.price
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|minor| minor.round().to_i64())
            .ok_or_else(|| {
                AppError::ValidationError(format!("Price {} is out of range", self.price))
            })
    }
}

/// Create/update payload for an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub organization_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub price: Decimal,
}

impl EventDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::ValidationError("Event title is required".to_string()));
        }
        if self.location.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Event location is required".to_string(),
            ));
        }
        if self.price.is_sign_negative() {
            return Err(AppError::ValidationError(
                "Event price cannot be negative".to_string(),
            ));
        }
        if self.price.normalize().scale() > 2 {
            return Err(AppError::ValidationError(
                "Event price can have at most two decimal places".to_string(),
            ));
        }
        if self.price > max_price() {
            return Err(AppError::ValidationError(format!(
                "Event price cannot exceed {}",
                max_price()
            )));
        }
        if let Some(ends_at) = self.ends_at {
            if ends_at < self.starts_at {
                return Err(AppError::ValidationError(
                    "Event cannot end before it starts".to_string(),
                ));
            }
        }
        Ok(())
    }
}
