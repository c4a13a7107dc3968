use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub contact_email: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationDraft {
    pub name: String,
    pub description: Option<String>,
    pub contact_email: String,
}

impl OrganizationDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Organization name is required".to_string(),
            ));
        }
        if self.contact_email.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Organization contact email is required".to_string(),
            ));
        }
        Ok(())
    }
}
