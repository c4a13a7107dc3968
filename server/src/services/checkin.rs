use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::RegistrationStore;
use crate::models::PaymentStatus;
use crate::utils::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckInOutcome {
    CheckedIn {
        display_name: String,
        checked_in_at: DateTime<Utc>,
        payment_status: PaymentStatus,
    },
    AlreadyCheckedIn {
        display_name: String,
        checked_in_at: Option<DateTime<Utc>>,
    },
    InvalidTicket,
}

impl CheckInOutcome {
    pub fn message(&self) -> String {
        match self {
            CheckInOutcome::CheckedIn { display_name, .. } => {
                format!("Welcome, {}! Check-in successful", display_name)
            }
            CheckInOutcome::AlreadyCheckedIn { display_name, .. } => {
                format!("{} is already checked in", display_name)
            }
            CheckInOutcome::InvalidTicket => "Invalid ticket for this event".to_string(),
        }
    }
}

/// Venue-side ticket validation.
#[derive(Clone)]
pub struct CheckInScanner {
    store: Arc<dyn RegistrationStore>,
}

impl CheckInScanner {
    pub fn new(store: Arc<dyn RegistrationStore>) -> Self {
        Self { store }
    }

    /// Admits the holder of `scanned` to `event_id` at most once.
    #[tracing::instrument(skip(self, scanned), fields(event_id = %event_id))]
    pub async fn check_in(&self, event_id: Uuid, scanned: &str) -> Result<CheckInOutcome, AppError> {
        let Ok(ticket_id) = Uuid::parse_str(scanned.trim()) else {
            tracing::info!("Scanned code is not a ticket id");
            return Ok(CheckInOutcome::InvalidTicket);
        };

        if let Some(registration) = self
            .store
            .mark_checked_in(event_id, ticket_id, Utc::now())
            .await?
        {
            tracing::info!(ticket_id = %ticket_id, "Attendee checked in");
            return Ok(CheckInOutcome::CheckedIn {
                display_name: registration.display_name(),
                checked_in_at: registration.checked_in_at.unwrap_or(registration.updated_at),
                payment_status: registration.payment_status,
            });
        }

        let outcome = match self.store.find_by_ticket(event_id, ticket_id).await? {
            Some(registration) => CheckInOutcome::AlreadyCheckedIn {
                display_name: registration.display_name(),
                checked_in_at: registration.checked_in_at,
            },
            None => CheckInOutcome::InvalidTicket,
        };
        tracing::info!(ticket_id = %ticket_id, outcome = ?outcome, "Check-in refused");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CatalogStore, MemoryStore};
    use crate::models::EventDraft;
    use rust_decimal::Decimal;
    use serde_json::json;

    async fn create_event(store: &MemoryStore, title: &str) -> Uuid {
        let draft = EventDraft {
            organization_id: None,
            title: title.to_string(),
            description: None,
            location: "Auditorium".to_string(),
            starts_at: Utc::now(),
            ends_at: None,
            price: Decimal::ZERO,
        };
        store.create_event(draft, Uuid::new_v4()).await.unwrap().id
    }

    async fn setup() -> (CheckInScanner, Arc<MemoryStore>, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let event_id = create_event(&store, "Hack Night").await;
        let (registration, _) = store
            .insert_if_absent(event_id, Uuid::new_v4(), json!({"name": "Ana"}), PaymentStatus::Free)
            .await
            .unwrap();
        (
            CheckInScanner::new(store.clone()),
            store,
            event_id,
            registration.ticket_id,
        )
    }

    #[tokio::test]
    async fn test_check_in_is_one_way() {
        let (scanner, _store, event_id, ticket) = setup().await;

        let first = scanner.check_in(event_id, &ticket.to_string()).await.unwrap();
        let first_at = match &first {
            CheckInOutcome::CheckedIn { checked_in_at, .. } => *checked_in_at,
            other => panic!("expected CheckedIn, got {:?}", other),
        };
        assert!(first.message().contains("Ana"));

        let second = scanner.check_in(event_id, &ticket.to_string()).await.unwrap();
        assert_eq!(
            second,
            CheckInOutcome::AlreadyCheckedIn {
                display_name: "Ana".to_string(),
                checked_in_at: Some(first_at),
            }
        );
        assert!(second.message().contains("already checked in"));
    }

    #[tokio::test]
    async fn test_ticket_is_scoped_to_its_event() {
        let (scanner, store, _event_id, ticket) = setup().await;
        let other_event = create_event(&store, "Design Jam").await;

        let outcome = scanner.check_in(other_event, &ticket.to_string()).await.unwrap();
        assert_eq!(outcome, CheckInOutcome::InvalidTicket);
        assert_eq!(outcome.message(), "Invalid ticket for this event");
    }

    #[tokio::test]
    async fn test_garbage_scan_is_invalid() {
        let (scanner, _store, event_id, _ticket) = setup().await;
        for scanned in ["", "hello", "https://example.com/t/1"] {
            assert_eq!(
                scanner.check_in(event_id, scanned).await.unwrap(),
                CheckInOutcome::InvalidTicket
            );
        }
    }

    #[tokio::test]
    async fn test_concurrent_scans_admit_once() {
        let (scanner, _store, event_id, ticket) = setup().await;
        let code = format!("  {}\n", ticket);

        let (a, b) = tokio::join!(scanner.check_in(event_id, &code), scanner.check_in(event_id, &code));
        let admitted = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|o| matches!(o, CheckInOutcome::CheckedIn { .. }))
            .count();
        assert_eq!(admitted, 1);
    }
}
