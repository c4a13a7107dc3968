use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::RegistrationStore;
use crate::models::{FormAnswers, PaymentConfirmation, PaymentStatus, Registration};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct PreRegistration {
    pub ticket_id: Uuid,
    pub payment_status: PaymentStatus,
    /// False when an earlier submission already holds the ticket.
    pub created: bool,
}

/// One registration per (event, user), issued tickets, payment state.
#[derive(Clone)]
pub struct RegistrationLedger {
    store: Arc<dyn RegistrationStore>,
}

impl RegistrationLedger {
    pub fn new(store: Arc<dyn RegistrationStore>) -> Self {
        Self { store }
    }

    /// Returns the caller's existing ticket, or records the answers and issues one.
    /// Repeat calls never change stored answers or status.
    #[tracing::instrument(skip(self, form_data), fields(event_id = %event_id, user_id = %user_id))]
    pub async fn pre_register(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        form_data: FormAnswers,
        initial_status: PaymentStatus,
    ) -> Result<PreRegistration, AppError> {
        if initial_status == PaymentStatus::Paid {
            return Err(AppError::InternalServerError(
                "registrations cannot start out paid".to_string(),
            ));
        }

        let (registration, created) = self
            .store
            .insert_if_absent(event_id, user_id, Value::Object(form_data), initial_status)
            .await?;

        if created {
            tracing::info!(ticket_id = %registration.ticket_id, status = %registration.payment_status, "Ticket issued");
        } else {
            tracing::debug!(ticket_id = %registration.ticket_id, "Returning existing ticket");
        }

        Ok(PreRegistration {
            ticket_id: registration.ticket_id,
            payment_status: registration.payment_status,
            created,
        })
    }

    /// Binds a freshly created gateway order to a pending registration. Only
    /// a payment for this order can later settle the ticket.
    pub async fn attach_order(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        ticket_id: Uuid,
        order_id: &str,
    ) -> Result<Registration, AppError> {
        self.store
            .attach_order(event_id, user_id, ticket_id, order_id)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("This registration is no longer awaiting payment".to_string())
            })
    }

    /// Marks a pending registration paid. The write only lands when event,
    /// user, ticket and the attached order all match the stored row.
    #[tracing::instrument(
        skip(self, confirmation),
        fields(event_id = %event_id, ticket_id = %ticket_id, payment_id = %confirmation.payment_id)
    )]
    pub async fn finalize_registration(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        ticket_id: Uuid,
        confirmation: &PaymentConfirmation,
    ) -> Result<Registration, AppError> {
        let updated = self
            .store
            .mark_paid(
                event_id,
                user_id,
                ticket_id,
                &confirmation.order_id,
                &confirmation.payment_id,
            )
            .await?;

        match updated {
            Some(registration) => {
                tracing::info!("Registration marked paid");
                Ok(registration)
            }
            None => Err(AppError::PaymentNotRecorded {
                payment_id: confirmation.payment_id.clone(),
            }),
        }
    }

    pub async fn find(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, AppError> {
        self.store.find_by_user(event_id, user_id).await
    }

    pub async fn list(&self, event_id: Uuid) -> Result<Vec<Registration>, AppError> {
        self.store.list_for_event(event_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CatalogStore, MemoryStore};
    use crate::models::EventDraft;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    async fn ledger_with_event() -> (RegistrationLedger, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let draft = EventDraft {
            organization_id: None,
            title: "Paid Workshop".to_string(),
            description: None,
            location: "Hall B".to_string(),
            starts_at: Utc::now(),
            ends_at: None,
            price: Decimal::new(500, 2),
        };
        let event = store.create_event(draft, Uuid::new_v4()).await.unwrap();
        (RegistrationLedger::new(store), event.id)
    }

    fn answers(value: Value) -> FormAnswers {
        value.as_object().cloned().unwrap()
    }

    fn confirmation(order_id: &str, payment_id: &str) -> PaymentConfirmation {
        PaymentConfirmation {
            order_id: order_id.to_string(),
            payment_id: payment_id.to_string(),
            signature: "unused".to_string(),
        }
    }

    /// A pending registration with `order_1` attached.
    async fn awaiting_payment(ledger: &RegistrationLedger, event_id: Uuid, user: Uuid) -> Uuid {
        let pre = ledger
            .pre_register(event_id, user, FormAnswers::new(), PaymentStatus::Pending)
            .await
            .unwrap();
        ledger
            .attach_order(event_id, user, pre.ticket_id, "order_1")
            .await
            .unwrap();
        pre.ticket_id
    }

    #[tokio::test]
    async fn test_pre_register_is_idempotent() {
        let (ledger, event_id) = ledger_with_event().await;
        let user = Uuid::new_v4();

        let first = ledger
            .pre_register(event_id, user, answers(json!({"name": "Ana"})), PaymentStatus::Pending)
            .await
            .unwrap();
        let second = ledger
            .pre_register(event_id, user, answers(json!({"name": "Ana B."})), PaymentStatus::Pending)
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.ticket_id, second.ticket_id);
        assert_eq!(second.payment_status, PaymentStatus::Pending);

        // The first answers stay on record.
        let stored = ledger.find(event_id, user).await.unwrap().unwrap();
        assert_eq!(stored.form_data, json!({"name": "Ana"}));
    }

    #[tokio::test]
    async fn test_distinct_users_get_distinct_tickets() {
        let (ledger, event_id) = ledger_with_event().await;
        let a = ledger
            .pre_register(event_id, Uuid::new_v4(), FormAnswers::new(), PaymentStatus::Free)
            .await
            .unwrap();
        let b = ledger
            .pre_register(event_id, Uuid::new_v4(), FormAnswers::new(), PaymentStatus::Free)
            .await
            .unwrap();
        assert_ne!(a.ticket_id, b.ticket_id);
        assert_eq!(ledger.list(event_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_converge_on_one_ticket() {
        let (ledger, event_id) = ledger_with_event().await;
        let user = Uuid::new_v4();

        let (a, b) = tokio::join!(
            ledger.pre_register(event_id, user, FormAnswers::new(), PaymentStatus::Pending),
            ledger.pre_register(event_id, user, FormAnswers::new(), PaymentStatus::Pending),
        );
        assert_eq!(a.unwrap().ticket_id, b.unwrap().ticket_id);
        assert_eq!(ledger.list(event_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_marks_paid() {
        let (ledger, event_id) = ledger_with_event().await;
        let user = Uuid::new_v4();
        let ticket_id = awaiting_payment(&ledger, event_id, user).await;

        let paid = ledger
            .finalize_registration(event_id, user, ticket_id, &confirmation("order_1", "pay_1"))
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(paid.order_id.as_deref(), Some("order_1"));
        assert_eq!(paid.ticket_id, ticket_id);
    }

    #[tokio::test]
    async fn test_finalize_rejects_order_of_another_registration() {
        let (ledger, event_id) = ledger_with_event().await;
        let user = Uuid::new_v4();
        let ticket_id = awaiting_payment(&ledger, event_id, user).await;

        let err = ledger
            .finalize_registration(event_id, user, ticket_id, &confirmation("order_7", "pay_cheap"))
            .await
            .unwrap_err();
        assert!(matches!(&err, AppError::PaymentNotRecorded { payment_id } if payment_id == "pay_cheap"));

        let stored = ledger.find(event_id, user).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert!(stored.payment_id.is_none());
    }

    #[tokio::test]
    async fn test_paid_registration_is_not_finalized_twice() {
        let (ledger, event_id) = ledger_with_event().await;
        let user = Uuid::new_v4();
        let ticket_id = awaiting_payment(&ledger, event_id, user).await;
        ledger
            .finalize_registration(event_id, user, ticket_id, &confirmation("order_1", "pay_1"))
            .await
            .unwrap();

        let again = ledger
            .finalize_registration(event_id, user, ticket_id, &confirmation("order_1", "pay_2"))
            .await;
        assert!(matches!(again, Err(AppError::PaymentNotRecorded { .. })));
        assert!(ledger.attach_order(event_id, user, ticket_id, "order_2").await.is_err());

        let stored = ledger.find(event_id, user).await.unwrap().unwrap();
        assert_eq!(stored.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(stored.order_id.as_deref(), Some("order_1"));
    }

    #[tokio::test]
    async fn test_free_registration_cannot_be_finalized() {
        let (ledger, event_id) = ledger_with_event().await;
        let user = Uuid::new_v4();
        let pre = ledger
            .pre_register(event_id, user, FormAnswers::new(), PaymentStatus::Free)
            .await
            .unwrap();

        assert!(matches!(
            ledger.attach_order(event_id, user, pre.ticket_id, "order_1").await,
            Err(AppError::Conflict(_))
        ));
        let result = ledger
            .finalize_registration(event_id, user, pre.ticket_id, &confirmation("order_1", "pay_1"))
            .await;
        assert!(matches!(result, Err(AppError::PaymentNotRecorded { .. })));

        let stored = ledger.find(event_id, user).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Free);
        assert!(stored.order_id.is_none());
    }

    #[tokio::test]
    async fn test_finalize_with_wrong_ticket_names_payment() {
        let (ledger, event_id) = ledger_with_event().await;
        let user = Uuid::new_v4();
        ledger
            .pre_register(event_id, user, FormAnswers::new(), PaymentStatus::Pending)
            .await
            .unwrap();

        let err = ledger
            .finalize_registration(event_id, user, Uuid::new_v4(), &confirmation("order_1", "pay_1"))
            .await
            .unwrap_err();
        assert!(matches!(&err, AppError::PaymentNotRecorded { payment_id } if payment_id == "pay_1"));
        assert!(err.to_string().contains("pay_1"));

        let stored = ledger.find(event_id, user).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_finalize_requires_matching_user() {
        let (ledger, event_id) = ledger_with_event().await;
        let owner = Uuid::new_v4();
        let ticket_id = awaiting_payment(&ledger, event_id, owner).await;

        let result = ledger
            .finalize_registration(event_id, Uuid::new_v4(), ticket_id, &confirmation("order_1", "pay_2"))
            .await;
        assert!(matches!(result, Err(AppError::PaymentNotRecorded { .. })));
    }
}
