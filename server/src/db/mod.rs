//! Storage seams. Postgres is the production backend; the in-memory store
//! backs tests and local demos.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    Event, EventDraft, FormField, FormFieldDraft, Organization, OrganizationDraft,
    PaymentStatus, Registration,
};
use crate::utils::error::AppError;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Admin records the registration workflow hangs off.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_organizations(&self) -> Result<Vec<Organization>, AppError>;
    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, AppError>;
    async fn create_organization(
        &self,
        draft: OrganizationDraft,
        created_by: Uuid,
    ) -> Result<Organization, AppError>;
    async fn update_organization(
        &self,
        id: Uuid,
        draft: OrganizationDraft,
    ) -> Result<Option<Organization>, AppError>;
    async fn delete_organization(&self, id: Uuid) -> Result<bool, AppError>;

    async fn list_events(&self) -> Result<Vec<Event>, AppError>;
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, AppError>;
    async fn create_event(&self, draft: EventDraft, created_by: Uuid) -> Result<Event, AppError>;
    async fn update_event(&self, id: Uuid, draft: EventDraft) -> Result<Option<Event>, AppError>;
    /// Removes the event together with its form fields and registrations.
    async fn delete_event(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait FormFieldStore: Send + Sync {
    /// Fields ordered by position.
    async fn list_fields(&self, event_id: Uuid) -> Result<Vec<FormField>, AppError>;

    /// Atomically swaps the event's whole field set, numbering positions 1..N.
    async fn replace_fields(
        &self,
        event_id: Uuid,
        fields: Vec<FormFieldDraft>,
    ) -> Result<Vec<FormField>, AppError>;
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Inserts unless a row for (event, user) exists. Returns the surviving row
    /// and whether this call created it.
    async fn insert_if_absent(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        form_data: Value,
        status: PaymentStatus,
    ) -> Result<(Registration, bool), AppError>;

    async fn find_by_user(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, AppError>;

    async fn find_by_ticket(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
    ) -> Result<Option<Registration>, AppError>;

    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<Registration>, AppError>;

    /// Records the gateway order a pending registration is paying through.
    /// `None` unless the row matches and is still pending.
    async fn attach_order(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        ticket_id: Uuid,
        order_id: &str,
    ) -> Result<Option<Registration>, AppError>;

    /// Moves a pending registration to paid. Lands only where event, user,
    /// ticket and the attached order all match; `None` otherwise.
    async fn mark_paid(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        ticket_id: Uuid,
        order_id: &str,
        payment_id: &str,
    ) -> Result<Option<Registration>, AppError>;

    /// Flips `checked_in` only if it is still false. `None` when nothing changed.
    async fn mark_checked_in(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Registration>, AppError>;
}
