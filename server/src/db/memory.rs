use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CatalogStore, FormFieldStore, RegistrationStore};
use crate::models::{
    Event, EventDraft, FormField, FormFieldDraft, Organization, OrganizationDraft,
    PaymentStatus, Registration,
};
use crate::utils::error::AppError;

#[derive(Default)]
struct Tables {
    organizations: HashMap<Uuid, Organization>,
    events: HashMap<Uuid, Event>,
    fields: HashMap<Uuid, Vec<FormField>>,
    registrations: Vec<Registration>,
}

/// Process-local store. Every method takes the table lock once, so each call
/// is atomic the way a single SQL statement is.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_organizations(&self) -> Result<Vec<Organization>, AppError> {
        let tables = self.tables.read().await;
        let mut all: Vec<_> = tables.organizations.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        Ok(self.tables.read().await.organizations.get(&id).cloned())
    }

    async fn create_organization(
        &self,
        draft: OrganizationDraft,
        created_by: Uuid,
    ) -> Result<Organization, AppError> {
        let now = Utc::now();
        let organization = Organization {
            id: Uuid::new_v4(),
            name: draft.name,
            description: draft.description,
            contact_email: draft.contact_email,
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .organizations
            .insert(organization.id, organization.clone());
        Ok(organization)
    }

    async fn update_organization(
        &self,
        id: Uuid,
        draft: OrganizationDraft,
    ) -> Result<Option<Organization>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.organizations.get_mut(&id).map(|org| {
            org.name = draft.name;
            org.description = draft.description;
            org.contact_email = draft.contact_email;
            org.updated_at = Utc::now();
            org.clone()
        }))
    }

    async fn delete_organization(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables
            .events
            .values()
            .any(|event| event.organization_id == Some(id))
        {
            return Err(AppError::Conflict(
                "Organization still has events; delete them first".to_string(),
            ));
        }
        Ok(tables.organizations.remove(&id).is_some())
    }

    async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        let tables = self.tables.read().await;
        let mut all: Vec<_> = tables.events.values().cloned().collect();
        all.sort_by_key(|event| event.starts_at);
        Ok(all)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn create_event(&self, draft: EventDraft, created_by: Uuid) -> Result<Event, AppError> {
        let mut tables = self.tables.write().await;
        ensure_organization_exists(&tables, draft.organization_id)?;
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            organization_id: draft.organization_id,
            created_by,
            title: draft.title,
            description: draft.description,
            location: draft.location,
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            price: draft.price,
            created_at: now,
            updated_at: now,
        };
        tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update_event(&self, id: Uuid, draft: EventDraft) -> Result<Option<Event>, AppError> {
        let mut tables = self.tables.write().await;
        ensure_organization_exists(&tables, draft.organization_id)?;
        Ok(tables.events.get_mut(&id).map(|event| {
            event.organization_id = draft.organization_id;
            event.title = draft.title;
            event.description = draft.description;
            event.location = draft.location;
            event.starts_at = draft.starts_at;
            event.ends_at = draft.ends_at;
            event.price = draft.price;
            event.updated_at = Utc::now();
            event.clone()
        }))
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let existed = tables.events.remove(&id).is_some();
        if existed {
            tables.fields.remove(&id);
            tables.registrations.retain(|r| r.event_id != id);
        }
        Ok(existed)
    }
}

fn ensure_organization_exists(tables: &Tables, organization_id: Option<Uuid>) -> Result<(), AppError> {
    match organization_id {
        Some(id) if !tables.organizations.contains_key(&id) => Err(AppError::Conflict(format!(
            "Organization {} does not exist",
            id
        ))),
        _ => Ok(()),
    }
}

#[async_trait]
impl FormFieldStore for MemoryStore {
    async fn list_fields(&self, event_id: Uuid) -> Result<Vec<FormField>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.fields.get(&event_id).cloned().unwrap_or_default())
    }

    async fn replace_fields(
        &self,
        event_id: Uuid,
        fields: Vec<FormFieldDraft>,
    ) -> Result<Vec<FormField>, AppError> {
        let saved: Vec<FormField> = fields
            .into_iter()
            .zip(1..)
            .map(|(draft, position)| FormField {
                id: Uuid::new_v4(),
                event_id,
                name: draft.name.trim().to_string(),
                field_type: draft.field_type,
                required: draft.required,
                options: draft.options,
                position,
            })
            .collect();

        let mut tables = self.tables.write().await;
        if !tables.events.contains_key(&event_id) {
            return Err(AppError::NotFound(format!("Event {} not found", event_id)));
        }
        tables.fields.insert(event_id, saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn insert_if_absent(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        form_data: Value,
        status: PaymentStatus,
    ) -> Result<(Registration, bool), AppError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .registrations
            .iter()
            .find(|r| r.event_id == event_id && r.user_id == user_id)
        {
            return Ok((existing.clone(), false));
        }

        let now = Utc::now();
        let registration = Registration {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            ticket_id: Uuid::new_v4(),
            form_data,
            payment_status: status,
            order_id: None,
            payment_id: None,
            checked_in: false,
            checked_in_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.registrations.push(registration.clone());
        Ok((registration, true))
    }

    async fn find_by_user(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .registrations
            .iter()
            .find(|r| r.event_id == event_id && r.user_id == user_id)
            .cloned())
    }

    async fn find_by_ticket(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
    ) -> Result<Option<Registration>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .registrations
            .iter()
            .find(|r| r.event_id == event_id && r.ticket_id == ticket_id)
            .cloned())
    }

    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<Registration>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .registrations
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn attach_order(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        ticket_id: Uuid,
        order_id: &str,
    ) -> Result<Option<Registration>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .registrations
            .iter_mut()
            .find(|r| {
                r.event_id == event_id
                    && r.user_id == user_id
                    && r.ticket_id == ticket_id
                    && r.payment_status == PaymentStatus::Pending
            })
            .map(|r| {
                r.order_id = Some(order_id.to_string());
                r.updated_at = Utc::now();
                r.clone()
            }))
    }

    async fn mark_paid(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        ticket_id: Uuid,
        order_id: &str,
        payment_id: &str,
    ) -> Result<Option<Registration>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .registrations
            .iter_mut()
            .find(|r| {
                r.event_id == event_id
                    && r.user_id == user_id
                    && r.ticket_id == ticket_id
                    && r.payment_status == PaymentStatus::Pending
                    && r.order_id.as_deref() == Some(order_id)
            })
            .map(|r| {
                r.payment_status = PaymentStatus::Paid;
                r.payment_id = Some(payment_id.to_string());
                r.updated_at = Utc::now();
                r.clone()
            }))
    }

    async fn mark_checked_in(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Registration>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .registrations
            .iter_mut()
            .find(|r| r.event_id == event_id && r.ticket_id == ticket_id && !r.checked_in)
            .map(|r| {
                r.checked_in = true;
                r.checked_in_at = Some(at);
                r.updated_at = at;
                r.clone()
            }))
    }
}
