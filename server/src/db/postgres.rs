use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use super::{CatalogStore, FormFieldStore, RegistrationStore};
use crate::config::Config;
use crate::models::{
    Event, EventDraft, FieldType, FormField, FormFieldDraft, Organization, OrganizationDraft,
    PaymentStatus, Registration,
};
use crate::utils::error::AppError;

const ORGANIZATION_COLUMNS: &str =
    "id, name, description, contact_email, created_by, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, organization_id, created_by, title, description, location, \
     starts_at, ends_at, price, created_at, updated_at";

const FIELD_COLUMNS: &str = "id, event_id, name, field_type, required, options, position";

const REGISTRATION_COLUMNS: &str = "id, event_id, user_id, ticket_id, form_data, \
     payment_status, order_id, payment_id, checked_in, checked_in_at, created_at, updated_at";

#[derive(FromRow)]
struct FormFieldRow {
    id: Uuid,
    event_id: Uuid,
    name: String,
    field_type: String,
    required: bool,
    options: Vec<String>,
    position: i32,
}

impl TryFrom<FormFieldRow> for FormField {
    type Error = AppError;

    fn try_from(row: FormFieldRow) -> Result<Self, Self::Error> {
        let field_type = row
            .field_type
            .parse::<FieldType>()
            .map_err(AppError::InternalServerError)?;
        Ok(FormField {
            id: row.id,
            event_id: row.event_id,
            name: row.name,
            field_type,
            required: row.required,
            options: row.options,
            position: row.position,
        })
    }
}

#[derive(FromRow)]
struct RegistrationRow {
    id: Uuid,
    event_id: Uuid,
    user_id: Uuid,
    ticket_id: Uuid,
    form_data: Value,
    payment_status: String,
    order_id: Option<String>,
    payment_id: Option<String>,
    checked_in: bool,
    checked_in_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = AppError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        let payment_status = row
            .payment_status
            .parse::<PaymentStatus>()
            .map_err(AppError::InternalServerError)?;
        Ok(Registration {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            ticket_id: row.ticket_id,
            form_data: row.form_data,
            payment_status,
            order_id: row.order_id,
            payment_id: row.payment_id,
            checked_in: row.checked_in,
            checked_in_at: row.checked_in_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_registration(row: Option<RegistrationRow>) -> Result<Option<Registration>, AppError> {
    row.map(Registration::try_from).transpose()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and brings the schema up to date.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;
        tracing::info!("Successfully connected to database");

        sqlx::migrate!().run(&pool).await?;
        tracing::info!("Migrations run successfully");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_organizations(&self) -> Result<Vec<Organization>, AppError> {
        let sql = format!(
            "SELECT {} FROM organizations ORDER BY name",
            ORGANIZATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Organization>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        let sql = format!(
            "SELECT {} FROM organizations WHERE id = $1",
            ORGANIZATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Organization>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_organization(
        &self,
        draft: OrganizationDraft,
        created_by: Uuid,
    ) -> Result<Organization, AppError> {
        let sql = format!(
            "INSERT INTO organizations (name, description, contact_email, created_by) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ORGANIZATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Organization>(&sql)
            .bind(draft.name)
            .bind(draft.description)
            .bind(draft.contact_email)
            .bind(created_by)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_organization(
        &self,
        id: Uuid,
        draft: OrganizationDraft,
    ) -> Result<Option<Organization>, AppError> {
        let sql = format!(
            "UPDATE organizations SET name = $2, description = $3, contact_email = $4, \
             updated_at = now() WHERE id = $1 RETURNING {}",
            ORGANIZATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Organization>(&sql)
            .bind(id)
            .bind(draft.name)
            .bind(draft.description)
            .bind(draft.contact_email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_organization(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        let sql = format!("SELECT {} FROM events ORDER BY starts_at", EVENT_COLUMNS);
        Ok(sqlx::query_as::<_, Event>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let sql = format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS);
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_event(&self, draft: EventDraft, created_by: Uuid) -> Result<Event, AppError> {
        let sql = format!(
            "INSERT INTO events \
             (organization_id, title, description, location, starts_at, ends_at, price, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            EVENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(draft.organization_id)
            .bind(draft.title)
            .bind(draft.description)
            .bind(draft.location)
            .bind(draft.starts_at)
            .bind(draft.ends_at)
            .bind(draft.price)
            .bind(created_by)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_event(&self, id: Uuid, draft: EventDraft) -> Result<Option<Event>, AppError> {
        let sql = format!(
            "UPDATE events SET organization_id = $2, title = $3, description = $4, \
             location = $5, starts_at = $6, ends_at = $7, price = $8, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            EVENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .bind(draft.organization_id)
            .bind(draft.title)
            .bind(draft.description)
            .bind(draft.location)
            .bind(draft.starts_at)
            .bind(draft.ends_at)
            .bind(draft.price)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, AppError> {
        // form_fields and registrations cascade
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl FormFieldStore for PgStore {
    async fn list_fields(&self, event_id: Uuid) -> Result<Vec<FormField>, AppError> {
        let sql = format!(
            "SELECT {} FROM form_fields WHERE event_id = $1 ORDER BY position",
            FIELD_COLUMNS
        );
        sqlx::query_as::<_, FormFieldRow>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(FormField::try_from)
            .collect()
    }

    async fn replace_fields(
        &self,
        event_id: Uuid,
        fields: Vec<FormFieldDraft>,
    ) -> Result<Vec<FormField>, AppError> {
        let insert_sql = format!(
            "INSERT INTO form_fields (event_id, name, field_type, required, options, position) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            FIELD_COLUMNS
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM form_fields WHERE event_id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        let mut saved = Vec::with_capacity(fields.len());
        for (index, draft) in fields.into_iter().enumerate() {
            let position = i32::try_from(index + 1).map_err(|_| {
                AppError::ValidationError("Too many form fields".to_string())
            })?;
            let row = sqlx::query_as::<_, FormFieldRow>(&insert_sql)
                .bind(event_id)
                .bind(draft.name.trim())
                .bind(draft.field_type.as_str())
                .bind(draft.required)
                .bind(draft.options)
                .bind(position)
                .fetch_one(&mut *tx)
                .await?;
            saved.push(FormField::try_from(row)?);
        }

        // Dropping `tx` on any early return above rolls the delete back.
        tx.commit().await?;
        Ok(saved)
    }
}

#[async_trait]
impl RegistrationStore for PgStore {
    async fn insert_if_absent(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        form_data: Value,
        status: PaymentStatus,
    ) -> Result<(Registration, bool), AppError> {
        let sql = format!(
            "INSERT INTO registrations (event_id, user_id, form_data, payment_status) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (event_id, user_id) DO NOTHING RETURNING {}",
            REGISTRATION_COLUMNS
        );
        let inserted = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(event_id)
            .bind(user_id)
            .bind(form_data)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = inserted {
            return Ok((Registration::try_from(row)?, true));
        }

        let existing = self.find_by_user(event_id, user_id).await?.ok_or_else(|| {
            AppError::InternalServerError(format!(
                "registration for event {} user {} conflicted but is missing",
                event_id, user_id
            ))
        })?;
        Ok((existing, false))
    }

    async fn find_by_user(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, AppError> {
        let sql = format!(
            "SELECT {} FROM registrations WHERE event_id = $1 AND user_id = $2",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        into_registration(row)
    }

    async fn find_by_ticket(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
    ) -> Result<Option<Registration>, AppError> {
        let sql = format!(
            "SELECT {} FROM registrations WHERE event_id = $1 AND ticket_id = $2",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(event_id)
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await?;
        into_registration(row)
    }

    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<Registration>, AppError> {
        let sql = format!(
            "SELECT {} FROM registrations WHERE event_id = $1 ORDER BY created_at",
            REGISTRATION_COLUMNS
        );
        sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Registration::try_from)
            .collect()
    }

    async fn attach_order(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        ticket_id: Uuid,
        order_id: &str,
    ) -> Result<Option<Registration>, AppError> {
        let sql = format!(
            "UPDATE registrations SET order_id = $4, updated_at = now() \
             WHERE event_id = $1 AND user_id = $2 AND ticket_id = $3 \
             AND payment_status = $5 RETURNING {}",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(event_id)
            .bind(user_id)
            .bind(ticket_id)
            .bind(order_id)
            .bind(PaymentStatus::Pending.as_str())
            .fetch_optional(&self.pool)
            .await?;
        into_registration(row)
    }

    async fn mark_paid(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        ticket_id: Uuid,
        order_id: &str,
        payment_id: &str,
    ) -> Result<Option<Registration>, AppError> {
        let sql = format!(
            "UPDATE registrations SET payment_status = $4, payment_id = $5, updated_at = now() \
             WHERE event_id = $1 AND user_id = $2 AND ticket_id = $3 \
             AND order_id = $6 AND payment_status = $7 RETURNING {}",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(event_id)
            .bind(user_id)
            .bind(ticket_id)
            .bind(PaymentStatus::Paid.as_str())
            .bind(payment_id)
            .bind(order_id)
            .bind(PaymentStatus::Pending.as_str())
            .fetch_optional(&self.pool)
            .await?;
        into_registration(row)
    }

    async fn mark_checked_in(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Registration>, AppError> {
        let sql = format!(
            "UPDATE registrations SET checked_in = TRUE, checked_in_at = $3, updated_at = now() \
             WHERE event_id = $1 AND ticket_id = $2 AND checked_in = FALSE RETURNING {}",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(event_id)
            .bind(ticket_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        into_registration(row)
    }
}
