use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::models::EventDraft;
use crate::state::AppState;
use crate::utils::auth::CurrentUser;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = state.catalog.list_events().await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state.require_event(event_id).await?;
    Ok(success(event, "Event retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(draft): Json<EventDraft>,
) -> Result<Response, AppError> {
    draft.validate()?;
    if let Some(organization_id) = draft.organization_id {
        state.require_organization_owner(organization_id, &user).await?;
    }
    let event = state.catalog.create_event(draft, user.id).await?;
    tracing::info!(event_id = %event.id, created_by = %user.id, "Event created");
    Ok(created(event, "Event created"))
}

pub async fn update_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<Uuid>,
    Json(draft): Json<EventDraft>,
) -> Result<Response, AppError> {
    draft.validate()?;
    let current = state.require_organizer(event_id, &user).await?;
    if let Some(organization_id) = draft.organization_id {
        if current.organization_id != Some(organization_id) {
            state.require_organization_owner(organization_id, &user).await?;
        }
    }
    let event = state
        .catalog
        .update_event(event_id, draft)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))?;
    Ok(success(event, "Event updated"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.require_organizer(event_id, &user).await?;
    if !state.catalog.delete_event(event_id).await? {
        return Err(AppError::NotFound(format!("Event {} not found", event_id)));
    }
    tracing::info!(event_id = %event_id, deleted_by = %user.id, "Event deleted");
    Ok(empty_success("Event deleted"))
}
