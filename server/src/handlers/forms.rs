use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::FormFieldDraft;
use crate::services::forms::render_form;
use crate::state::AppState;
use crate::utils::auth::CurrentUser;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct ReplaceFieldsRequest {
    pub fields: Vec<FormFieldDraft>,
}

pub async fn list_fields(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.require_event(event_id).await?;
    let fields = state.forms.list_fields(event_id).await?;
    Ok(success(fields, "Form fields retrieved"))
}

pub async fn replace_fields(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<Uuid>,
    Json(body): Json<ReplaceFieldsRequest>,
) -> Result<Response, AppError> {
    state.require_organizer(event_id, &user).await?;
    let saved = state.forms.replace_fields(event_id, body.fields).await?;
    Ok(success(saved, "Form fields saved"))
}

pub async fn get_form(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.require_event(event_id).await?;
    let fields = state.forms.list_fields(event_id).await?;
    Ok(success(render_form(&fields), "Registration form retrieved"))
}
