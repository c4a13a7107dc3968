use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::models::OrganizationDraft;
use crate::state::AppState;
use crate::utils::auth::CurrentUser;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Organization {} not found", id))
}

pub async fn list_organizations(State(state): State<AppState>) -> Result<Response, AppError> {
    let organizations = state.catalog.list_organizations().await?;
    Ok(success(organizations, "Organizations retrieved"))
}

pub async fn get_organization(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let organization = state
        .catalog
        .get_organization(id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(success(organization, "Organization retrieved"))
}

pub async fn create_organization(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(draft): Json<OrganizationDraft>,
) -> Result<Response, AppError> {
    draft.validate()?;
    let organization = state.catalog.create_organization(draft, user.id).await?;
    tracing::info!(organization_id = %organization.id, created_by = %user.id, "Organization created");
    Ok(created(organization, "Organization created"))
}

pub async fn update_organization(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(draft): Json<OrganizationDraft>,
) -> Result<Response, AppError> {
    draft.validate()?;
    state.require_organization_owner(id, &user).await?;
    let organization = state
        .catalog
        .update_organization(id, draft)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(success(organization, "Organization updated"))
}

pub async fn delete_organization(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.require_organization_owner(id, &user).await?;
    if !state.catalog.delete_organization(id).await? {
        return Err(not_found(id));
    }
    Ok(empty_success("Organization deleted"))
}
