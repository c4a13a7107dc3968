use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::auth::CurrentUser;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    /// Raw text decoded from the ticket's QR code.
    pub ticket: String,
}

pub async fn check_in(
    State(state): State<AppState>,
    staff: CurrentUser,
    Path(event_id): Path<Uuid>,
    Json(body): Json<CheckInRequest>,
) -> Result<Response, AppError> {
    state.require_organizer(event_id, &staff).await?;
    let outcome = state.scanner.check_in(event_id, &body.ticket).await?;
    tracing::debug!(scanned_by = %staff.id, "Scan processed");
    let message = outcome.message();
    Ok(success(outcome, message))
}
