use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::registration::display_name_from;
use crate::models::{Event, FormAnswers, PaymentStatus};
use crate::services::forms::{contact_email, validate_submission};
use crate::services::notifications::{dispatch, registration_confirmation};
use crate::services::PreRegistration;
use crate::state::AppState;
use crate::utils::auth::CurrentUser;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub answers: FormAnswers,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    #[serde(flatten)]
    pub registration: PreRegistration,
    pub requires_payment: bool,
}

/// Validates the answers against the event's current form and records the
/// registration, emailing a confirmation when a free ticket is first issued.
pub(crate) async fn submit_registration(
    state: &AppState,
    user: CurrentUser,
    event: &Event,
    answers: FormAnswers,
) -> Result<PreRegistration, AppError> {
    let fields = state.forms.list_fields(event.id).await?;
    validate_submission(&fields, &answers)?;

    let initial_status = if event.is_free() {
        PaymentStatus::Free
    } else {
        PaymentStatus::Pending
    };
    let recipient = contact_email(&fields, &answers);
    let display_name = display_name_from(&answers);

    let registration = state
        .ledger
        .pre_register(event.id, user.id, answers, initial_status)
        .await?;

    if registration.created && registration.payment_status == PaymentStatus::Free {
        if let Some(to) = recipient {
            dispatch(
                state.notifier.clone(),
                registration_confirmation(
                    &to,
                    &display_name,
                    event,
                    registration.ticket_id,
                    registration.payment_status,
                ),
            );
        }
    }

    Ok(registration)
}

pub async fn register(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<Uuid>,
    Json(body): Json<RegistrationRequest>,
) -> Result<Response, AppError> {
    let event = state.require_event(event_id).await?;
    let registration = submit_registration(&state, user, &event, body.answers).await?;

    let requires_payment = registration.payment_status == PaymentStatus::Pending;
    let message = match (registration.created, requires_payment) {
        (true, false) => "Registration confirmed",
        (true, true) => "Registration saved; complete payment to confirm",
        (false, false) => "You are already registered",
        (false, true) => "You are already registered; payment is still pending",
    };
    let body = RegistrationResponse {
        requires_payment,
        registration,
    };

    if body.registration.created {
        Ok(created(body, message))
    } else {
        Ok(success(body, message))
    }
}

/// Attendee list with tickets and answers; organizer only.
pub async fn list_registrations(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.require_organizer(event_id, &user).await?;
    let registrations = state.ledger.list(event_id).await?;
    Ok(success(registrations, "Registrations retrieved"))
}

pub async fn my_registration(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let registration = state
        .ledger
        .find(event_id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("You are not registered for this event".to_string()))?;
    Ok(success(registration, "Registration retrieved"))
}
