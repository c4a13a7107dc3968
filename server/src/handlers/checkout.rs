use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::registrations::submit_registration;
use crate::models::{FormAnswers, PaymentConfirmation, PaymentStatus, Registration};
use crate::services::forms::contact_email;
use crate::services::notifications::{dispatch, registration_confirmation};
use crate::services::payments::{CheckoutOrder, CheckoutState, PaymentOutcome};
use crate::services::PreRegistration;
use crate::state::AppState;
use crate::utils::auth::CurrentUser;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub answers: FormAnswers,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub registration: PreRegistration,
    /// Absent when nothing is owed.
    pub order: Option<CheckoutOrder>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub ticket_id: Uuid,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub verified: bool,
    pub state: CheckoutState,
    pub registration: Option<Registration>,
}

/// Registers the caller (if needed) and opens a gateway order for the event price.
pub async fn start_checkout(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<Uuid>,
    Json(body): Json<CheckoutRequest>,
) -> Result<Response, AppError> {
    let event = state.require_event(event_id).await?;
    let user_id = user.id;
    let registration = submit_registration(&state, user, &event, body.answers).await?;

    if registration.payment_status.is_settled() {
        let message = match registration.payment_status {
            PaymentStatus::Paid => "This ticket is already paid for",
            _ => "This event is free; no payment needed",
        };
        return Ok(success(
            CheckoutResponse {
                registration,
                order: None,
            },
            message,
        ));
    }

    let amount = event.price_minor_units()?;
    let order = state
        .payments
        .create_order(amount, registration.ticket_id)
        .await?;
    state
        .ledger
        .attach_order(event_id, user_id, registration.ticket_id, &order.order_id)
        .await?;
    tracing::info!(
        event_id = %event_id,
        ticket_id = %registration.ticket_id,
        order_id = %order.order_id,
        "Checkout order created"
    );

    Ok(success(
        CheckoutResponse {
            registration,
            order: Some(order),
        },
        "Order created; complete payment in the checkout window",
    ))
}

/// Accepts the checkout widget's callback payload.
pub async fn confirm_checkout(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<Uuid>,
    Json(body): Json<ConfirmRequest>,
) -> Result<Response, AppError> {
    let event = state.require_event(event_id).await?;
    let confirmation = PaymentConfirmation {
        order_id: body.order_id,
        payment_id: body.payment_id,
        signature: body.signature,
    };

    let outcome = state
        .payments
        .confirm(&state.ledger, event_id, user.id, body.ticket_id, &confirmation)
        .await?;
    let checkout_state = outcome.state();

    match outcome {
        PaymentOutcome::Verified(registration) => {
            let fields = state.forms.list_fields(event_id).await?;
            let recipient = registration
                .form_data
                .as_object()
                .and_then(|answers| contact_email(&fields, answers));
            if let Some(to) = recipient {
                dispatch(
                    state.notifier.clone(),
                    registration_confirmation(
                        &to,
                        &registration.display_name(),
                        &event,
                        registration.ticket_id,
                        registration.payment_status,
                    ),
                );
            }

            Ok(success(
                ConfirmResponse {
                    verified: true,
                    state: checkout_state,
                    registration: Some(registration),
                },
                "Payment verified; your ticket is confirmed",
            ))
        }
        PaymentOutcome::Rejected => Ok(success(
            ConfirmResponse {
                verified: false,
                state: checkout_state,
                registration: None,
            },
            "Payment could not be verified. Please start checkout again.",
        )),
    }
}
