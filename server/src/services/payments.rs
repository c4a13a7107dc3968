//! Gateway orders and server-side confirmation of client-reported payments.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::models::{PaymentConfirmation, Registration};
use crate::services::ledger::RegistrationLedger;
use crate::utils::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Where a single checkout attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Unpaid,
    OrderCreated,
    AwaitingConfirmation,
    VerifiedPaid,
    VerificationFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStep {
    OrderCreated,
    WidgetReturned,
    SignatureVerified,
    SignatureRejected,
}

impl CheckoutState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::VerifiedPaid | CheckoutState::VerificationFailed)
    }

    pub fn advance(self, step: CheckoutStep) -> Result<CheckoutState, AppError> {
        use CheckoutState::*;
        match (self, step) {
            (Unpaid, CheckoutStep::OrderCreated) => Ok(OrderCreated),
            (OrderCreated, CheckoutStep::WidgetReturned) => Ok(AwaitingConfirmation),
            (AwaitingConfirmation, CheckoutStep::SignatureVerified) => Ok(VerifiedPaid),
            (AwaitingConfirmation, CheckoutStep::SignatureRejected) => Ok(VerificationFailed),
            (state, step) => Err(AppError::Conflict(format!(
                "Checkout cannot go from {:?} via {:?}",
                state, step
            ))),
        }
    }
}

/// Order as returned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount_minor_units: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, AppError>;

    /// Public key the checkout widget is opened with.
    fn key_id(&self) -> &str;
}

/// Razorpay-compatible orders API.
pub struct RazorpayGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

impl RazorpayGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .map_err(|e| AppError::ConfigError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(
        &self,
        amount_minor_units: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, AppError> {
        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderRequest {
                amount: amount_minor_units,
                currency,
                receipt,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Payment gateway unreachable");
                AppError::ExternalServiceError("Could not reach the payment provider".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Payment gateway rejected order");
            return Err(AppError::ExternalServiceError(
                "The payment provider rejected the order".to_string(),
            ));
        }

        response.json::<GatewayOrder>().await.map_err(|e| {
            tracing::warn!(error = %e, "Unreadable order from payment gateway");
            AppError::ExternalServiceError("Unexpected reply from the payment provider".to_string())
        })
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// In-process gateway for development and tests. Order ids run `order_1`, `order_2`, ...
pub struct MockGateway {
    next_order: AtomicU64,
    key_id: String,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            next_order: AtomicU64::new(1),
            key_id: "rzp_test_mock".to_string(),
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(
        &self,
        amount_minor_units: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, AppError> {
        let n = self.next_order.fetch_add(1, Ordering::SeqCst);
        tracing::info!(order = n, amount = amount_minor_units, "Mock order created");
        Ok(GatewayOrder {
            id: format!("order_{}", n),
            amount: amount_minor_units,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
        })
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// Checks gateway signatures with the server-held key secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Arc<str>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac_for(&self, order_id: &str, payment_id: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        Some(mac)
    }

    /// Lowercase hex HMAC-SHA256 of `order_id|payment_id`.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        self.mac_for(order_id, payment_id)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Constant-time comparison. Only the lowercase hex form is accepted.
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let canonical = signature.len() == 64
            && signature
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !canonical {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        self.mac_for(order_id, payment_id)
            .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
    }
}

/// Returned to the client to open the checkout widget.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOrder {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
    pub ticket_id: Uuid,
    pub state: CheckoutState,
}

/// Outcome of a confirmation attempt. Signature mismatch is an expected outcome.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Verified(Registration),
    Rejected,
}

impl PaymentOutcome {
    pub fn state(&self) -> CheckoutState {
        let step = match self {
            PaymentOutcome::Verified(_) => CheckoutStep::SignatureVerified,
            PaymentOutcome::Rejected => CheckoutStep::SignatureRejected,
        };
        CheckoutState::AwaitingConfirmation
            .advance(step)
            .unwrap_or(CheckoutState::VerificationFailed)
    }
}

#[derive(Clone)]
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
    currency: String,
}

impl PaymentOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, verifier: SignatureVerifier, currency: impl Into<String>) -> Self {
        Self {
            gateway,
            verifier,
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Asks the gateway for an order. The amount is checked before any call.
    #[tracing::instrument(skip(self), fields(currency = %self.currency))]
    pub async fn create_order(
        &self,
        amount_minor_units: i64,
        ticket_id: Uuid,
    ) -> Result<CheckoutOrder, AppError> {
        if amount_minor_units <= 0 {
            return Err(AppError::ValidationError(
                "Payment amount must be greater than zero".to_string(),
            ));
        }

        let receipt = ticket_id.simple().to_string();
        let order = self
            .gateway
            .create_order(amount_minor_units, &self.currency, &receipt)
            .await?;

        Ok(CheckoutOrder {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            key_id: self.gateway.key_id().to_string(),
            ticket_id,
            state: CheckoutState::Unpaid.advance(CheckoutStep::OrderCreated)?,
        })
    }

    pub fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        self.verifier.verify(order_id, payment_id, signature)
    }

    /// Verifies the widget's confirmation and, only then, marks the registration paid.
    #[tracing::instrument(
        skip(self, ledger, confirmation),
        fields(event_id = %event_id, order_id = %confirmation.order_id, payment_id = %confirmation.payment_id)
    )]
    pub async fn confirm(
        &self,
        ledger: &RegistrationLedger,
        event_id: Uuid,
        user_id: Uuid,
        ticket_id: Uuid,
        confirmation: &PaymentConfirmation,
    ) -> Result<PaymentOutcome, AppError> {
        if !self.verify_signature(
            &confirmation.order_id,
            &confirmation.payment_id,
            &confirmation.signature,
        ) {
            tracing::warn!("Payment signature mismatch; registration stays pending");
            return Ok(PaymentOutcome::Rejected);
        }

        let registration = ledger
            .finalize_registration(event_id, user_id, ticket_id, confirmation)
            .await?;
        Ok(PaymentOutcome::Verified(registration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_SIGNATURE: &str =
        "9436ee1600ce52afdde09ef2cfa9dfec44e303ae8d302e11b1387e19c3b43b29";

    #[test]
    fn test_signature_matches_known_digest() {
        let verifier = SignatureVerifier::new("s3cr3t");
        assert_eq!(verifier.sign("order_ABC123", "pay_XYZ789"), KNOWN_SIGNATURE);
        assert!(verifier.verify("order_ABC123", "pay_XYZ789", KNOWN_SIGNATURE));
    }

    #[test]
    fn test_any_single_character_mutation_fails() {
        let verifier = SignatureVerifier::new("s3cr3t");
        for (i, original) in KNOWN_SIGNATURE.char_indices() {
            for replacement in ['0', '7', 'a', 'f', 'A', 'g'] {
                if replacement == original {
                    continue;
                }
                let mut mutated = KNOWN_SIGNATURE.to_string();
                mutated.replace_range(i..i + 1, &replacement.to_string());
                assert!(
                    !verifier.verify("order_ABC123", "pay_XYZ789", &mutated),
                    "mutation at {} to {} was accepted",
                    i,
                    replacement
                );
            }
        }
    }

    #[test]
    fn test_signature_is_bound_to_ids_and_secret() {
        let verifier = SignatureVerifier::new("s3cr3t");
        assert!(!verifier.verify("order_ABC124", "pay_XYZ789", KNOWN_SIGNATURE));
        assert!(!verifier.verify("order_ABC123", "pay_XYZ788", KNOWN_SIGNATURE));
        assert!(!SignatureVerifier::new("other").verify("order_ABC123", "pay_XYZ789", KNOWN_SIGNATURE));
        assert!(!verifier.verify("order_ABC123", "pay_XYZ789", ""));
        assert!(!verifier.verify("order_ABC123", "pay_XYZ789", &KNOWN_SIGNATURE.to_uppercase()));
    }

    #[test]
    fn test_checkout_state_machine() {
        let state = CheckoutState::Unpaid
            .advance(CheckoutStep::OrderCreated)
            .and_then(|s| s.advance(CheckoutStep::WidgetReturned))
            .unwrap();
        assert_eq!(state, CheckoutState::AwaitingConfirmation);

        let failed = state.advance(CheckoutStep::SignatureRejected).unwrap();
        assert!(failed.is_terminal());
        assert!(failed.advance(CheckoutStep::SignatureVerified).is_err());
        assert!(CheckoutState::Unpaid.advance(CheckoutStep::SignatureVerified).is_err());
    }

    #[tokio::test]
    async fn test_create_order_rejects_non_positive_amount() {
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(MockGateway::new()),
            SignatureVerifier::new("s3cr3t"),
            "INR",
        );
        for amount in [0, -500] {
            assert!(matches!(
                orchestrator.create_order(amount, Uuid::new_v4()).await,
                Err(AppError::ValidationError(_))
            ));
        }

        let order = orchestrator.create_order(500, Uuid::new_v4()).await.unwrap();
        assert_eq!(order.order_id, "order_1");
        assert_eq!(order.amount, 500);
        assert_eq!(order.currency, "INR");
        assert_eq!(order.state, CheckoutState::OrderCreated);
    }
}
