use std::sync::Arc;
use uuid::Uuid;

use crate::config::{Config, StorageBackend};
use crate::db::{CatalogStore, FormFieldStore, MemoryStore, PgStore, RegistrationStore};
use crate::models::{Event, Organization};
use crate::services::notifications::{notifier_from_config, LogNotifier};
use crate::services::payments::RazorpayGateway;
use crate::services::{
    CheckInScanner, FormSchemaStore, MockGateway, Notifier, PaymentGateway, PaymentOrchestrator,
    RegistrationLedger, SignatureVerifier,
};
use crate::utils::auth::CurrentUser;
use crate::utils::error::AppError;

/// Signing secret used with the mock gateway when no real keys are configured.
pub const MOCK_GATEWAY_SECRET: &str = "mock_gateway_secret";

/// Everything a handler may touch, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<dyn CatalogStore>,
    pub forms: FormSchemaStore,
    pub ledger: RegistrationLedger,
    pub payments: PaymentOrchestrator,
    pub scanner: CheckInScanner,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Wires services over a single backing store.
    pub fn with_store<S>(
        config: Config,
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: SignatureVerifier,
        notifier: Arc<dyn Notifier>,
    ) -> Self
    where
        S: CatalogStore + FormFieldStore + RegistrationStore + 'static,
    {
        let registrations: Arc<dyn RegistrationStore> = store.clone();
        let fields: Arc<dyn FormFieldStore> = store.clone();
        let currency = config.currency().to_string();

        Self {
            config: Arc::new(config),
            catalog: store,
            forms: FormSchemaStore::new(fields),
            ledger: RegistrationLedger::new(registrations.clone()),
            payments: PaymentOrchestrator::new(gateway, verifier, currency),
            scanner: CheckInScanner::new(registrations),
            notifier,
        }
    }

    /// Production wiring driven by configuration.
    pub async fn from_config(config: Config) -> Result<Self, AppError> {
        let (gateway, verifier): (Arc<dyn PaymentGateway>, SignatureVerifier) = match &config.payment {
            Some(payment) => (
                Arc::new(RazorpayGateway::new(payment)?) as Arc<dyn PaymentGateway>,
                SignatureVerifier::new(payment.key_secret.as_str()),
            ),
            None => {
                tracing::warn!("No payment keys configured, using the mock gateway");
                (
                    Arc::new(MockGateway::new()) as Arc<dyn PaymentGateway>,
                    SignatureVerifier::new(MOCK_GATEWAY_SECRET),
                )
            }
        };
        let notifier = notifier_from_config(&config.email)?;

        let state = match config.storage {
            StorageBackend::Postgres => {
                let store = Arc::new(PgStore::connect(&config).await?);
                Self::with_store(config, store, gateway, verifier, notifier)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Self::with_store(config, Arc::new(MemoryStore::new()), gateway, verifier, notifier)
            }
        };
        Ok(state)
    }

    /// In-memory state with the mock gateway and a logging notifier.
    pub fn in_memory() -> Self {
        Self::with_store(
            Config::for_development(),
            Arc::new(MemoryStore::new()),
            Arc::new(MockGateway::new()),
            SignatureVerifier::new(MOCK_GATEWAY_SECRET),
            Arc::new(LogNotifier),
        )
    }

    pub async fn require_event(&self, event_id: Uuid) -> Result<Event, AppError> {
        self.catalog
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))
    }

    /// The event, provided the caller organizes it.
    pub async fn require_organizer(
        &self,
        event_id: Uuid,
        user: &CurrentUser,
    ) -> Result<Event, AppError> {
        let event = self.require_event(event_id).await?;
        if event.created_by != user.id {
            tracing::warn!(event_id = %event_id, user_id = %user.id, "Organizer access denied");
            return Err(AppError::Forbidden(
                "Only the event's organizer can do this".to_string(),
            ));
        }
        Ok(event)
    }

    /// The organization, provided the caller owns it.
    pub async fn require_organization_owner(
        &self,
        organization_id: Uuid,
        user: &CurrentUser,
    ) -> Result<Organization, AppError> {
        let organization = self
            .catalog
            .get_organization(organization_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Organization {} not found", organization_id))
            })?;
        if organization.created_by != user.id {
            tracing::warn!(organization_id = %organization_id, user_id = %user.id, "Organization access denied");
            return Err(AppError::Forbidden(
                "Only the organization's owner can do this".to_string(),
            ));
        }
        Ok(organization)
    }
}
