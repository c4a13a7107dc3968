pub mod checkin;
pub mod forms;
pub mod ledger;
pub mod notifications;
pub mod payments;

pub use checkin::{CheckInOutcome, CheckInScanner};
pub use forms::FormSchemaStore;
pub use ledger::{PreRegistration, RegistrationLedger};
pub use notifications::Notifier;
pub use payments::{MockGateway, PaymentGateway, PaymentOrchestrator, SignatureVerifier};
