pub mod event;
pub mod form_field;
pub mod organization;
pub mod registration;

pub use event::{Event, EventDraft};
pub use form_field::{FieldType, FormField, FormFieldDraft};
pub use organization::{Organization, OrganizationDraft};
pub use registration::{FormAnswers, PaymentConfirmation, PaymentStatus, Registration};
