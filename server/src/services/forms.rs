//! Registration form schema: builder validation, rendering, and submission checks.
//!
//! Every [`FieldType`] resolves to a [`FieldStrategy`] through [`strategy_for`],
//! which decides both the widget the client draws and the value shape the
//! server accepts. Checkbox fields with options behave as a multi-choice group;
//! without options they are a single yes/no toggle.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::FormFieldStore;
use crate::models::form_field::normalized_field_name;
use crate::models::{FieldType, FormAnswers, FormField, FormFieldDraft};
use crate::utils::error::{AppError, FieldError};

/// What the client should draw for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    Input { input_type: &'static str },
    TextArea,
    Select { options: Vec<String> },
    CheckboxGroup { options: Vec<String> },
    Toggle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormControl {
    pub name: String,
    pub required: bool,
    pub position: i32,
    pub widget: Widget,
}

/// Result of inspecting one submitted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueCheck {
    Filled,
    Empty,
    WrongShape(&'static str),
}

struct FieldStrategy {
    render: fn(&FormField) -> Widget,
    check: fn(&Value) -> ValueCheck,
}

fn strategy_for(field_type: FieldType, has_options: bool) -> FieldStrategy {
    match (field_type, has_options) {
        (FieldType::Text, _) => FieldStrategy {
            render: |_| Widget::Input { input_type: "text" },
            check: check_text,
        },
        (FieldType::Email, _) => FieldStrategy {
            render: |_| Widget::Input { input_type: "email" },
            check: check_text,
        },
        (FieldType::Number, _) => FieldStrategy {
            render: |_| Widget::Input { input_type: "number" },
            check: check_text,
        },
        (FieldType::Textarea, _) => FieldStrategy {
            render: |_| Widget::TextArea,
            check: check_text,
        },
        (FieldType::Select, _) => FieldStrategy {
            render: |f| Widget::Select {
                options: f.options.clone(),
            },
            check: check_choices,
        },
        (FieldType::Checkbox, true) => FieldStrategy {
            render: |f| Widget::CheckboxGroup {
                options: f.options.clone(),
            },
            check: check_choices,
        },
        (FieldType::Checkbox, false) => FieldStrategy {
            render: |_| Widget::Toggle,
            check: check_toggle,
        },
    }
}

fn check_text(value: &Value) -> ValueCheck {
    match value {
        Value::Null => ValueCheck::Empty,
        Value::String(s) if s.trim().is_empty() => ValueCheck::Empty,
        Value::String(_) | Value::Number(_) => ValueCheck::Filled,
        _ => ValueCheck::WrongShape("must be text"),
    }
}

fn check_choices(value: &Value) -> ValueCheck {
    match value {
        Value::Null => ValueCheck::Empty,
        Value::String(s) if s.trim().is_empty() => ValueCheck::Empty,
        Value::String(_) => ValueCheck::Filled,
        Value::Array(items) if items.iter().all(Value::is_string) => {
            if items.iter().any(|v| v.as_str().is_some_and(|s| !s.trim().is_empty())) {
                ValueCheck::Filled
            } else {
                ValueCheck::Empty
            }
        }
        _ => ValueCheck::WrongShape("must be one or more of the listed options"),
    }
}

fn check_toggle(value: &Value) -> ValueCheck {
    match value {
        Value::Null | Value::Bool(false) => ValueCheck::Empty,
        Value::Bool(true) => ValueCheck::Filled,
        _ => ValueCheck::WrongShape("must be checked or unchecked"),
    }
}

/// Control descriptions in render order.
pub fn render_form(fields: &[FormField]) -> Vec<FormControl> {
    let mut ordered: Vec<&FormField> = fields.iter().collect();
    ordered.sort_by_key(|f| f.position);
    ordered
        .into_iter()
        .map(|field| {
            let strategy = strategy_for(field.field_type, !field.options.is_empty());
            FormControl {
                name: field.name.clone(),
                required: field.required,
                position: field.position,
                widget: (strategy.render)(field),
            }
        })
        .collect()
}

/// Checks required fields and value shapes. Answers are not modified; keys
/// without a matching field are left alone.
pub fn validate_submission(fields: &[FormField], answers: &FormAnswers) -> Result<(), AppError> {
    let mut errors = Vec::new();

    for field in fields {
        let strategy = strategy_for(field.field_type, !field.options.is_empty());
        let value = answers.get(&field.name).unwrap_or(&Value::Null);
        match (strategy.check)(value) {
            ValueCheck::Filled => {}
            ValueCheck::Empty if field.required => {
                errors.push(FieldError::new(&field.name, format!("{} is required", field.name)));
            }
            ValueCheck::Empty => {}
            ValueCheck::WrongShape(reason) => {
                errors.push(FieldError::new(&field.name, format!("{} {}", field.name, reason)));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidForm(errors))
    }
}

/// Rejects a builder save before anything is written.
pub fn validate_drafts(drafts: &[FormFieldDraft]) -> Result<(), AppError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, draft) in drafts.iter().enumerate() {
        let label = if draft.name.trim().is_empty() {
            format!("field {}", index + 1)
        } else {
            draft.name.trim().to_string()
        };

        if draft.name.trim().is_empty() {
            errors.push(FieldError::new(&label, "Field name is required"));
        } else if !seen.insert(normalized_field_name(&draft.name)) {
            errors.push(FieldError::new(&label, "Field name is used more than once"));
        }

        if draft.field_type == FieldType::Select
            && draft.options.iter().all(|o| o.trim().is_empty())
        {
            errors.push(FieldError::new(&label, "Select fields need at least one option"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidForm(errors))
    }
}

/// The first e-mail answer, used as the confirmation recipient.
pub fn contact_email(fields: &[FormField], answers: &FormAnswers) -> Option<String> {
    fields
        .iter()
        .filter(|f| f.field_type == FieldType::Email)
        .filter_map(|f| answers.get(&f.name).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Per-event form schema persistence.
#[derive(Clone)]
pub struct FormSchemaStore {
    store: Arc<dyn FormFieldStore>,
}

impl FormSchemaStore {
    pub fn new(store: Arc<dyn FormFieldStore>) -> Self {
        Self { store }
    }

    pub async fn list_fields(&self, event_id: Uuid) -> Result<Vec<FormField>, AppError> {
        self.store.list_fields(event_id).await
    }

    #[tracing::instrument(skip(self, fields), fields(event_id = %event_id, count = fields.len()))]
    pub async fn replace_fields(
        &self,
        event_id: Uuid,
        fields: Vec<FormFieldDraft>,
    ) -> Result<Vec<FormField>, AppError> {
        validate_drafts(&fields)?;
        let saved = self.store.replace_fields(event_id, fields).await?;
        tracing::info!(fields = saved.len(), "Registration form saved");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str, field_type: FieldType, required: bool, options: &[&str], position: i32) -> FormField {
        FormField {
            id: Uuid::new_v4(),
            event_id: Uuid::nil(),
            name: name.to_string(),
            field_type,
            required,
            options: options.iter().map(|o| o.to_string()).collect(),
            position,
        }
    }

    fn answers(value: Value) -> FormAnswers {
        value.as_object().cloned().unwrap()
    }

    fn failing_fields(result: Result<(), AppError>) -> Vec<String> {
        match result {
            Err(AppError::InvalidForm(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected InvalidForm, got {:?}", other),
        }
    }

    #[test]
    fn test_render_follows_position_and_type() {
        let fields = vec![
            field("Diet", FieldType::Select, false, &["Veg", "Non-veg"], 3),
            field("Name", FieldType::Text, true, &[], 1),
            field("Email", FieldType::Email, true, &[], 2),
            field("Topics", FieldType::Checkbox, false, &["AI", "Web"], 4),
            field("Agree to rules", FieldType::Checkbox, true, &[], 5),
            field("Bio", FieldType::Textarea, false, &[], 6),
        ];

        let controls = render_form(&fields);
        let names: Vec<_> = controls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Email", "Diet", "Topics", "Agree to rules", "Bio"]);
        assert_eq!(controls[1].widget, Widget::Input { input_type: "email" });
        assert_eq!(
            controls[2].widget,
            Widget::Select {
                options: vec!["Veg".to_string(), "Non-veg".to_string()]
            }
        );
        assert!(matches!(controls[3].widget, Widget::CheckboxGroup { .. }));
        assert_eq!(controls[4].widget, Widget::Toggle);
        assert_eq!(controls[5].widget, Widget::TextArea);
    }

    #[test]
    fn test_missing_required_fields_are_all_reported() {
        let fields = vec![
            field("Name", FieldType::Text, true, &[], 1),
            field("Topics", FieldType::Checkbox, true, &["AI", "Web"], 2),
            field("Agree", FieldType::Checkbox, true, &[], 3),
            field("Bio", FieldType::Textarea, false, &[], 4),
        ];
        let submitted = answers(json!({"Name": "  ", "Topics": [], "Agree": false}));

        assert_eq!(
            failing_fields(validate_submission(&fields, &submitted)),
            vec!["Name", "Topics", "Agree"]
        );
    }

    #[test]
    fn test_valid_submission_passes_without_business_checks() {
        let fields = vec![
            field("Email", FieldType::Email, true, &[], 1),
            field("Age", FieldType::Number, true, &[], 2),
            field("Track", FieldType::Select, true, &["A"], 3),
        ];
        // No format, range or option membership enforcement.
        let submitted = answers(json!({"Email": "not-an-email", "Age": -4, "Track": "Z", "extra": 1}));
        assert!(validate_submission(&fields, &submitted).is_ok());
    }

    #[test]
    fn test_wrong_value_shape_is_rejected() {
        let fields = vec![
            field("Name", FieldType::Text, false, &[], 1),
            field("Agree", FieldType::Checkbox, false, &[], 2),
        ];
        let submitted = answers(json!({"Name": ["a"], "Agree": "yes"}));
        assert_eq!(
            failing_fields(validate_submission(&fields, &submitted)),
            vec!["Name", "Agree"]
        );
    }

    #[test]
    fn test_drafts_reject_duplicate_and_blank_names() {
        let drafts = vec![
            FormFieldDraft {
                name: "Name".to_string(),
                field_type: FieldType::Text,
                required: true,
                options: vec![],
            },
            FormFieldDraft {
                name: " name ".to_string(),
                field_type: FieldType::Text,
                required: false,
                options: vec![],
            },
            FormFieldDraft {
                name: "".to_string(),
                field_type: FieldType::Select,
                required: false,
                options: vec![],
            },
        ];
        let errors = match validate_drafts(&drafts) {
            Err(AppError::InvalidForm(errors)) => errors,
            other => panic!("expected InvalidForm, got {:?}", other),
        };
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].field, "name");
        assert_eq!(errors[1].field, "field 3");
    }

    #[test]
    fn test_contact_email_uses_first_email_answer() {
        let fields = vec![
            field("Name", FieldType::Text, true, &[], 1),
            field("College Email", FieldType::Email, false, &[], 2),
            field("Personal Email", FieldType::Email, false, &[], 3),
        ];
        let submitted = answers(json!({"Name": "Ana", "College Email": "", "Personal Email": "ana@x.io"}));
        assert_eq!(contact_email(&fields, &submitted).as_deref(), Some("ana@x.io"));
    }
}
