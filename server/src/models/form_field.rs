use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Number,
    Select,
    Checkbox,
    Textarea,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Number => "number",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Textarea => "textarea",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(FieldType::Text),
            "email" => Ok(FieldType::Email),
            "number" => Ok(FieldType::Number),
            "select" => Ok(FieldType::Select),
            "checkbox" => Ok(FieldType::Checkbox),
            "textarea" => Ok(FieldType::Textarea),
            other => Err(format!("unknown field type '{}'", other)),
        }
    }
}

/// One stored question of an event's registration form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub options: Vec<String>,
    /// 1-based render position, reassigned on every save.
    pub position: i32,
}

/// A field as submitted by the form builder. Position comes from list order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormFieldDraft {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Key used when comparing field names for collisions.
pub fn normalized_field_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_parses_any_case() {
        assert_eq!("Select".parse::<FieldType>().unwrap(), FieldType::Select);
        assert_eq!(" textarea ".parse::<FieldType>().unwrap(), FieldType::Textarea);
        assert!("radio".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_draft_defaults() {
        let draft: FormFieldDraft =
            serde_json::from_str(r#"{"name":"Name","field_type":"text"}"#).unwrap();
        assert!(!draft.required);
        assert!(draft.options.is_empty());
    }
}
