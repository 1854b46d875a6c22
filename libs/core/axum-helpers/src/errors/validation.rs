//! Field-level validation failures, shared by every payload validator.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{ValidationErrors, ValidationErrorsKind};

/// One broken rule on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldViolation {
    /// Path to the offending field, e.g. `name` or `[2].price`
    pub field: String,
    /// Machine-readable rule identifier, e.g. `length`, `blank`, `range`
    pub code: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Same violation, reported under `prefix` (used for list items).
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.field = join_path(prefix, &self.field);
        self
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    match (prefix.is_empty(), field.is_empty()) {
        (true, _) => field.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) if field.starts_with('[') => format!("{prefix}{field}"),
        (false, false) => format!("{prefix}.{field}"),
    }
}

fn fallback_message(code: &str) -> String {
    match code {
        "length" => "length is out of range".to_string(),
        "range" => "value is out of range".to_string(),
        "required" => "value is required".to_string(),
        other => format!("failed '{other}' check"),
    }
}

/// Flatten `validator` errors, including nested structs and lists, into a
/// list ordered by field path then rule code.
pub fn field_violations(errors: &ValidationErrors) -> Vec<FieldViolation> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.code.cmp(&b.code)));
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldViolation>) {
    for (field, kind) in errors.errors() {
        let path = join_path(prefix, field.as_ref());
        match kind {
            ValidationErrorsKind::Field(list) => {
                out.extend(list.iter().map(|err| {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| fallback_message(&err.code));
                    FieldViolation::new(path.clone(), err.code.to_string(), message)
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{Validate, ValidationError};

    fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            let mut err = ValidationError::new("blank");
            err.message = Some("must not be blank".into());
            return Err(err);
        }
        Ok(())
    }

    #[derive(Validate)]
    struct Payload {
        #[validate(custom(function = "not_blank"), length(max = 5))]
        title: String,
        #[validate(range(min = 0.0))]
        amount: f64,
    }

    #[test]
    fn test_flattens_and_sorts_field_errors() {
        let payload = Payload {
            title: " ".to_string(),
            amount: -1.0,
        };
        let errors = payload.validate().unwrap_err();

        let violations = field_violations(&errors);

        assert_eq!(
            violations,
            vec![
                FieldViolation::new("amount", "range", "value is out of range"),
                FieldViolation::new("title", "blank", "must not be blank"),
            ]
        );
    }

    #[test]
    fn test_valid_payload_has_no_violations() {
        let payload = Payload {
            title: "ok".to_string(),
            amount: 0.0,
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_prefixed_paths() {
        let v = FieldViolation::new("name", "blank", "x");
        assert_eq!(v.clone().prefixed("[3]").field, "[3].name");
        assert_eq!(v.clone().prefixed("").field, "name");
        assert_eq!(
            FieldViolation::new("[0]", "c", "m").prefixed("items").field,
            "items[0]"
        );
        assert_eq!(FieldViolation::new("", "c", "m").prefixed("body").field, "body");
    }
}
