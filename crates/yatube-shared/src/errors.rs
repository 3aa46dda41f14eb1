//! Form error collection rendered next to form fields.

use std::collections::BTreeMap;

use serde::Serialize;
use validator::ValidationErrors;

/// Key for errors that belong to the whole form rather than one field.
pub const NON_FIELD: &str = "__all__";

/// Messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    /// Collect the result of a derived `validate()` call.
    pub fn from_validation(result: Result<(), ValidationErrors>) -> Self {
        match result {
            Ok(()) => Self::default(),
            Err(errors) => errors.into(),
        }
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Fold another set of errors into this one.
    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Error shown above the form.
    pub fn non_field(message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(NON_FIELD, message);
        errors
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = Self::default();
        for (field, field_errors) in errors.field_errors() {
            for err in field_errors.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", err.code));
                out.add(&field.to_string(), message);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_messages_per_field() {
        let mut errors = FormErrors::default();
        assert!(errors.is_empty());
        errors.add("text", "first");
        errors.add("text", "second");
        assert_eq!(errors.get("text"), ["first", "second"]);
        assert!(errors.get("group").is_empty());
        assert!(errors.clone().into_result(()).is_err());
    }

    #[test]
    fn serializes_as_plain_map() {
        let errors = FormErrors::non_field("Please enter a correct username and password.");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json[NON_FIELD][0],
            "Please enter a correct username and password."
        );
    }

    #[test]
    fn merge_appends_to_existing_fields() {
        let mut errors = FormErrors::default();
        errors.add("text", "first");
        let mut other = FormErrors::default();
        other.add("text", "second");
        other.add("image", "broken");
        errors.merge(other);
        assert_eq!(errors.get("text"), ["first", "second"]);
        assert!(errors.has("image"));
    }
}
