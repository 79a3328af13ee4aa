use crate::errors::{ValidationError, DomainResult, DomainError};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{query_scalar, SqlitePool};
use uuid::Uuid;

/// A trait that entities should implement for validation.
pub trait Validate {
    /// Validates the entity and returns an error if validation fails.
    fn validate(&self) -> DomainResult<()>;
}

// Common regex patterns
static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

// Participant code format: one uppercase letter, two digits, underscore,
// one uppercase letter, four digits (e.g. G01_A0001).
static PARTICIPANT_CODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]\d{2}_[A-Z]\d{4}$").unwrap());

fn email_regex() -> &'static Regex {
    &EMAIL_REGEX
}

fn participant_code_regex() -> &'static Regex {
    &PARTICIPANT_CODE_REGEX
}

/// Struct for configuring validations in a fluent style
#[derive(Default)]
pub struct ValidationBuilder<T> {
    field_name: String,
    value: Option<T>,
    errors: Vec<ValidationError>,
}

/// Generic validation implementations
impl<T> ValidationBuilder<T> {
    pub fn new(field_name: &str, value: Option<T>) -> Self {
        Self {
            field_name: field_name.to_string(),
            value,
            errors: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self
    where T: Default + PartialEq {
        if self.value.is_none() || self.value == Some(T::default()) {
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }

    pub fn validate_with<F>(mut self, validator: F) -> Self
    where F: FnOnce(&T) -> Result<(), ValidationError> {
        if let Some(value) = &self.value {
            if let Err(err) = validator(value) {
                self.errors.push(err);
            }
        }
        self
    }

    /// Complete validation and return result
    pub fn validate(self) -> DomainResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            // Return the first error for simplicity
            Err(DomainError::Validation(self.errors[0].clone()))
        }
    }
}

/// String-specific validations
impl ValidationBuilder<String> {
    pub fn min_length(mut self, min: usize) -> Self {
        if let Some(value) = &self.value {
            if value.len() < min {
                self.errors.push(ValidationError::min_length(&self.field_name, min));
            }
        }
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        if let Some(value) = &self.value {
            if value.len() > max {
                self.errors.push(ValidationError::max_length(&self.field_name, max));
            }
        }
        self
    }

    pub fn matches_pattern(mut self, pattern: &Regex, message: &str) -> Self {
        if let Some(value) = &self.value {
            if !pattern.is_match(value) {
                self.errors.push(ValidationError::format(&self.field_name, message));
            }
        }
        self
    }

    pub fn email(self) -> Self {
        self.matches_pattern(email_regex(), "must be a valid email address")
    }

    pub fn participant_code(self) -> Self {
        self.matches_pattern(
            participant_code_regex(),
            "must match the participant code format (e.g. G01_A0001)",
        )
    }

    pub fn one_of(mut self, allowed_values: &[&str], message: Option<&str>) -> Self {
        if let Some(value) = &self.value {
            if !allowed_values.contains(&value.as_str()) {
                let reason = message.unwrap_or("must be one of the allowed values");
                self.errors.push(ValidationError::invalid_value(&self.field_name, reason));
            }
        }
        self
    }
}

/// Numeric validations
impl<T> ValidationBuilder<T>
where T: PartialOrd + Clone + std::fmt::Display
{
    pub fn min(mut self, min: T) -> Self {
        if let Some(value) = &self.value {
            if value < &min {
                self.errors.push(ValidationError::range(
                    &self.field_name,
                    min.to_string(),
                    "maximum".to_string()
                ));
            }
        }
        self
    }

    pub fn max(mut self, max: T) -> Self {
        if let Some(value) = &self.value {
            if value > &max {
                self.errors.push(ValidationError::range(
                    &self.field_name,
                    "minimum".to_string(),
                    max.to_string()
                ));
            }
        }
        self
    }

    pub fn range(mut self, min: T, max: T) -> Self {
        if let Some(value) = &self.value {
            if value < &min || value > &max {
                self.errors.push(ValidationError::range(
                    &self.field_name,
                    min.to_string(),
                    max.to_string()
                ));
            }
        }
        self
    }
}

/// Uniqueness validation helper (relies on database access)
pub async fn validate_unique(
    pool: &SqlitePool,
    table: &str,
    field: &str,
    value: &str,
    exclude_id: Option<&str>,
    field_name: &str,
) -> DomainResult<()> {
    let query = match exclude_id {
        Some(_) => format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ? AND id != ?",
            table, field
        ),
        None => format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            table, field
        ),
    };

    let count: i64 = match exclude_id {
        Some(id) => {
            query_scalar(&query)
                .bind(value)
                .bind(id)
                .fetch_one(pool)
                .await
                .map_err(|e| DomainError::Database(e.into()))?
        },
        None => {
            query_scalar(&query)
                .bind(value)
                .fetch_one(pool)
                .await
                .map_err(|e| DomainError::Database(e.into()))?
        }
    };

    if count > 0 {
        return Err(DomainError::Validation(ValidationError::unique(field_name)));
    }

    Ok(())
}

/// Validation utility for checking entity exists in the database
pub async fn validate_entity_exists(
    pool: &SqlitePool,
    table: &str,
    id: &Uuid,
    field_name: &str,
) -> DomainResult<()> {
    let query = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table);

    let count: i64 = query_scalar(&query)
        .bind(id.to_string())
        .fetch_one(pool)
        .await
        .map_err(|e| DomainError::Database(e.into()))?;

    if count == 0 {
        return Err(DomainError::Validation(
            ValidationError::relationship(&format!("{} does not exist", field_name))
        ));
    }

    Ok(())
}

/// File extension validation helper
pub fn validate_file_extension(filename: &str, allowed_extensions: &[&str]) -> bool {
    if let Some(extension) = filename.split('.').last() {
        allowed_extensions.iter().any(|&ext| ext.eq_ignore_ascii_case(extension))
    } else {
        false
    }
}

/// Helper for validating file sizes
pub fn validate_file_size(size: usize, max_size: usize) -> bool {
    size <= max_size
}

// Common validation utility module for frequently validated entities
pub mod common {
    use super::*;

    pub fn validate_participant_code(code: &str) -> DomainResult<()> {
        ValidationBuilder::new("unique_code", Some(code.to_string()))
            .required()
            .participant_code()
            .validate()
    }

    pub fn validate_role(role: &str) -> DomainResult<()> {
        ValidationBuilder::new("role", Some(role.to_string()))
            .one_of(&["superadmin", "admin", "data_entry", "consultor"], Some("Invalid role"))
            .validate()
    }

    pub fn validate_date_format(date_str: &str, field_name: &str) -> DomainResult<()> {
        match NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
            Ok(_) => Ok(()),
            Err(_) => Err(DomainError::Validation(ValidationError::format(
                field_name,
                "must be in the format YYYY-MM-DD",
            ))),
        }
    }

    pub async fn validate_questionnaire_exists(
        pool: &SqlitePool,
        questionnaire_id: &Uuid,
        field_name: &str,
    ) -> DomainResult<()> {
        validate_entity_exists(pool, "questionnaires", questionnaire_id, field_name).await
    }

    pub async fn validate_unique_variable_name(
        pool: &SqlitePool,
        name: &str,
        exclude_id: Option<&str>,
    ) -> DomainResult<()> {
        validate_unique(pool, "variables", "name", name, exclude_id, "name").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(email_regex().is_match("user@example.com"));
        assert!(email_regex().is_match("user.name+tag@example.co.uk"));
        assert!(!email_regex().is_match("user@"));
        assert!(!email_regex().is_match("@example.com"));
        assert!(!email_regex().is_match("user@example"));
    }

    #[test]
    fn test_participant_code_validation() {
        assert!(participant_code_regex().is_match("G01_A0001"));
        assert!(participant_code_regex().is_match("A99_Z9999"));

        // Lowercase letters are rejected
        assert!(!participant_code_regex().is_match("g01_A0001"));
        // Wrong digit counts are rejected
        assert!(!participant_code_regex().is_match("G1_A0001"));
        assert!(!participant_code_regex().is_match("G01_A001"));
        assert!(!participant_code_regex().is_match("G01A0001"));
        assert!(!participant_code_regex().is_match(""));

        assert!(common::validate_participant_code("G01_A0001").is_ok());
        assert!(common::validate_participant_code("g01_A0001").is_err());
        assert!(common::validate_participant_code("G1_A0001").is_err());
    }

    #[test]
    fn test_validation_builder() {
        let result = ValidationBuilder::new("name", Some("".to_string()))
            .required()
            .validate();
        assert!(result.is_err());

        let result = ValidationBuilder::new("name", Some("test".to_string()))
            .required()
            .min_length(5)
            .validate();
        assert!(result.is_err());

        let result = ValidationBuilder::new("email", Some("invalid".to_string()))
            .email()
            .validate();
        assert!(result.is_err());

        let result = ValidationBuilder::new("email", Some("valid@example.com".to_string()))
            .email()
            .validate();
        assert!(result.is_ok());

        let result = ValidationBuilder::new("group", Some(-1))
            .min(0)
            .validate();
        assert!(result.is_err());

        let result = ValidationBuilder::new("group", Some(2))
            .range(0, 10)
            .validate();
        assert!(result.is_ok());

        // Required validation for Option
        let value: Option<String> = None;
        let result = ValidationBuilder::new("name", value)
            .required()
            .validate();
        assert!(result.is_err());
    }

    #[test]
    fn test_file_validations() {
        assert!(validate_file_extension("variables.csv", &["csv", "txt"]));
        assert!(validate_file_extension("variables.TXT", &["csv", "txt"]));
        assert!(!validate_file_extension("variables.xlsx", &["csv", "txt"]));
        assert!(!validate_file_extension("variables", &["csv", "txt"]));

        assert!(validate_file_size(1000, 2048));
        assert!(!validate_file_size(3000, 2048));
    }

    #[test]
    fn test_common_validations() {
        assert!(common::validate_role("superadmin").is_ok());
        assert!(common::validate_role("data_entry").is_ok());
        assert!(common::validate_role("manager").is_err());

        assert!(common::validate_date_format("2023-01-01", "birth_date").is_ok());
        assert!(common::validate_date_format("01/01/2023", "birth_date").is_err());
    }
}
