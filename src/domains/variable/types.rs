use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::validation::{Validate, ValidationBuilder};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use sqlx::FromRow;
use std::fmt;

/// The closed set of variable types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Radio,
    Select,
    Date,
    Integer,
    Float,
    Varchar,
    Text,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::Radio => "radio",
            VariableType::Select => "select",
            VariableType::Date => "date",
            VariableType::Integer => "integer",
            VariableType::Float => "float",
            VariableType::Varchar => "varchar",
            VariableType::Text => "text",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "radio" => Some(VariableType::Radio),
            "select" => Some(VariableType::Select),
            "date" => Some(VariableType::Date),
            "integer" => Some(VariableType::Integer),
            "float" => Some(VariableType::Float),
            "varchar" => Some(VariableType::Varchar),
            "text" => Some(VariableType::Text),
            _ => None,
        }
    }

    /// All valid variable types
    pub fn all() -> &'static [VariableType] {
        &[
            VariableType::Radio,
            VariableType::Select,
            VariableType::Date,
            VariableType::Integer,
            VariableType::Float,
            VariableType::Varchar,
            VariableType::Text,
        ]
    }

    /// True when the type carries an encoded option list in `values`
    pub fn has_options(&self) -> bool {
        matches!(self, VariableType::Radio | VariableType::Select)
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const TYPE_NAMES: &[&str] = &["radio", "select", "date", "integer", "float", "varchar", "text"];

/// Variable entity - a single measured field within a questionnaire.
/// `name` is unique across every questionnaire in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub id: Uuid,
    pub questionnaire_id: Uuid,
    pub name: String,
    pub label: String,
    pub variable_type: VariableType,
    pub values: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_user_id: Option<Uuid>,
    pub updated_by_user_id: Option<Uuid>,
}

impl Variable {
    /// Decode the option list for radio/select variables. The encoding is
    /// `value, label | value, label`; a missing label falls back to the value.
    pub fn parsed_options(&self) -> Vec<(String, String)> {
        let Some(values) = &self.values else { return Vec::new() };
        if !self.variable_type.has_options() || values.trim().is_empty() {
            return Vec::new();
        }

        values
            .split('|')
            .filter_map(|pair| {
                let pair = pair.trim();
                if pair.is_empty() {
                    return None;
                }
                match pair.split_once(',') {
                    Some((value, label)) => Some((value.trim().to_string(), label.trim().to_string())),
                    None => Some((pair.to_string(), pair.to_string())),
                }
            })
            .collect()
    }
}

/// NewVariable DTO - used when creating a new variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVariable {
    pub questionnaire_id: Uuid,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub variable_type: String,
    pub values: Option<String>,
    pub created_by_user_id: Option<Uuid>,
}

impl Validate for NewVariable {
    fn validate(&self) -> DomainResult<()> {
        if self.questionnaire_id.is_nil() {
            return Err(DomainError::Validation(ValidationError::required("questionnaire_id")));
        }

        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .max_length(100)
            .validate()?;

        ValidationBuilder::new("label", Some(self.label.clone()))
            .required()
            .max_length(100)
            .validate()?;

        ValidationBuilder::new("type", Some(self.variable_type.clone()))
            .required()
            .max_length(20)
            .one_of(TYPE_NAMES, Some("Invalid variable type"))
            .validate()?;

        Ok(())
    }
}

/// UpdateVariable DTO - used when updating an existing variable
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateVariable {
    pub name: Option<String>,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub variable_type: Option<String>,
    pub values: Option<String>,
    #[serde(default)]
    pub updated_by_user_id: Option<Uuid>,
}

impl Validate for UpdateVariable {
    fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ValidationBuilder::new("name", Some(name.clone()))
                .required()
                .max_length(100)
                .validate()?;
        }

        if let Some(label) = &self.label {
            ValidationBuilder::new("label", Some(label.clone()))
                .required()
                .max_length(100)
                .validate()?;
        }

        if let Some(variable_type) = &self.variable_type {
            ValidationBuilder::new("type", Some(variable_type.clone()))
                .required()
                .max_length(20)
                .one_of(TYPE_NAMES, Some("Invalid variable type"))
                .validate()?;
        }

        Ok(())
    }
}

/// VariableRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct VariableRow {
    pub id: String,
    pub questionnaire_id: String,
    pub name: String,
    pub label: String,
    #[sqlx(rename = "type")]
    pub variable_type: String,
    pub values: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub created_by_user_id: Option<String>,
    pub updated_by_user_id: Option<String>,
}

impl VariableRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<Variable> {
        let parse_uuid = |s: &Option<String>| -> DomainResult<Option<Uuid>> {
            match s {
                Some(id) => Uuid::parse_str(id)
                    .map(Some)
                    .map_err(|_| DomainError::InvalidUuid(id.clone())),
                None => Ok(None),
            }
        };
        let parse_datetime = |s: &str| -> DomainResult<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| DomainError::Internal(format!("Invalid date format: {}", s)))
        };

        Ok(Variable {
            id: Uuid::parse_str(&self.id)
                .map_err(|_| DomainError::InvalidUuid(self.id.clone()))?,
            questionnaire_id: Uuid::parse_str(&self.questionnaire_id)
                .map_err(|_| DomainError::InvalidUuid(self.questionnaire_id.clone()))?,
            name: self.name,
            label: self.label,
            variable_type: VariableType::from_str(&self.variable_type)
                .ok_or_else(|| DomainError::Internal(format!("Invalid variable type: {}", self.variable_type)))?,
            values: self.values,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            created_by_user_id: parse_uuid(&self.created_by_user_id)?,
            updated_by_user_id: parse_uuid(&self.updated_by_user_id)?,
        })
    }
}

/// VariableResponse DTO - used for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableResponse {
    pub id: Uuid,
    pub questionnaire_id: Uuid,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    pub values: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Variable> for VariableResponse {
    fn from(v: Variable) -> Self {
        Self {
            id: v.id,
            questionnaire_id: v.questionnaire_id,
            name: v.name,
            label: v.label,
            variable_type: v.variable_type,
            values: v.values,
            created_at: v.created_at.to_rfc3339(),
            updated_at: v.updated_at.to_rfc3339(),
        }
    }
}
