use crate::errors::{DomainError, DomainResult};
use crate::validation::{Validate, ValidationBuilder};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use sqlx::FromRow;

/// Compute the storage table name for a questionnaire. Derived exactly once,
/// when the questionnaire is created; updates never recompute it.
pub fn derive_table_name(short_name: &str) -> String {
    format!("{}_data", short_name)
}

/// Questionnaire entity - a research instrument owning a set of variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Questionnaire {
    pub id: Uuid,
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub table_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_user_id: Option<Uuid>,
    pub updated_by_user_id: Option<Uuid>,
}

/// NewQuestionnaire DTO - used when creating a questionnaire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestionnaire {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub created_by_user_id: Option<Uuid>,
}

impl Validate for NewQuestionnaire {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .max_length(100)
            .validate()?;

        ValidationBuilder::new("short_name", Some(self.short_name.clone()))
            .required()
            .max_length(50)
            .validate()?;

        ValidationBuilder::new("description", Some(self.description.clone()))
            .required()
            .max_length(250)
            .validate()?;

        Ok(())
    }
}

/// UpdateQuestionnaire DTO. `table_name` is deliberately absent: it is fixed
/// at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateQuestionnaire {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub updated_by_user_id: Uuid,
}

impl Validate for UpdateQuestionnaire {
    fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ValidationBuilder::new("name", Some(name.clone()))
                .required()
                .max_length(100)
                .validate()?;
        }

        if let Some(short_name) = &self.short_name {
            ValidationBuilder::new("short_name", Some(short_name.clone()))
                .required()
                .max_length(50)
                .validate()?;
        }

        if let Some(description) = &self.description {
            ValidationBuilder::new("description", Some(description.clone()))
                .required()
                .max_length(250)
                .validate()?;
        }

        Ok(())
    }
}

/// QuestionnaireRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct QuestionnaireRow {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub table_name: String,
    pub created_at: String,
    pub updated_at: String,
    pub created_by_user_id: Option<String>,
    pub updated_by_user_id: Option<String>,
}

impl QuestionnaireRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<Questionnaire> {
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

        Ok(Questionnaire {
            id: Uuid::parse_str(&self.id)
                .map_err(|_| DomainError::InvalidUuid(self.id.clone()))?,
            name: self.name,
            short_name: self.short_name,
            description: self.description,
            table_name: self.table_name,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            created_by_user_id: parse_uuid(&self.created_by_user_id)?,
            updated_by_user_id: parse_uuid(&self.updated_by_user_id)?,
        })
    }
}

/// Row shape for list queries, which also carry the owned-variable count
#[derive(Debug, Clone, FromRow)]
pub struct QuestionnaireListRow {
    #[sqlx(flatten)]
    pub base: QuestionnaireRow,
    pub variable_count: i64,
}

/// QuestionnaireResponse DTO - used for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionnaireResponse {
    pub id: Uuid,
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_count: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Questionnaire> for QuestionnaireResponse {
    fn from(q: Questionnaire) -> Self {
        Self {
            id: q.id,
            name: q.name,
            short_name: q.short_name,
            description: q.description,
            table_name: q.table_name,
            variable_count: None,
            created_at: q.created_at.to_rfc3339(),
            updated_at: q.updated_at.to_rfc3339(),
        }
    }
}

impl QuestionnaireResponse {
    pub fn with_count(questionnaire: Questionnaire, variable_count: i64) -> Self {
        let mut response: Self = questionnaire.into();
        response.variable_count = Some(variable_count);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_derivation() {
        assert_eq!(derive_table_name("bdi"), "bdi_data");
        assert_eq!(derive_table_name("scl90"), "scl90_data");
    }

    #[test]
    fn test_new_questionnaire_validation() {
        let valid = NewQuestionnaire {
            name: "Beck Depression Inventory".to_string(),
            short_name: "bdi".to_string(),
            description: "Self-report depression inventory".to_string(),
            created_by_user_id: None,
        };
        assert!(valid.validate().is_ok());

        let missing_name = NewQuestionnaire { name: "".to_string(), ..valid.clone() };
        assert!(missing_name.validate().is_err());

        let long_short_name = NewQuestionnaire {
            short_name: "x".repeat(51),
            ..valid.clone()
        };
        assert!(long_short_name.validate().is_err());

        let long_description = NewQuestionnaire {
            description: "x".repeat(251),
            ..valid
        };
        assert!(long_description.validate().is_err());
    }
}
