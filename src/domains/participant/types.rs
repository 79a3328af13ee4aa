use crate::errors::{DomainError, DomainResult};
use crate::validation::{common, Validate, ValidationBuilder};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Deserialize};
use sqlx::FromRow;
use sha2::{Digest, Sha256};

/// Fingerprint of a participant code, stored alongside the record.
/// Recomputed whenever the code changes.
pub fn code_fingerprint(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Filter for participant list queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantFilter {
    /// Restrict to excluded (true) or non-excluded (false) participants
    pub excluded: Option<bool>,
    /// Substring match over unique codes and notes
    pub search_text: Option<String>,
}

impl ParticipantFilter {
    /// Create a new empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to excluded participants
    pub fn excluded_only(mut self) -> Self {
        self.excluded = Some(true);
        self
    }

    /// Restrict to participants that are not excluded
    pub fn not_excluded(mut self) -> Self {
        self.excluded = Some(false);
        self
    }

    /// Add search text filter
    pub fn with_search_text(mut self, search_text: String) -> Self {
        self.search_text = Some(search_text);
        self
    }

    /// Check if filter is empty (no filtering criteria)
    pub fn is_empty(&self) -> bool {
        self.excluded.is_none() && self.search_text.is_none()
    }
}

/// Participant entity - a study subject keyed by a formatted unique code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub unique_code: String,
    pub study_group: Option<i64>,
    pub sex: Option<i64>,
    pub adopted: Option<bool>,
    pub birth_date: Option<NaiveDate>,
    pub excluded: Option<bool>,
    pub exclusion_reason: Option<String>,
    pub hash: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_user_id: Option<Uuid>,
    pub updated_by_user_id: Option<Uuid>,
}

impl Participant {
    pub fn is_excluded(&self) -> bool {
        self.excluded.unwrap_or(false)
    }
}

/// NewParticipant DTO - used when creating a new participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParticipant {
    pub unique_code: String,
    #[serde(rename = "group")]
    pub study_group: Option<i64>,
    pub sex: Option<i64>,
    pub adopted: Option<bool>,
    pub birth_date: Option<String>,
    pub excluded: Option<bool>,
    pub exclusion_reason: Option<String>,
    pub notes: Option<String>,
    pub created_by_user_id: Option<Uuid>,
}

impl Validate for NewParticipant {
    fn validate(&self) -> DomainResult<()> {
        common::validate_participant_code(&self.unique_code)?;

        if let Some(birth_date) = &self.birth_date {
            common::validate_date_format(birth_date, "birth_date")?;
        }

        if let Some(reason) = &self.exclusion_reason {
            ValidationBuilder::new("exclusion_reason", Some(reason.clone()))
                .max_length(500)
                .validate()?;
        }

        Ok(())
    }
}

/// UpdateParticipant DTO - used when updating an existing participant
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateParticipant {
    pub unique_code: Option<String>,
    #[serde(rename = "group")]
    pub study_group: Option<i64>,
    pub sex: Option<i64>,
    pub adopted: Option<bool>,
    pub birth_date: Option<String>,
    pub excluded: Option<bool>,
    pub exclusion_reason: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub updated_by_user_id: Option<Uuid>,
}

impl Validate for UpdateParticipant {
    fn validate(&self) -> DomainResult<()> {
        if let Some(code) = &self.unique_code {
            common::validate_participant_code(code)?;
        }

        if let Some(birth_date) = &self.birth_date {
            common::validate_date_format(birth_date, "birth_date")?;
        }

        if let Some(reason) = &self.exclusion_reason {
            ValidationBuilder::new("exclusion_reason", Some(reason.clone()))
                .max_length(500)
                .validate()?;
        }

        Ok(())
    }
}

/// ParticipantRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct ParticipantRow {
    pub id: String,
    pub unique_code: String,
    pub study_group: Option<i64>,
    pub sex: Option<i64>,
    pub adopted: Option<i64>,
    pub birth_date: Option<String>,
    pub excluded: Option<i64>,
    pub exclusion_reason: Option<String>,
    pub hash: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub created_by_user_id: Option<String>,
    pub updated_by_user_id: Option<String>,
}

impl ParticipantRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<Participant> {
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
        let birth_date = match &self.birth_date {
            Some(d) => Some(
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|_| DomainError::Internal(format!("Invalid date format: {}", d)))?,
            ),
            None => None,
        };

        Ok(Participant {
            id: Uuid::parse_str(&self.id)
                .map_err(|_| DomainError::InvalidUuid(self.id.clone()))?,
            unique_code: self.unique_code,
            study_group: self.study_group,
            sex: self.sex,
            adopted: self.adopted.map(|v| v != 0),
            birth_date,
            excluded: self.excluded.map(|v| v != 0),
            exclusion_reason: self.exclusion_reason,
            hash: self.hash,
            notes: self.notes,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            created_by_user_id: parse_uuid(&self.created_by_user_id)?,
            updated_by_user_id: parse_uuid(&self.updated_by_user_id)?,
        })
    }
}

/// ParticipantResponse DTO - used for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub id: Uuid,
    pub unique_code: String,
    #[serde(rename = "group")]
    pub study_group: Option<i64>,
    pub sex: Option<i64>,
    pub adopted: Option<bool>,
    pub birth_date: Option<String>,
    pub excluded: Option<bool>,
    pub exclusion_reason: Option<String>,
    pub hash: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Participant> for ParticipantResponse {
    fn from(p: Participant) -> Self {
        Self {
            id: p.id,
            unique_code: p.unique_code,
            study_group: p.study_group,
            sex: p.sex,
            adopted: p.adopted,
            birth_date: p.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            excluded: p.excluded,
            exclusion_reason: p.exclusion_reason,
            hash: p.hash,
            notes: p.notes,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}
