use crate::errors::{DomainError, ServiceError, ServiceResult};
use crate::domains::variable::import::{
    check_upload, parse_preview, CsvImportSummary, CsvRecord, CsvSeparator, CsvUpload,
};
use crate::domains::variable::repository::VariableRepository;
use crate::domains::variable::types::{NewVariable, UpdateVariable, Variable, VariableResponse};
use crate::domains::core::repository::{Deletable, FindById};
use crate::auth::AuthContext;
use crate::types::{PaginatedResult, PaginationParams, Permission};
use crate::validation::{common, Validate};
use uuid::Uuid;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Service for variable management, including the CSV import pipeline
pub struct VariableService {
    pool: SqlitePool,
    repo: Arc<dyn VariableRepository>,
}

impl VariableService {
    /// Create a new variable service
    pub fn new(pool: SqlitePool, repo: Arc<dyn VariableRepository>) -> Self {
        Self { pool, repo }
    }

    /// Create a new variable
    pub async fn create_variable(
        &self,
        new: NewVariable,
        auth: &AuthContext,
    ) -> ServiceResult<VariableResponse> {
        auth.authorize(Permission::ManageStudies)?;

        new.validate().map_err(ServiceError::Domain)?;
        common::validate_questionnaire_exists(&self.pool, &new.questionnaire_id, "questionnaire_id")
            .await
            .map_err(ServiceError::Domain)?;
        common::validate_unique_variable_name(&self.pool, &new.name, None)
            .await
            .map_err(ServiceError::Domain)?;

        let created = self.repo.create(new, auth)
            .await
            .map_err(ServiceError::Domain)?;

        log::info!("Created variable {} ({})", created.name, created.id);
        Ok(created.into())
    }

    /// Get a variable by ID
    pub async fn get_variable(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Variable> {
        auth.authorize(Permission::ViewStudies)?;

        self.repo.find_by_id(id)
            .await
            .map_err(ServiceError::Domain)
    }

    /// List the variables of a questionnaire, paginated
    pub async fn list_variables(
        &self,
        questionnaire_id: Uuid,
        params: PaginationParams,
        auth: &AuthContext,
    ) -> ServiceResult<PaginatedResult<VariableResponse>> {
        auth.authorize(Permission::ViewStudies)?;

        let page = self.repo.find_by_questionnaire(questionnaire_id, params)
            .await
            .map_err(ServiceError::Domain)?;

        Ok(PaginatedResult {
            items: page.items.into_iter().map(Into::into).collect(),
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            total_pages: page.total_pages,
        })
    }

    /// Update an existing variable
    pub async fn update_variable(
        &self,
        id: Uuid,
        update: UpdateVariable,
        auth: &AuthContext,
    ) -> ServiceResult<VariableResponse> {
        auth.authorize(Permission::ManageStudies)?;

        update.validate().map_err(ServiceError::Domain)?;

        let updated = self.repo.update(id, update, auth)
            .await
            .map_err(ServiceError::Domain)?;

        Ok(updated.into())
    }

    /// Delete a variable
    pub async fn delete_variable(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<()> {
        auth.authorize(Permission::ManageStudies)?;

        self.repo.delete(id, auth)
            .await
            .map_err(ServiceError::Domain)
    }

    /// Stages 0-2 of the CSV import: validate the upload, parse it, and
    /// return the in-memory preview. Nothing is written; the caller keeps the
    /// preview in its session until it confirms (or discards) the import.
    pub async fn process_csv(
        &self,
        questionnaire_id: Uuid,
        upload: CsvUpload,
        separator: CsvSeparator,
        auth: &AuthContext,
    ) -> ServiceResult<Vec<CsvRecord>> {
        auth.authorize_all(&[Permission::ManageStudies, Permission::ImportData])?;

        common::validate_questionnaire_exists(&self.pool, &questionnaire_id, "questionnaire_id")
            .await
            .map_err(ServiceError::Domain)?;

        let content = check_upload(&upload)
            .map_err(|e| ServiceError::Domain(DomainError::from(e)))?;

        let preview = parse_preview(&content, separator)
            .map_err(|e| ServiceError::Domain(DomainError::from(e)))?;

        log::info!(
            "Processed CSV {} for questionnaire {}: {} rows ready to import",
            upload.filename,
            questionnaire_id,
            preview.len()
        );
        Ok(preview)
    }

    /// Stage 3 of the CSV import: commit a previously validated preview.
    ///
    /// Unlike the parse stage, this is lenient per row: a duplicate name is
    /// skipped with a notice, a failed insert becomes a notice, and the rest
    /// of the batch always continues.
    pub async fn import_previewed(
        &self,
        questionnaire_id: Uuid,
        preview: &[CsvRecord],
        auth: &AuthContext,
    ) -> ServiceResult<CsvImportSummary> {
        auth.authorize_all(&[Permission::ManageStudies, Permission::ImportData])?;

        common::validate_questionnaire_exists(&self.pool, &questionnaire_id, "questionnaire_id")
            .await
            .map_err(ServiceError::Domain)?;

        let mut summary = CsvImportSummary::default();

        for record in preview {
            let exists = self.repo.name_exists(&record.name, None)
                .await
                .map_err(ServiceError::Domain)?;
            if exists {
                summary.notices.push(format!("Variable '{}' already exists, skipped", record.name));
                continue;
            }

            let new = NewVariable {
                questionnaire_id,
                name: record.name.clone(),
                label: record.label.clone(),
                variable_type: record.variable_type.as_str().to_string(),
                values: Some(record.values.clone()),
                created_by_user_id: Some(auth.user_id),
            };

            match self.repo.create(new, auth).await {
                Ok(_) => summary.created += 1,
                Err(e) => {
                    summary.notices.push(format!("Failed to import variable '{}': {}", record.name, e));
                }
            }
        }

        log::info!(
            "Imported {} of {} previewed variables into questionnaire {} ({} notices)",
            summary.created,
            preview.len(),
            questionnaire_id,
            summary.notices.len()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::questionnaire::repository::{
        QuestionnaireRepository, SqliteQuestionnaireRepository,
    };
    use crate::domains::questionnaire::types::NewQuestionnaire;
    use crate::domains::variable::repository::SqliteVariableRepository;
    use crate::types::UserRole;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> (VariableService, Uuid) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db_migration::run_migrations(&pool).await.unwrap();

        let q_repo = SqliteQuestionnaireRepository::new(pool.clone());
        let q = q_repo.create(
            NewQuestionnaire {
                name: "Beck Depression Inventory".to_string(),
                short_name: "bdi".to_string(),
                description: "Self-report depression inventory".to_string(),
                created_by_user_id: None,
            },
            &ctx(UserRole::Superadmin),
        )
        .await
        .unwrap();

        let service = VariableService::new(pool.clone(), Arc::new(SqliteVariableRepository::new(pool)));
        (service, q.id)
    }

    fn ctx(role: UserRole) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), role)
    }

    fn upload(content: &str) -> CsvUpload {
        CsvUpload {
            filename: "variables.csv".to_string(),
            content_type: Some("text/csv".to_string()),
            data: content.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_process_then_import_creates_variables_verbatim() {
        let (service, qid) = setup().await;
        let admin = ctx(UserRole::Admin);

        let content = "name,label,type,values\nage,Age,integer,\nsex,Sex,radio,\"1,Male|2,Female\"";
        let preview = service.process_csv(qid, upload(content), CsvSeparator::Comma, &admin).await.unwrap();
        assert_eq!(preview.len(), 2);

        let summary = service.import_previewed(qid, &preview, &admin).await.unwrap();
        assert_eq!(summary.created, 2);
        assert!(summary.notices.is_empty());

        let listed = service.list_variables(qid, PaginationParams::default(), &admin).await.unwrap();
        assert_eq!(listed.total, 2);
        let sex = listed.items.iter().find(|v| v.name == "sex").unwrap();
        assert_eq!(sex.variable_type.as_str(), "radio");
        assert_eq!(sex.values.as_deref(), Some("1,Male|2,Female"));
        assert_eq!(sex.questionnaire_id, qid);
    }

    #[tokio::test]
    async fn test_import_skips_duplicates_and_continues() {
        let (service, qid) = setup().await;
        let admin = ctx(UserRole::Admin);

        service.create_variable(
            NewVariable {
                questionnaire_id: qid,
                name: "age".to_string(),
                label: "Age".to_string(),
                variable_type: "integer".to_string(),
                values: None,
                created_by_user_id: None,
            },
            &admin,
        )
        .await
        .unwrap();

        let content = "name,label,type,values\nage,Age,integer,\nsex,Sex,radio,\nheight,Height,float,";
        let preview = service.process_csv(qid, upload(content), CsvSeparator::Comma, &admin).await.unwrap();
        assert_eq!(preview.len(), 3);

        let summary = service.import_previewed(qid, &preview, &admin).await.unwrap();
        assert_eq!(summary.created, 2);
        assert!(summary.created < preview.len());
        assert_eq!(summary.notices.len(), 1);
        assert!(summary.notices[0].contains("age"));
    }

    #[tokio::test]
    async fn test_import_is_idempotent_per_preview() {
        let (service, qid) = setup().await;
        let admin = ctx(UserRole::Admin);

        let content = "name,label,type,values\nage,Age,integer,\nsex,Sex,radio,";
        let preview = service.process_csv(qid, upload(content), CsvSeparator::Comma, &admin).await.unwrap();

        let first = service.import_previewed(qid, &preview, &admin).await.unwrap();
        assert_eq!(first.created, 2);

        // Every name now collides, so a second commit creates nothing
        let second = service.import_previewed(qid, &preview, &admin).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.notices.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_rows_reject_the_batch_before_any_write() {
        let (service, qid) = setup().await;
        let admin = ctx(UserRole::Admin);

        let content = "name,label,type,values\nage,Age,integer,\nsex,Sex,boolean,";
        let result = service.process_csv(qid, upload(content), CsvSeparator::Comma, &admin).await;
        assert!(result.is_err());

        let listed = service.list_variables(qid, PaginationParams::default(), &admin).await.unwrap();
        assert_eq!(listed.total, 0);
    }

    #[tokio::test]
    async fn test_csv_import_requires_study_management() {
        let (service, qid) = setup().await;
        let content = "name,label,type,values\nage,Age,integer,";

        // data_entry may import data in general but not manage studies
        let denied = service
            .process_csv(qid, upload(content), CsvSeparator::Comma, &ctx(UserRole::DataEntry))
            .await;
        assert!(matches!(denied, Err(ServiceError::PermissionDenied(_))));

        let denied = service
            .import_previewed(qid, &[], &ctx(UserRole::Consultor))
            .await;
        assert!(matches!(denied, Err(ServiceError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_unknown_questionnaire_is_rejected() {
        let (service, _) = setup().await;
        let admin = ctx(UserRole::Admin);

        let content = "name,label,type,values\nage,Age,integer,";
        let result = service
            .process_csv(Uuid::new_v4(), upload(content), CsvSeparator::Comma, &admin)
            .await;
        assert!(result.is_err());
    }
}
