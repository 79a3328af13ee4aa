use crate::errors::{ServiceError, ServiceResult};
use crate::domains::questionnaire::types::{
    NewQuestionnaire, Questionnaire, QuestionnaireResponse, UpdateQuestionnaire,
};
use crate::domains::questionnaire::repository::QuestionnaireRepository;
use crate::domains::core::repository::{Deletable, FindById};
use crate::auth::AuthContext;
use crate::types::{PaginatedResult, PaginationParams, Permission};
use crate::validation::Validate;
use uuid::Uuid;
use std::sync::Arc;

/// Service for questionnaire management
pub struct QuestionnaireService {
    repo: Arc<dyn QuestionnaireRepository>,
}

impl QuestionnaireService {
    /// Create a new questionnaire service
    pub fn new(repo: Arc<dyn QuestionnaireRepository>) -> Self {
        Self { repo }
    }

    /// Create a new questionnaire
    pub async fn create_questionnaire(
        &self,
        new: NewQuestionnaire,
        auth: &AuthContext,
    ) -> ServiceResult<QuestionnaireResponse> {
        auth.authorize(Permission::ManageStudies)?;

        new.validate().map_err(ServiceError::Domain)?;

        let created = self.repo.create(new, auth)
            .await
            .map_err(ServiceError::Domain)?;

        log::info!("Created questionnaire {} ({})", created.name, created.id);
        Ok(created.into())
    }

    /// Get a questionnaire by ID
    pub async fn get_questionnaire(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Questionnaire> {
        auth.authorize(Permission::ViewStudies)?;

        self.repo.find_by_id(id)
            .await
            .map_err(ServiceError::Domain)
    }

    /// List questionnaires, paginated, with their variable counts
    pub async fn list_questionnaires(
        &self,
        params: PaginationParams,
        auth: &AuthContext,
    ) -> ServiceResult<PaginatedResult<QuestionnaireResponse>> {
        auth.authorize(Permission::ViewStudies)?;

        let page = self.repo.find_paginated(params)
            .await
            .map_err(ServiceError::Domain)?;

        let items = page.items
            .into_iter()
            .map(|(q, count)| QuestionnaireResponse::with_count(q, count))
            .collect();

        Ok(PaginatedResult {
            items,
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            total_pages: page.total_pages,
        })
    }

    /// Update an existing questionnaire. `table_name` is never recomputed.
    pub async fn update_questionnaire(
        &self,
        id: Uuid,
        update: UpdateQuestionnaire,
        auth: &AuthContext,
    ) -> ServiceResult<QuestionnaireResponse> {
        auth.authorize(Permission::ManageStudies)?;

        update.validate().map_err(ServiceError::Domain)?;

        let updated = self.repo.update(id, update, auth)
            .await
            .map_err(ServiceError::Domain)?;

        Ok(updated.into())
    }

    /// Delete a questionnaire and, in the same transaction, all of its variables
    pub async fn delete_questionnaire(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<()> {
        auth.authorize(Permission::ManageStudies)?;

        self.repo.delete(id, auth)
            .await
            .map_err(ServiceError::Domain)
    }
}
