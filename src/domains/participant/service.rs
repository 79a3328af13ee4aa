use crate::errors::{ServiceError, ServiceResult};
use crate::domains::participant::repository::ParticipantRepository;
use crate::domains::participant::types::{
    NewParticipant, Participant, ParticipantFilter, ParticipantResponse, UpdateParticipant,
};
use crate::domains::core::repository::{Deletable, FindById};
use crate::auth::AuthContext;
use crate::types::{PaginatedResult, PaginationParams, Permission};
use crate::validation::Validate;
use uuid::Uuid;
use std::sync::Arc;

/// Service for participant management
pub struct ParticipantService {
    repo: Arc<dyn ParticipantRepository>,
}

impl ParticipantService {
    /// Create a new participant service
    pub fn new(repo: Arc<dyn ParticipantRepository>) -> Self {
        Self { repo }
    }

    /// Register a new participant
    pub async fn create_participant(
        &self,
        new: NewParticipant,
        auth: &AuthContext,
    ) -> ServiceResult<ParticipantResponse> {
        auth.authorize(Permission::CreateParticipants)?;

        new.validate().map_err(ServiceError::Domain)?;

        let created = self.repo.create(new, auth)
            .await
            .map_err(ServiceError::Domain)?;

        log::info!("Registered participant {} ({})", created.unique_code, created.id);
        Ok(created.into())
    }

    /// Get a participant by ID
    pub async fn get_participant(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Participant> {
        auth.authorize(Permission::ViewParticipants)?;

        self.repo.find_by_id(id)
            .await
            .map_err(ServiceError::Domain)
    }

    /// Get a participant by unique code
    pub async fn get_participant_by_code(
        &self,
        unique_code: &str,
        auth: &AuthContext,
    ) -> ServiceResult<Participant> {
        auth.authorize(Permission::ViewParticipants)?;

        self.repo.find_by_code(unique_code)
            .await
            .map_err(ServiceError::Domain)
    }

    /// List participants matching the filter, paginated
    pub async fn list_participants(
        &self,
        filter: &ParticipantFilter,
        params: PaginationParams,
        auth: &AuthContext,
    ) -> ServiceResult<PaginatedResult<ParticipantResponse>> {
        auth.authorize(Permission::ViewParticipants)?;

        let page = self.repo.find_paginated(filter, params)
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

    /// Update an existing participant
    pub async fn update_participant(
        &self,
        id: Uuid,
        update: UpdateParticipant,
        auth: &AuthContext,
    ) -> ServiceResult<ParticipantResponse> {
        auth.authorize(Permission::EditParticipants)?;

        update.validate().map_err(ServiceError::Domain)?;

        let updated = self.repo.update(id, update, auth)
            .await
            .map_err(ServiceError::Domain)?;

        Ok(updated.into())
    }

    /// Delete a participant
    pub async fn delete_participant(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<()> {
        auth.authorize(Permission::DeleteParticipants)?;

        self.repo.delete(id, auth)
            .await
            .map_err(ServiceError::Domain)
    }
}
