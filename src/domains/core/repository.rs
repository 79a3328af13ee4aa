use crate::errors::DomainResult;
use crate::auth::AuthContext;
use uuid::Uuid;
use async_trait::async_trait;
use sqlx::{Transaction, Sqlite};

/// Trait for finding entities by ID
#[async_trait]
pub trait FindById<T> {
    /// Find an entity by ID
    async fn find_by_id(&self, id: Uuid) -> DomainResult<T>;
}

/// Trait for entities that can be deleted. Deletes are unconditional and
/// permanent; there is no soft-delete path.
#[async_trait]
pub trait Deletable {
    /// The name of the entity table in the database (for errors/logging)
    fn entity_name(&self) -> &'static str;

    /// Delete an entity by ID (standalone)
    async fn delete(&self, id: Uuid, auth: &AuthContext) -> DomainResult<()>;

    /// Delete an entity by ID within a transaction
    async fn delete_with_tx(
        &self,
        id: Uuid,
        auth: &AuthContext,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;
}

/// Generic repository trait for basic CRUD operations
#[async_trait]
pub trait Repository<T, CreateDto, UpdateDto>: FindById<T> + Deletable {
    /// Create a new entity
    async fn create(&self, dto: CreateDto, auth: &AuthContext) -> DomainResult<T>;

    /// Update an existing entity
    async fn update(&self, id: Uuid, dto: UpdateDto, auth: &AuthContext) -> DomainResult<T>;
}
