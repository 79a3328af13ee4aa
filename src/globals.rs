use crate::auth::{jwt, AuthService};
use crate::domains::user::{UserRepository, UserService};
use crate::domains::user::repository::SqliteUserRepository;
use crate::domains::questionnaire::{QuestionnaireRepository, QuestionnaireService};
use crate::domains::questionnaire::repository::SqliteQuestionnaireRepository;
use crate::domains::variable::{VariableRepository, VariableService};
use crate::domains::variable::repository::SqliteVariableRepository;
use crate::domains::participant::{ParticipantRepository, ParticipantService};
use crate::domains::participant::repository::SqliteParticipantRepository;
use crate::errors::{DbError, DomainError, ServiceError, ServiceResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use lazy_static::lazy_static;

// Global state definitions
lazy_static! {
    static ref INITIALIZED: AtomicBool = AtomicBool::new(false);

    static ref DB_POOL: Mutex<Option<SqlitePool>> = Mutex::new(None);

    // Core services
    static ref AUTH_SERVICE: Mutex<Option<Arc<AuthService>>> = Mutex::new(None);

    // User domain
    static ref USER_REPO: Mutex<Option<Arc<dyn UserRepository>>> = Mutex::new(None);
    static ref USER_SERVICE: Mutex<Option<Arc<UserService>>> = Mutex::new(None);

    // Questionnaire domain
    static ref QUESTIONNAIRE_REPO: Mutex<Option<Arc<dyn QuestionnaireRepository>>> = Mutex::new(None);
    static ref QUESTIONNAIRE_SERVICE: Mutex<Option<Arc<QuestionnaireService>>> = Mutex::new(None);

    // Variable domain
    static ref VARIABLE_REPO: Mutex<Option<Arc<dyn VariableRepository>>> = Mutex::new(None);
    static ref VARIABLE_SERVICE: Mutex<Option<Arc<VariableService>>> = Mutex::new(None);

    // Participant domain
    static ref PARTICIPANT_REPO: Mutex<Option<Arc<dyn ParticipantRepository>>> = Mutex::new(None);
    static ref PARTICIPANT_SERVICE: Mutex<Option<Arc<ParticipantService>>> = Mutex::new(None);
}

fn store<T>(slot: &Mutex<Option<T>>, value: T, name: &str) -> ServiceResult<()> {
    let mut guard = slot.lock()
        .map_err(|_| ServiceError::Configuration(format!("{} lock poisoned", name)))?;
    *guard = Some(value);
    Ok(())
}

fn fetch<T: Clone>(slot: &Mutex<Option<T>>, name: &str) -> ServiceResult<T> {
    slot.lock()
        .map_err(|_| ServiceError::Configuration(format!("{} lock poisoned", name)))?
        .clone()
        .ok_or_else(|| ServiceError::Configuration(format!("{} not initialized", name)))
}

/// Initialize the connection pool and the service registry. Safe to call
/// once per process; later calls are no-ops.
pub async fn initialize(db_path: &str, jwt_secret: &str) -> ServiceResult<()> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        log::warn!("Service registry already initialized, ignoring repeated call");
        return Ok(());
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| {
            ServiceError::Domain(DomainError::Database(DbError::ConnectionPool(e.to_string())))
        })?;

    jwt::initialize(jwt_secret);

    let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool.clone()));
    let auth_service = Arc::new(AuthService::new(user_repo.clone()));
    let user_service = Arc::new(UserService::new(user_repo.clone(), auth_service.clone()));

    let questionnaire_repo: Arc<dyn QuestionnaireRepository> =
        Arc::new(SqliteQuestionnaireRepository::new(pool.clone()));
    let questionnaire_service = Arc::new(QuestionnaireService::new(questionnaire_repo.clone()));

    let variable_repo: Arc<dyn VariableRepository> =
        Arc::new(SqliteVariableRepository::new(pool.clone()));
    let variable_service = Arc::new(VariableService::new(pool.clone(), variable_repo.clone()));

    let participant_repo: Arc<dyn ParticipantRepository> =
        Arc::new(SqliteParticipantRepository::new(pool.clone()));
    let participant_service = Arc::new(ParticipantService::new(participant_repo.clone()));

    store(&DB_POOL, pool, "DB_POOL")?;
    store(&AUTH_SERVICE, auth_service, "AUTH_SERVICE")?;
    store(&USER_REPO, user_repo, "USER_REPO")?;
    store(&USER_SERVICE, user_service, "USER_SERVICE")?;
    store(&QUESTIONNAIRE_REPO, questionnaire_repo, "QUESTIONNAIRE_REPO")?;
    store(&QUESTIONNAIRE_SERVICE, questionnaire_service, "QUESTIONNAIRE_SERVICE")?;
    store(&VARIABLE_REPO, variable_repo, "VARIABLE_REPO")?;
    store(&VARIABLE_SERVICE, variable_service, "VARIABLE_SERVICE")?;
    store(&PARTICIPANT_REPO, participant_repo, "PARTICIPANT_REPO")?;
    store(&PARTICIPANT_SERVICE, participant_service, "PARTICIPANT_SERVICE")?;

    log::info!("Service registry initialized with database at {}", db_path);
    Ok(())
}

// --- Getter functions ---

pub fn get_db_pool() -> ServiceResult<SqlitePool> {
    fetch(&DB_POOL, "Database pool")
}

pub fn get_auth_service() -> ServiceResult<Arc<AuthService>> {
    fetch(&AUTH_SERVICE, "AuthService")
}

pub fn get_user_repo() -> ServiceResult<Arc<dyn UserRepository>> {
    fetch(&USER_REPO, "UserRepository")
}

pub fn get_user_service() -> ServiceResult<Arc<UserService>> {
    fetch(&USER_SERVICE, "UserService")
}

pub fn get_questionnaire_repo() -> ServiceResult<Arc<dyn QuestionnaireRepository>> {
    fetch(&QUESTIONNAIRE_REPO, "QuestionnaireRepository")
}

pub fn get_questionnaire_service() -> ServiceResult<Arc<QuestionnaireService>> {
    fetch(&QUESTIONNAIRE_SERVICE, "QuestionnaireService")
}

pub fn get_variable_repo() -> ServiceResult<Arc<dyn VariableRepository>> {
    fetch(&VARIABLE_REPO, "VariableRepository")
}

pub fn get_variable_service() -> ServiceResult<Arc<VariableService>> {
    fetch(&VARIABLE_SERVICE, "VariableService")
}

pub fn get_participant_repo() -> ServiceResult<Arc<dyn ParticipantRepository>> {
    fetch(&PARTICIPANT_REPO, "ParticipantRepository")
}

pub fn get_participant_service() -> ServiceResult<Arc<ParticipantService>> {
    fetch(&PARTICIPANT_SERVICE, "ParticipantService")
}
