/// Application context and dependency injection
use crate::{
    account::SessionManager,
    admin::{ElevationWorkflow, RoleAdministration},
    auth::AuthorizationGate,
    config::ServerConfig,
    db,
    error::KbResult,
    solution::SolutionWorkflow,
    store::SqliteStore,
    token::TokenService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub store: Arc<SqliteStore>,
    pub tokens: Arc<TokenService>,
    pub sessions: Arc<SessionManager>,
    pub gate: Arc<AuthorizationGate>,
    // Workflows
    pub solutions: Arc<SolutionWorkflow>,
    pub elevation: Arc<ElevationWorkflow>,
    pub role_admin: Arc<RoleAdministration>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> KbResult<Self> {
        config.validate()?;

        let pool = db::create_pool(
            &config.storage.database_path,
            db::DatabaseOptions {
                max_connections: config.storage.max_connections,
                ..Default::default()
            },
        )
        .await?;

        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        Ok(Self::with_pool(config, pool))
    }

    /// Wire every service over an already-migrated pool
    pub fn with_pool(config: ServerConfig, pool: SqlitePool) -> Self {
        let store = Arc::new(SqliteStore::new(pool));
        let tokens = Arc::new(TokenService::from_config(&config.authentication));

        let sessions = Arc::new(SessionManager::new(store.clone(), tokens.clone()));
        let gate = Arc::new(AuthorizationGate::new(tokens.clone(), store.clone()));
        let solutions = Arc::new(SolutionWorkflow::new(store.clone()));
        let elevation = Arc::new(ElevationWorkflow::new(store.clone(), store.clone()));
        let role_admin = Arc::new(RoleAdministration::new(store.clone()));

        Self {
            config: Arc::new(config),
            store,
            tokens,
            sessions,
            gate,
            solutions,
            elevation,
            role_admin,
        }
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
