use std::sync::Arc;

use anyhow::Context;

use crate::{
    auth::{memory::MemoryStore, repo::CredentialStore, services::AuthService},
    clock::{Clock, SystemClock},
    config::AppConfig,
    db::{self, PgStore},
    notify::{self, LogNotifier, Notifier},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn CredentialStore>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Connects to Postgres, applies migrations and wires the auth core.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = db::connect(&config.database_url).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;

        let store = Arc::new(PgStore::new(pool)) as Arc<dyn CredentialStore>;
        let notifier = notify::from_config(config.smtp.as_ref())?;
        Self::from_parts(config, store, notifier, Arc::new(SystemClock))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let auth = Arc::new(AuthService::new(
            &config,
            store.clone(),
            notifier,
            clock,
        )?);
        Ok(Self {
            config,
            store,
            auth,
        })
    }

    /// In-memory state for tests: no database, emails go to the log.
    pub fn fake() -> Self {
        Self::fake_with(Arc::new(LogNotifier), Arc::new(SystemClock))
    }

    pub fn fake_with(notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        let config = Arc::new(AppConfig::for_tests());
        let store = Arc::new(MemoryStore::new()) as Arc<dyn CredentialStore>;
        let auth = Arc::new(
            AuthService::new(&config, store.clone(), notifier, clock)
                .expect("test config has valid argon2 params"),
        );
        Self {
            config,
            store,
            auth,
        }
    }
}
