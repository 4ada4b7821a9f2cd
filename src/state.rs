use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};
use crate::db;
use crate::error::AppError;
use crate::store::{DayStore, FileDayStore, PgDayStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DayStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Picks the store backend once for the lifetime of the process.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let store = match (config.backend, config.database_url.as_deref()) {
            (StoreBackend::Postgres | StoreBackend::Auto, Some(url)) => {
                let db = db::connect(url, &config).await?;
                Arc::new(PgDayStore::new(db)) as Arc<dyn DayStore>
            }
            (StoreBackend::Postgres, None) => return Err(AppError::StoreUnavailable.into()),
            (StoreBackend::File, _) | (StoreBackend::Auto, None) => {
                tracing::warn!(
                    path = %config.store_file.display(),
                    "DATABASE_URL not set; using file store"
                );
                Arc::new(FileDayStore::new(
                    config.store_file.clone(),
                    config.file_read_policy,
                )) as Arc<dyn DayStore>
            }
        };

        tracing::info!(backend = store.kind(), "store selected");
        Ok(Self { store, config })
    }

    pub fn from_parts(store: Arc<dyn DayStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }
}

#[cfg(test)]
impl AppState {
    /// File-backed state rooted in a temp directory.
    pub fn fake(dir: &std::path::Path) -> Self {
        let config = AppConfig::from_lookup(|_| None).expect("default config");
        let store = Arc::new(FileDayStore::new(
            dir.join("meals.json"),
            config.file_read_policy,
        )) as Arc<dyn DayStore>;
        Self::from_parts(store, Arc::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileReadPolicy;

    fn config(backend: StoreBackend, dir: &std::path::Path) -> AppConfig {
        let mut cfg = AppConfig::from_lookup(|_| None).unwrap();
        cfg.backend = backend;
        cfg.store_file = dir.join("meals.json");
        cfg.file_read_policy = FileReadPolicy::Strict;
        cfg
    }

    #[tokio::test]
    async fn auto_without_database_url_uses_file_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::init(config(StoreBackend::Auto, dir.path())).await.unwrap();
        assert_eq!(state.store.kind(), "file");
    }

    #[tokio::test]
    async fn postgres_without_database_url_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = match AppState::init(config(StoreBackend::Postgres, dir.path())).await {
            Ok(_) => panic!("expected StoreUnavailable"),
            Err(e) => e,
        };
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::StoreUnavailable)
        ));
    }

    #[tokio::test]
    async fn file_backend_ignores_database_url() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = config(StoreBackend::File, dir.path());
        cfg.database_url = Some("postgres://unused".into());
        let state = AppState::init(cfg).await.unwrap();
        assert_eq!(state.store.kind(), "file");
    }
}
