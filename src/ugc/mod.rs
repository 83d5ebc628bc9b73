pub mod detector;
pub mod repository;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

pub use detector::{detect_dosing_or_protocol, Screen};
pub use repository::{NewUgcPost, SqliteUgcRepository, UgcPost, UgcRepository};
pub use status::{UgcStatus, MODERATION_TARGETS};

/// Handle to the community database. The pool is opened on first use.
#[derive(Clone)]
pub struct UgcStore {
    path: PathBuf,
    pool: Arc<OnceCell<DbPool>>,
}

impl UgcStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            pool: Arc::new(OnceCell::new()),
        }
    }

    pub async fn pool(&self) -> AppResult<DbPool> {
        let pool = self
            .pool
            .get_or_try_init(|| async {
                tracing::info!("Opening UGC database at {}", self.path.display());
                let pool = db::create_pool(&self.path)?;
                db::run_ugc_migrations(&pool)?;
                Ok::<_, anyhow::Error>(pool)
            })
            .await
            .map_err(|e| AppError::Internal(format!("UGC database unavailable: {}", e)))?;
        Ok(pool.clone())
    }

    pub async fn repository(&self) -> AppResult<SqliteUgcRepository> {
        Ok(SqliteUgcRepository::new(self.pool().await?))
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.initialized()
    }
}
