use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::content::ContentIndex;
use crate::ugc::UgcStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub ugc: UgcStore,
    pub config: Config,
    pub content: Arc<ContentIndex>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, content: ContentIndex) -> Self {
        let ugc = UgcStore::new(config.ugc_db_path());
        Self {
            db,
            ugc,
            config,
            content: Arc::new(content),
        }
    }
}
