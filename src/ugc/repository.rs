// Repository pattern - isolates all UGC database side effects
use async_trait::async_trait;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;
use crate::state::DbPool;
use crate::ugc::detector::Screen;
use crate::ugc::status::UgcStatus;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Database(e) => AppError::Pool(e),
            RepositoryError::Sql(e) => AppError::Database(e),
            RepositoryError::Serialization(e) => AppError::Json(e),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UgcPost {
    pub id: String,
    pub author_id: String,
    pub peptide_slug: Option<String>,
    pub title: String,
    pub body: String,
    pub status: UgcStatus,
    pub screen_flags: Vec<String>,
    pub moderator_id: Option<String>,
    pub moderation_note: Option<String>,
    pub moderated_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

const POST_COLUMNS: &str = "id, author_id, peptide_slug, title, body, status, screen_flags, \
     moderator_id, moderation_note, moderated_at, created_at, updated_at";

impl UgcPost {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(5)?;
        let flags: String = row.get(6)?;
        Ok(Self {
            id: row.get(0)?,
            author_id: row.get(1)?,
            peptide_slug: row.get(2)?,
            title: row.get(3)?,
            body: row.get(4)?,
            // The CHECK constraint keeps this column within the enum
            status: status.parse().unwrap_or(UgcStatus::Pending),
            screen_flags: serde_json::from_str(&flags).unwrap_or_default(),
            moderator_id: row.get(7)?,
            moderation_note: row.get(8)?,
            moderated_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUgcPost {
    pub author_id: String,
    pub peptide_slug: Option<String>,
    pub title: String,
    pub body: String,
    pub screen: Screen,
}

/// Repository trait - all moderation queue operations
#[async_trait]
pub trait UgcRepository: Send + Sync {
    /// Store a submission; always enters the queue as pending
    async fn submit(&self, post: NewUgcPost) -> Result<UgcPost, RepositoryError>;

    async fn get(&self, id: &str) -> Result<Option<UgcPost>, RepositoryError>;

    /// Newest first
    async fn list_by_status(
        &self,
        status: UgcStatus,
        limit: u32,
    ) -> Result<Vec<UgcPost>, RepositoryError>;

    async fn list_by_author(
        &self,
        author_id: &str,
        limit: u32,
    ) -> Result<Vec<UgcPost>, RepositoryError>;

    /// Set a new status. Returns None when the post does not exist.
    async fn moderate_post(
        &self,
        id: &str,
        target: UgcStatus,
        moderator_id: Option<&str>,
        note: Option<&str>,
    ) -> Result<Option<UgcPost>, RepositoryError>;
}

/// SQLite implementation
pub struct SqliteUgcRepository {
    pool: DbPool,
}

impl SqliteUgcRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn load(conn: &rusqlite::Connection, id: &str) -> Result<Option<UgcPost>, RepositoryError> {
        let result = conn.query_row(
            &format!("SELECT {} FROM ugc_posts WHERE id = ?1", POST_COLUMNS),
            params![id],
            UgcPost::from_row,
        );

        match result {
            Ok(post) => Ok(Some(post)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl UgcRepository for SqliteUgcRepository {
    async fn submit(&self, post: NewUgcPost) -> Result<UgcPost, RepositoryError> {
        let conn = self.pool.get()?;

        let id = uuid::Uuid::now_v7().to_string();
        let flags = serde_json::to_string(&post.screen.reasons)?;

        conn.execute(
            "INSERT INTO ugc_posts (id, author_id, peptide_slug, title, body, status, screen_flags)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
            params![
                id,
                post.author_id,
                post.peptide_slug,
                post.title,
                post.body,
                flags
            ],
        )?;

        Self::load(&conn, &id)?.ok_or(RepositoryError::Sql(rusqlite::Error::QueryReturnedNoRows))
    }

    async fn get(&self, id: &str) -> Result<Option<UgcPost>, RepositoryError> {
        let conn = self.pool.get()?;
        Self::load(&conn, id)
    }

    async fn list_by_status(
        &self,
        status: UgcStatus,
        limit: u32,
    ) -> Result<Vec<UgcPost>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ugc_posts WHERE status = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
            POST_COLUMNS
        ))?;

        let posts = stmt
            .query_map(params![status.as_str(), limit], UgcPost::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn list_by_author(
        &self,
        author_id: &str,
        limit: u32,
    ) -> Result<Vec<UgcPost>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ugc_posts WHERE author_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
            POST_COLUMNS
        ))?;

        let posts = stmt
            .query_map(params![author_id, limit], UgcPost::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn moderate_post(
        &self,
        id: &str,
        target: UgcStatus,
        moderator_id: Option<&str>,
        note: Option<&str>,
    ) -> Result<Option<UgcPost>, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "UPDATE ugc_posts SET
               status = ?2,
               moderator_id = ?3,
               moderation_note = ?4,
               moderated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
               updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?1",
            params![id, target.as_str(), moderator_id, note],
        )?;

        if rows == 0 {
            return Ok(None);
        }
        Self::load(&conn, id)
    }
}
