use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::Deserialize;
use serde_json::json;

use crate::auth::roles::{self, Role};
use crate::db::models::PeptideComment;
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, CurrentUser};
use crate::state::AppState;
use crate::ugc::detect_dosing_or_protocol;

const MAX_COMMENT_LEN: usize = 2000;

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/peptide-comments/{slug}",
            get(list_comments).post(create_comment),
        )
        .route(
            "/api/peptide-comments/{slug}/{id}/delete",
            post(delete_comment),
        )
}

pub fn query_comments(conn: &Connection, slug: &str) -> Result<Vec<PeptideComment>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.peptide_slug, c.user_id,
                COALESCE(p.display_name, substr(p.email, 1, instr(p.email, '@') - 1)),
                c.body, c.created_at
         FROM peptide_comments c
         JOIN profiles p ON p.id = c.user_id
         WHERE c.peptide_slug = ?1 AND c.deleted_at IS NULL
         ORDER BY c.created_at ASC, c.id ASC",
    )?;

    let comments = stmt
        .query_map(params![slug], |row| {
            Ok(PeptideComment {
                id: row.get(0)?,
                peptide_slug: row.get(1)?,
                user_id: row.get(2)?,
                author: row.get(3)?,
                body: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(comments)
}

/// Alias-aware slug; unknown slugs pass through lowercased.
fn canonical_slug(state: &AppState, slug: &str) -> String {
    state
        .content
        .get(slug)
        .map(|p| p.slug.clone())
        .unwrap_or_else(|| slug.to_ascii_lowercase())
}

async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let slug = canonical_slug(&state, &slug);
    let conn = state.db.get()?;
    let comments = query_comments(&conn, &slug)?;
    Ok(Json(json!({ "ok": true, "items": comments })))
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(slug): Path<String>,
    AppJson(req): AppJson<CreateCommentRequest>,
) -> AppResult<Response> {
    let slug = state
        .content
        .get(&slug)
        .map(|p| p.slug.clone())
        .ok_or(AppError::NotFound)?;

    let body = req.body.trim().to_string();
    if body.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if body.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "Comment must be {} characters or less",
            MAX_COMMENT_LEN
        )));
    }

    // Comments publish immediately, so flagged text is refused outright
    let screen = detect_dosing_or_protocol(&body);
    if screen.flagged {
        return Err(AppError::Screened(screen.reasons));
    }

    let comment_id = uuid::Uuid::now_v7().to_string();
    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO peptide_comments (id, peptide_slug, user_id, body) VALUES (?1, ?2, ?3, ?4)",
        params![comment_id, slug, user.id, body],
    )?;
    let created_at: String = conn.query_row(
        "SELECT created_at FROM peptide_comments WHERE id = ?1",
        params![comment_id],
        |r| r.get(0),
    )?;

    let comment = PeptideComment {
        id: comment_id,
        peptide_slug: slug,
        author: user.public_name(),
        user_id: user.id,
        body,
        created_at,
    };

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "comment": comment }))).into_response())
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((slug, id)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let owner_id: String = conn
        .query_row(
            "SELECT user_id FROM peptide_comments
             WHERE id = ?1 AND peptide_slug = ?2 AND deleted_at IS NULL",
            params![id, canonical_slug(&state, &slug)],
            |r| r.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound,
            other => other.into(),
        })?;

    let allowed = owner_id == user.id
        || user.is_admin
        || roles::has_any_role(&conn, &user.id, &[Role::Admin, Role::Moderator])?;
    if !allowed {
        return Err(AppError::Forbidden("Only the author or a moderator can delete this comment".into()));
    }

    conn.execute(
        "UPDATE peptide_comments SET deleted_at = datetime('now') WHERE id = ?1",
        params![id],
    )?;
    tracing::info!(comment = %id, by = %user.id, "Comment deleted");

    Ok(Json(json!({ "ok": true })))
}
