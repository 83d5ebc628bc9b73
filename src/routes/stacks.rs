use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, Row};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{SavedStack, StackItem};
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, CurrentUser};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 80;
const MAX_ITEMS: usize = 50;
const MAX_NOTE_LEN: usize = 280;

pub(crate) static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,79}$").expect("slug pattern"));

#[derive(Deserialize)]
pub struct StackRequest {
    pub name: String,
    #[serde(default)]
    pub items: Vec<StackItem>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/stacks", get(list_stacks).post(create_stack))
        .route(
            "/api/stacks/{id}",
            get(get_stack).post(update_stack).delete(delete_stack),
        )
}

/// Trim and validate; returns the cleaned name and items.
fn validate(req: StackRequest) -> AppResult<(String, Vec<StackItem>)> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Stack name must be 1-{} characters",
            MAX_NAME_LEN
        )));
    }
    if req.items.len() > MAX_ITEMS {
        return Err(AppError::BadRequest(format!(
            "A stack holds at most {} items",
            MAX_ITEMS
        )));
    }

    let items = req
        .items
        .into_iter()
        .map(|item| {
            let slug = item.slug.trim().to_ascii_lowercase();
            if !SLUG_RE.is_match(&slug) {
                return Err(AppError::BadRequest(format!("Invalid slug: {}", item.slug)));
            }
            let note = item
                .note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
            if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
                return Err(AppError::BadRequest(format!(
                    "Notes must be {} characters or less",
                    MAX_NOTE_LEN
                )));
            }
            Ok(StackItem { slug, note })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok((name, items))
}

fn stack_from_row(row: &Row<'_>) -> rusqlite::Result<SavedStack> {
    let items_json: String = row.get(3)?;
    Ok(SavedStack {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        items: serde_json::from_str(&items_json).unwrap_or_default(),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Owner-scoped lookup; someone else's stack is indistinguishable from a missing one.
fn load_owned(conn: &Connection, id: &str, user_id: &str) -> AppResult<SavedStack> {
    conn.query_row(
        "SELECT id, user_id, name, items_json, created_at, updated_at
         FROM saved_stacks WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
        stack_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound,
        other => other.into(),
    })
}

async fn list_stacks(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, items_json, created_at, updated_at
         FROM saved_stacks WHERE user_id = ?1
         ORDER BY updated_at DESC, id DESC",
    )?;
    let stacks = stmt
        .query_map(params![user.id], stack_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(json!({ "ok": true, "items": stacks })))
}

async fn create_stack(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<StackRequest>,
) -> AppResult<Response> {
    let (name, items) = validate(req)?;
    let id = uuid::Uuid::now_v7().to_string();

    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO saved_stacks (id, user_id, name, items_json) VALUES (?1, ?2, ?3, ?4)",
        params![id, user.id, name, serde_json::to_string(&items)?],
    )?;
    let stack = load_owned(&conn, &id, &user.id)?;

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "stack": stack }))).into_response())
}

async fn get_stack(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let stack = load_owned(&conn, &id, &user.id)?;
    Ok(Json(json!({ "ok": true, "stack": stack })))
}

async fn update_stack(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<StackRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let (name, items) = validate(req)?;

    let conn = state.db.get()?;
    let rows = conn.execute(
        "UPDATE saved_stacks SET name = ?3, items_json = ?4, updated_at = datetime('now')
         WHERE id = ?1 AND user_id = ?2",
        params![id, user.id, name, serde_json::to_string(&items)?],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound);
    }

    let stack = load_owned(&conn, &id, &user.id)?;
    Ok(Json(json!({ "ok": true, "stack": stack })))
}

async fn delete_stack(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let rows = conn.execute(
        "DELETE FROM saved_stacks WHERE id = ?1 AND user_id = ?2",
        params![id, user.id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(slug: &str) -> StackItem {
        StackItem {
            slug: slug.into(),
            note: None,
        }
    }

    #[test]
    fn validate_normalizes_slugs_and_drops_blank_notes() {
        let (name, items) = validate(StackRequest {
            name: "  Recovery reading  ".into(),
            items: vec![StackItem {
                slug: " BPC-157 ".into(),
                note: Some("   ".into()),
            }],
        })
        .unwrap();
        assert_eq!(name, "Recovery reading");
        assert_eq!(items, vec![item("bpc-157")]);
    }

    #[test]
    fn validate_rejects_bad_input() {
        let too_many = StackRequest {
            name: "x".into(),
            items: (0..51).map(|i| item(&format!("p-{}", i))).collect(),
        };
        assert!(validate(too_many).is_err());

        let bad_slug = StackRequest {
            name: "x".into(),
            items: vec![item("../etc/passwd")],
        };
        assert!(validate(bad_slug).is_err());

        let empty_name = StackRequest {
            name: "   ".into(),
            items: vec![],
        };
        assert!(validate(empty_name).is_err());
    }

    #[test]
    fn slug_pattern() {
        assert!(SLUG_RE.is_match("tb-500"));
        assert!(!SLUG_RE.is_match("-leading-dash"));
        assert!(!SLUG_RE.is_match("Upper"));
        assert!(!SLUG_RE.is_match(""));
    }
}
