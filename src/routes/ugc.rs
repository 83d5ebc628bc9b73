use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::audit::{self, AuditEvent};
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, AppQuery, CurrentUser, MaybeUgcAdmin, MaybeUser, UgcAdmin};
use crate::state::AppState;
use crate::ugc::{detect_dosing_or_protocol, NewUgcPost, UgcRepository, UgcStatus};

const TITLE_RANGE: (usize, usize) = (3, 140);
const BODY_RANGE: (usize, usize) = (10, 5000);
const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

// --- Requests ---

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub title: String,
    pub body: String,
    pub peptide_slug: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct ModerateRequest {
    pub id: String,
    pub status: String,
    pub note: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/ugc/submit", post(submit))
        .route("/api/ugc/posts", get(list_posts))
        .route("/api/ugc/posts/{id}", get(get_post))
        .route("/api/ugc/mine", get(list_mine))
        .route("/api/ugc/moderate", post(moderate))
}

fn check_length(field: &str, value: &str, (min, max): (usize, usize)) -> AppResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::BadRequest(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

fn clamp(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

// --- Handlers ---

async fn submit(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<SubmitRequest>,
) -> AppResult<Response> {
    let title = req.title.trim().to_string();
    let body = req.body.trim().to_string();
    check_length("Title", &title, TITLE_RANGE)?;
    check_length("Body", &body, BODY_RANGE)?;

    // Aliases are stored under the canonical slug
    let peptide_slug = match req.peptide_slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match state.content.get(raw) {
            Some(peptide) => Some(peptide.slug.clone()),
            None => return Err(AppError::BadRequest(format!("Unknown peptide: {}", raw))),
        },
        None => None,
    };

    let screen = detect_dosing_or_protocol(&format!("{}\n{}", title, body));
    if screen.flagged {
        tracing::info!(user = %user.id, reasons = ?screen.reasons, "Submission flagged by screen");
    }

    let repo = state.ugc.repository().await?;
    let post = repo
        .submit(NewUgcPost {
            author_id: user.id,
            peptide_slug,
            title,
            body,
            screen: screen.clone(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "post": post, "screen": screen })),
    )
        .into_response())
}

async fn list_posts(
    State(state): State<AppState>,
    MaybeUgcAdmin(admin): MaybeUgcAdmin,
    AppQuery(query): AppQuery<ListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let status = match query.status.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw.parse::<UgcStatus>()?,
        _ => UgcStatus::Approved,
    };
    if !status.is_public() && admin.is_none() {
        return Err(AppError::Forbidden("Moderator access required".into()));
    }

    let repo = state.ugc.repository().await?;
    let posts = repo.list_by_status(status, clamp(query.limit)).await?;

    Ok(Json(json!({ "ok": true, "status": status, "items": posts })))
}

async fn get_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    MaybeUgcAdmin(admin): MaybeUgcAdmin,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let repo = state.ugc.repository().await?;
    let post = repo.get(&id).await?.ok_or(AppError::NotFound)?;

    let is_author = user.as_ref().is_some_and(|u| u.id == post.author_id);
    if !post.status.is_public() && !is_author && admin.is_none() {
        // Hidden posts look absent to everyone else
        return Err(AppError::NotFound);
    }

    Ok(Json(json!({ "ok": true, "post": post })))
}

async fn list_mine(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<ListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let repo = state.ugc.repository().await?;
    let posts = repo.list_by_author(&user.id, clamp(query.limit)).await?;
    Ok(Json(json!({ "ok": true, "items": posts })))
}

async fn moderate(
    State(state): State<AppState>,
    admin: UgcAdmin,
    AppJson(req): AppJson<ModerateRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let target = UgcStatus::moderation_target(&req.status)?;
    let note = req
        .note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    if note.is_some_and(|n| n.chars().count() > 1000) {
        return Err(AppError::BadRequest("Note must be 1000 characters or less".into()));
    }

    let repo = state.ugc.repository().await?;
    let post = repo
        .moderate_post(&req.id, target, admin.actor_id(), note)
        .await?
        .ok_or(AppError::NotFound)?;

    audit::record_best_effort(
        &state.db,
        &AuditEvent {
            actor_id: admin.actor_id(),
            action: "ugc.moderate",
            target_type: "ugc_post",
            target_id: Some(&post.id),
            details: json!({
                "status": target.as_str(),
                "note": note,
                "via_token": matches!(admin, UgcAdmin::Token),
            }),
        },
    );
    tracing::info!(post = %post.id, status = %target, "Post moderated");

    Ok(Json(json!({ "ok": true, "post": post })))
}
