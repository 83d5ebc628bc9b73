use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::entitlement;
use crate::content::{Peptide, Section};
use crate::db::models::PeptideComment;
use crate::error::{AppError, AppResult};
use crate::extractors::{AppQuery, CurrentUser, MaybeUser};
use crate::routes::comments::query_comments;
use crate::routes::home::{not_found_page, Html};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct IndexQuery {
    pub category: Option<String>,
}

pub struct CategoryLink {
    pub name: String,
    pub active: bool,
}

#[derive(Template)]
#[template(path = "pages/peptides.html")]
pub struct PeptideIndexTemplate {
    pub signed_in: bool,
    pub category: String,
    pub categories: Vec<CategoryLink>,
    pub peptides: Vec<Peptide>,
}

#[derive(Template)]
#[template(path = "pages/peptide.html")]
pub struct PeptideTemplate {
    pub signed_in: bool,
    pub peptide: Peptide,
    /// Empty unless the viewer has paid access
    pub paid_sections: Vec<Section>,
    pub locked: bool,
    pub comments: Vec<PeptideComment>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/peptides", get(index))
        .route("/peptides/{slug}", get(detail))
        .route("/api/peptides/{slug}/paid", get(paid_sections))
}

async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    AppQuery(query): AppQuery<IndexQuery>,
) -> Response {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    let peptides: Vec<Peptide> = state
        .content
        .by_category(category.as_deref())
        .cloned()
        .collect();

    let category = category.unwrap_or_default();
    let categories = state
        .content
        .categories()
        .into_iter()
        .map(|name| CategoryLink {
            active: name.eq_ignore_ascii_case(&category),
            name,
        })
        .collect();

    Html(PeptideIndexTemplate {
        signed_in: maybe_user.0.is_some(),
        category,
        categories,
        peptides,
    })
    .into_response()
}

async fn detail(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    let Some(mut peptide) = state.content.get(&slug).cloned() else {
        return Ok(not_found_page(user.is_some(), format!("peptide \"{}\"", slug)));
    };

    let conn = state.db.get()?;
    let paid = match &user {
        Some(user) => entitlement::is_paid(&conn, &user.id, Utc::now())?,
        None => false,
    };
    let comments = query_comments(&conn, &peptide.slug)?;

    // Paid text never reaches the template for free viewers
    let has_paid = !peptide.paid_sections.is_empty();
    let paid_sections = std::mem::take(&mut peptide.paid_sections);
    let paid_sections = if paid { paid_sections } else { Vec::new() };

    Ok(Html(PeptideTemplate {
        signed_in: user.is_some(),
        locked: has_paid && !paid,
        paid_sections,
        comments,
        peptide,
    })
    .into_response())
}

/// Subscriber-only sections as JSON, for clients that render their own pages.
async fn paid_sections(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(slug): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let peptide = state.content.get(&slug).ok_or(AppError::NotFound)?;

    let conn = state.db.get()?;
    entitlement::require_paid(&conn, &user)?;

    Ok(Json(json!({
        "ok": true,
        "slug": peptide.slug,
        "sections": peptide.paid_sections,
    })))
}
