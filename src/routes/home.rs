use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::models::Sponsor;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::routes::public::active_sponsors;
use crate::state::AppState;
use crate::ugc::{UgcPost, UgcRepository, UgcStatus};

const RECENT_POSTS: u32 = 5;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub signed_in: bool,
    pub peptide_count: usize,
    pub categories: Vec<String>,
    pub sponsors: Vec<Sponsor>,
    pub recent_posts: Vec<UgcPost>,
}

#[derive(Template)]
#[template(path = "pages/not_found.html")]
pub struct NotFoundTemplate {
    pub signed_in: bool,
    pub what: String,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub fn not_found_page(signed_in: bool, what: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(NotFoundTemplate {
            signed_in,
            what: what.into(),
        }),
    )
        .into_response()
}

pub async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
) -> AppResult<Response> {
    let sponsors = {
        let conn = state.db.get()?;
        active_sponsors(&conn)?
    };

    // The community database is optional for the landing page
    let recent_posts = match state.ugc.repository().await {
        Ok(repo) => repo
            .list_by_status(UgcStatus::Approved, RECENT_POSTS)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Could not load recent posts: {}", e);
                Vec::new()
            }),
        Err(e) => {
            tracing::warn!("Could not open UGC store: {}", e);
            Vec::new()
        }
    };

    Ok(Html(HomeTemplate {
        signed_in: maybe_user.0.is_some(),
        peptide_count: state.content.len(),
        categories: state.content.categories(),
        sponsors,
        recent_posts,
    })
    .into_response())
}
