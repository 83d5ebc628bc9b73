use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{entitlement, password, roles, session};
use crate::db::models::Profile;
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, CurrentUser};
use crate::state::AppState;

const MAX_EMAIL_LEN: usize = 254;
const MAX_DISPLAY_NAME_LEN: usize = 60;

// -- Request types --

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = email.len() <= MAX_EMAIL_LEN
        && email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
    if !valid {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    Ok(email)
}

fn with_session_cookie(state: &AppState, status: StatusCode, token: &str, body: serde_json::Value) -> Response {
    let cookie = session::session_cookie(
        &state.config.auth.cookie_name,
        token,
        state.config.auth.session_hours,
    );
    (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

/// POST /api/auth/signup: create a profile and sign it in
pub async fn signup(
    State(state): State<AppState>,
    AppJson(req): AppJson<SignupRequest>,
) -> AppResult<Response> {
    let email = normalize_email(&req.email)?;
    password::validate(&req.password)?;

    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if display_name
        .as_ref()
        .is_some_and(|n| n.chars().count() > MAX_DISPLAY_NAME_LEN)
    {
        return Err(AppError::BadRequest(format!(
            "Display name must be {} characters or less",
            MAX_DISPLAY_NAME_LEN
        )));
    }

    let password_hash = password::hash(&req.password)?;
    let user_id = uuid::Uuid::now_v7().to_string();

    let conn = state.db.get()?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO profiles (id, email, display_name, password_hash) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, email, display_name, password_hash],
    )?;
    if inserted == 0 {
        return Err(AppError::BadRequest("An account with this email already exists".into()));
    }

    let token = session::create_session(&conn, &user_id, state.config.auth.session_hours)?;
    tracing::info!(user_id = %user_id, "New account created");

    Ok(with_session_cookie(
        &state,
        StatusCode::CREATED,
        &token,
        json!({ "ok": true, "user_id": user_id }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_ascii_lowercase();
    let conn = state.db.get()?;

    let found: Option<(String, String)> = match conn.query_row(
        "SELECT id, password_hash FROM profiles WHERE email = ?1",
        params![email],
        |row| Ok((row.get(0)?, row.get(1)?)),
    ) {
        Ok(row) => Some(row),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };

    let user_id = match found {
        Some((id, hash)) if password::verify(&req.password, &hash) => id,
        _ => {
            tracing::warn!("Failed login attempt");
            return Err(AppError::Unauthorized);
        }
    };

    let pruned = session::prune_expired(&conn)?;
    if pruned > 0 {
        tracing::debug!(pruned, "Removed expired sessions");
    }
    let token = session::create_session(&conn, &user_id, state.config.auth.session_hours)?;

    Ok(with_session_cookie(
        &state,
        StatusCode::OK,
        &token,
        json!({ "ok": true, "user_id": user_id }),
    ))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = session::cookie_value(&headers, cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session::clear_session_cookie(cookie_name))],
        Json(json!({ "ok": true })),
    )
        .into_response())
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let profile = conn.query_row(
        &format!("SELECT {} FROM profiles WHERE id = ?1", Profile::COLUMNS),
        params![user.id],
        Profile::from_row,
    )?;
    let grants: Vec<String> = roles::list_for_user(&conn, &user.id)?
        .into_iter()
        .map(|g| g.role)
        .collect();
    let paid = entitlement::is_paid(&conn, &user.id, Utc::now())?;

    Ok(Json(json!({
        "ok": true,
        "user": {
            "id": profile.id,
            "email": profile.email,
            "display_name": profile.display_name,
            "is_admin": profile.is_admin,
            "is_pro": profile.is_pro,
        },
        "roles": grants,
        "paid": paid,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(
            normalize_email("  Reader@Example.COM ").unwrap(),
            "reader@example.com"
        );
    }

    #[test]
    fn normalize_email_rejects_malformed() {
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("user@localhost").is_err());
        assert!(normalize_email(&format!("{}@example.com", "a".repeat(250))).is_err());
    }
}
