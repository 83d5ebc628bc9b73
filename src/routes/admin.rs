use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::Deserialize;
use serde_json::json;

use crate::audit::{self, AuditEvent, Cursor};
use crate::auth::roles::{self, Role};
use crate::db::models::{Profile, Sponsor};
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminUser, AppJson, AppQuery};
use crate::state::AppState;

// --- Requests ---

#[derive(Deserialize)]
pub struct FlagsQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct UpdateFlagsRequest {
    pub user_id: String,
    pub is_admin: Option<bool>,
    pub is_pro: Option<bool>,
}

#[derive(Deserialize)]
pub struct RolesQuery {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct RoleChangeRequest {
    pub user_id: String,
    pub role: String,
    pub action: String,
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateSponsorRequest {
    pub name: String,
    pub url: String,
    pub tier: Option<String>,
    pub active: Option<bool>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/flags", get(list_flags).post(update_flags))
        .route("/api/admin/roles", get(list_roles).post(change_role))
        .route("/api/admin/audit", get(list_audit))
        .route("/api/admin/sponsors", get(list_sponsors).post(create_sponsor))
}

// --- Handlers ---

async fn list_flags(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<FlagsQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let limit = audit::clamp_limit(query.limit);
    let pattern = format!("%{}%", escape_like(query.q.as_deref().unwrap_or("").trim()));

    let conn = state.db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM profiles WHERE email LIKE ?1 ESCAPE '\\' ORDER BY created_at DESC, id DESC LIMIT ?2",
        Profile::COLUMNS
    ))?;
    let profiles = stmt
        .query_map(params![pattern, limit], Profile::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(json!({ "ok": true, "items": profiles })))
}

/// Make `%`, `_` and `\` match literally under `ESCAPE '\'`.
fn escape_like(q: &str) -> String {
    let mut out = String::with_capacity(q.len());
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

async fn update_flags(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(req): AppJson<UpdateFlagsRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if req.is_admin.is_none() && req.is_pro.is_none() {
        return Err(AppError::BadRequest("No flags to update".into()));
    }

    let profile = {
        let conn = state.db.get()?;
        let rows = conn.execute(
            "UPDATE profiles SET
               is_admin = COALESCE(?2, is_admin),
               is_pro = COALESCE(?3, is_pro)
             WHERE id = ?1",
            params![req.user_id, req.is_admin, req.is_pro],
        )?;
        if rows == 0 {
            return Err(AppError::NotFound);
        }
        load_profile(&conn, &req.user_id)?
    };

    audit::record_best_effort(
        &state.db,
        &AuditEvent {
            actor_id: Some(&admin.id),
            action: "flags.update",
            target_type: "profile",
            target_id: Some(&req.user_id),
            details: json!({ "is_admin": req.is_admin, "is_pro": req.is_pro }),
        },
    );
    tracing::info!(admin = %admin.id, target = %req.user_id, "Profile flags updated");

    Ok(Json(json!({ "ok": true, "profile": profile })))
}

async fn list_roles(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<RolesQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let grants = roles::list_for_user(&conn, &query.user_id)?;
    Ok(Json(json!({ "ok": true, "items": grants })))
}

async fn change_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(req): AppJson<RoleChangeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let role: Role = req.role.parse()?;
    let granting = match req.action.trim().to_ascii_lowercase().as_str() {
        "grant" => true,
        "revoke" => false,
        other => return Err(AppError::BadRequest(format!("Unknown action: {}", other))),
    };

    let changed = {
        let conn = state.db.get()?;
        load_profile(&conn, &req.user_id)?;
        if granting {
            roles::grant(&conn, &req.user_id, role, Some(&admin.id))?
        } else {
            roles::revoke(&conn, &req.user_id, role)?
        }
    };

    let action = if granting { "roles.grant" } else { "roles.revoke" };
    audit::record_best_effort(
        &state.db,
        &AuditEvent {
            actor_id: Some(&admin.id),
            action,
            target_type: "profile",
            target_id: Some(&req.user_id),
            details: json!({ "role": role.as_str(), "changed": changed }),
        },
    );

    Ok(Json(json!({ "ok": true, "changed": changed, "role": role })))
}

async fn list_audit(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<AuditQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let cursor = query
        .cursor
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(Cursor::parse)
        .transpose()?;
    let limit = audit::clamp_limit(query.limit);

    let conn = state.db.get()?;
    let page = audit::list(&conn, cursor.as_ref(), limit)?;

    Ok(Json(json!({
        "ok": true,
        "items": page.items,
        "next_cursor": page.next_cursor,
    })))
}

async fn list_sponsors(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sponsors ORDER BY created_at DESC, id DESC",
        Sponsor::COLUMNS
    ))?;
    let sponsors = stmt
        .query_map([], Sponsor::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(json!({ "ok": true, "items": sponsors })))
}

async fn create_sponsor(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(req): AppJson<CreateSponsorRequest>,
) -> AppResult<Response> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > 120 {
        return Err(AppError::BadRequest("Sponsor name must be 1-120 characters".into()));
    }
    let url = req.url.trim().to_string();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(AppError::BadRequest("Sponsor url must be http(s)".into()));
    }
    let tier = req
        .tier
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("standard")
        .to_string();
    let active = req.active.unwrap_or(true);

    let id = uuid::Uuid::now_v7().to_string();
    let sponsor = {
        let conn = state.db.get()?;
        conn.execute(
            "INSERT INTO sponsors (id, name, url, tier, active) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, name, url, tier, active],
        )?;
        conn.query_row(
            &format!("SELECT {} FROM sponsors WHERE id = ?1", Sponsor::COLUMNS),
            params![id],
            Sponsor::from_row,
        )?
    };

    audit::record_best_effort(
        &state.db,
        &AuditEvent {
            actor_id: Some(&admin.id),
            action: "sponsors.create",
            target_type: "sponsor",
            target_id: Some(&id),
            details: json!({ "name": sponsor.name, "tier": sponsor.tier }),
        },
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "sponsor": sponsor })),
    )
        .into_response())
}

fn load_profile(conn: &Connection, user_id: &str) -> AppResult<Profile> {
    conn.query_row(
        &format!("SELECT {} FROM profiles WHERE id = ?1", Profile::COLUMNS),
        params![user_id],
        Profile::from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound,
        other => other.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_quotes_wildcards() {
        assert_eq!(escape_like("plain@example.com"), "plain@example.com");
        assert_eq!(escape_like("100%_off\\"), "100\\%\\_off\\\\");
    }
}
