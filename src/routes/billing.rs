use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use crate::audit::{self, AuditEvent};
use crate::auth::entitlement::{self, EntitlementUpdate};
use crate::error::{AppError, AppResult};
use crate::extractors::{constant_time_eq, CurrentUser};
use crate::state::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/billing/webhook", post(webhook))
        .route("/api/billing/me", get(me))
}

fn check_secret(expected: Option<&str>, headers: &HeaderMap) -> AppResult<()> {
    // Without a configured secret the endpoint does not exist
    let expected = expected.filter(|s| !s.is_empty()).ok_or(AppError::NotFound)?;

    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        tracing::warn!("Rejected billing webhook with invalid secret");
        Err(AppError::Unauthorized)
    }
}

/// The body is parsed only after the secret checks out.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    check_secret(state.config.billing.webhook_secret.as_deref(), &headers)?;
    let update: EntitlementUpdate = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid entitlement payload: {}", e)))?;

    let plan = update.plan.trim();
    if plan.is_empty() {
        return Err(AppError::BadRequest("Plan is required".into()));
    }

    let paid = {
        let conn = state.db.get()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM profiles WHERE id = ?1",
            [&update.user_id],
            |r| r.get(0),
        )?;
        if !exists {
            return Err(AppError::NotFound);
        }
        entitlement::upsert(&conn, &update)?;
        entitlement::is_paid(&conn, &update.user_id, Utc::now())?
    };

    audit::record_best_effort(
        &state.db,
        &AuditEvent {
            actor_id: None,
            action: "billing.entitlement",
            target_type: "profile",
            target_id: Some(&update.user_id),
            details: json!({
                "status": update.status.as_str(),
                "plan": plan,
                "current_period_end": update.current_period_end,
            }),
        },
    );
    tracing::info!(user = %update.user_id, status = %update.status, "Entitlement updated");

    Ok(Json(json!({ "ok": true, "paid": paid })))
}

async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let current = entitlement::get(&conn, &user.id)?;
    let paid = entitlement::is_paid(&conn, &user.id, Utc::now())?;
    Ok(Json(json!({ "ok": true, "entitlement": current, "paid": paid })))
}
