use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

use crate::auth::roles::{self, Role};
use crate::auth::session;
use crate::db::models::Profile;
use crate::error::AppError;
use crate::state::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// JSON body whose rejections render as the `{ok:false,error}` envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Query string whose rejections render as the `{ok:false,error}` envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub is_pro: bool,
}

impl CurrentUser {
    /// Name shown next to public content.
    pub fn public_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.email.split('@').next().unwrap_or("member").to_string())
    }
}

impl From<Profile> for CurrentUser {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            display_name: p.display_name,
            is_admin: p.is_admin,
            is_pro: p.is_pro,
        }
    }
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session::cookie_value(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        let conn = state.db.get()?;
        session::lookup(&conn, token)?
            .map(CurrentUser::from)
            .ok_or(AppError::Unauthorized)
    }
}

/// Optional user extractor; None instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// Site administrator: profile flag or the `admin` role.
pub struct AdminUser(pub CurrentUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if user.is_admin {
            return Ok(AdminUser(user));
        }

        let conn = state.db.get()?;
        if roles::has_any_role(&conn, &user.id, &[Role::Admin])? {
            Ok(AdminUser(user))
        } else {
            Err(AppError::Forbidden("Admin access required".into()))
        }
    }
}

/// Who is allowed to act on the moderation queue.
#[derive(Debug, Clone)]
pub enum UgcAdmin {
    /// Automation holding the static admin token
    Token,
    User(CurrentUser),
}

impl UgcAdmin {
    pub const ROLES: [Role; 3] = [Role::Admin, Role::Moderator, Role::UgcAdmin];

    /// Actor id recorded in the audit log and on moderated posts.
    pub fn actor_id(&self) -> Option<&str> {
        match self {
            UgcAdmin::Token => None,
            UgcAdmin::User(u) => Some(u.id.as_str()),
        }
    }

    /// Token first, then session. `Ok(None)` means a signed-in user without access.
    async fn resolve(parts: &mut Parts, state: &AppState) -> Result<Option<Self>, AppError> {
        if let Some(expected) = state.config.admin.token.as_deref() {
            let presented = parts
                .headers
                .get(ADMIN_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok());
            if let Some(presented) = presented {
                if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
                    return Ok(Some(UgcAdmin::Token));
                }
                tracing::warn!("Rejected invalid admin token");
                return Err(AppError::Unauthorized);
            }
        }

        let user = CurrentUser::from_request_parts(parts, state).await?;
        if user.is_admin {
            return Ok(Some(UgcAdmin::User(user)));
        }

        let conn = state.db.get()?;
        if roles::has_any_role(&conn, &user.id, &Self::ROLES)? {
            Ok(Some(UgcAdmin::User(user)))
        } else {
            Ok(None)
        }
    }
}

impl FromRequestParts<AppState> for UgcAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        UgcAdmin::resolve(parts, state)
            .await?
            .ok_or_else(|| AppError::Forbidden("Moderator access required".into()))
    }
}

/// Non-rejecting variant for routes that widen their output for moderators.
pub struct MaybeUgcAdmin(pub Option<UgcAdmin>);

impl FromRequestParts<AppState> for MaybeUgcAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match UgcAdmin::resolve(parts, state).await {
            Ok(admin) => Ok(MaybeUgcAdmin(admin)),
            Err(AppError::Unauthorized) => Ok(MaybeUgcAdmin(None)),
            Err(e) => Err(e),
        }
    }
}

/// Compare without short-circuiting on the first differing byte.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let max_len = a.len().max(b.len());
    let mut diff = (a.len() != b.len()) as u8;
    for i in 0..max_len {
        let byte_a = a.get(i).copied().unwrap_or(0);
        let byte_b = b.get(i).copied().unwrap_or(0);
        diff |= byte_a ^ byte_b;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_only_identical_input() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret-longer"));
        assert!(!constant_time_eq(b"", b"x"));
    }

    #[test]
    fn public_name_falls_back_to_email_local_part() {
        let user = CurrentUser {
            id: "u1".into(),
            email: "reader@example.com".into(),
            display_name: None,
            is_admin: false,
            is_pro: false,
        };
        assert_eq!(user.public_name(), "reader");
    }
}
