// Role grants: flat membership in user_roles, no hierarchy
use std::fmt;
use std::str::FromStr;

use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use crate::db::models::RoleGrant;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Moderator,
    UgcAdmin,
    Billing,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Moderator, Role::UgcAdmin, Role::Billing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::UgcAdmin => "ugc_admin",
            Role::Billing => "billing",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown role: {}", s)))
    }
}

/// True when the user holds at least one of `roles`.
pub fn has_any_role(
    conn: &Connection,
    user_id: &str,
    roles: &[Role],
) -> Result<bool, rusqlite::Error> {
    if roles.is_empty() {
        return Ok(false);
    }

    let placeholders = (0..roles.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT COUNT(*) > 0 FROM user_roles WHERE user_id = ?1 AND role IN ({})",
        placeholders
    );

    let values = std::iter::once(user_id.to_string()).chain(roles.iter().map(|r| r.to_string()));
    conn.query_row(&sql, params_from_iter(values), |row| row.get(0))
}

/// Idempotent: granting a held role is a no-op.
pub fn grant(
    conn: &Connection,
    user_id: &str,
    role: Role,
    granted_by: Option<&str>,
) -> Result<bool, rusqlite::Error> {
    let rows = conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role, granted_by) VALUES (?1, ?2, ?3)",
        params![user_id, role.as_str(), granted_by],
    )?;
    Ok(rows > 0)
}

pub fn revoke(conn: &Connection, user_id: &str, role: Role) -> Result<bool, rusqlite::Error> {
    let rows = conn.execute(
        "DELETE FROM user_roles WHERE user_id = ?1 AND role = ?2",
        params![user_id, role.as_str()],
    )?;
    Ok(rows > 0)
}

pub fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<RoleGrant>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT user_id, role, granted_by, created_at FROM user_roles \
         WHERE user_id = ?1 ORDER BY role",
    )?;

    let grants = stmt
        .query_map(params![user_id], |row| {
            Ok(RoleGrant {
                user_id: row.get(0)?,
                role: row.get(1)?,
                granted_by: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(grants)
}
