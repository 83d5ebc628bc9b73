// Billing entitlements: a passive snapshot written by the billing webhook.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    Unpaid,
}

impl EntitlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementStatus::Active => "active",
            EntitlementStatus::Trialing => "trialing",
            EntitlementStatus::PastDue => "past_due",
            EntitlementStatus::Canceled => "canceled",
            EntitlementStatus::Incomplete => "incomplete",
            EntitlementStatus::Unpaid => "unpaid",
        }
    }

    pub fn grants_access(&self) -> bool {
        matches!(self, EntitlementStatus::Active | EntitlementStatus::Trialing)
    }
}

impl fmt::Display for EntitlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntitlementStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(EntitlementStatus::Active),
            "trialing" => Ok(EntitlementStatus::Trialing),
            "past_due" => Ok(EntitlementStatus::PastDue),
            // Both spellings show up in billing payloads
            "canceled" | "cancelled" => Ok(EntitlementStatus::Canceled),
            "incomplete" => Ok(EntitlementStatus::Incomplete),
            "unpaid" => Ok(EntitlementStatus::Unpaid),
            other => Err(AppError::BadRequest(format!(
                "Unknown entitlement status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    pub user_id: String,
    pub status: String,
    pub plan: String,
    pub current_period_end: Option<String>,
    pub customer_ref: Option<String>,
    pub updated_at: String,
}

impl Entitlement {
    /// Whether this snapshot grants paid access at `now`.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        let status_ok = self
            .status
            .parse::<EntitlementStatus>()
            .map(|s| s.grants_access())
            .unwrap_or(false);
        if !status_ok {
            return false;
        }

        match &self.current_period_end {
            None => true,
            // An unparseable period end is treated as lapsed
            Some(end) => DateTime::parse_from_rfc3339(end)
                .map(|end| end.with_timezone(&Utc) > now)
                .unwrap_or(false),
        }
    }
}

/// Payload accepted from the billing webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementUpdate {
    pub user_id: String,
    pub status: EntitlementStatus,
    pub plan: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub customer_ref: Option<String>,
}

pub fn get(conn: &Connection, user_id: &str) -> Result<Option<Entitlement>, rusqlite::Error> {
    let result = conn.query_row(
        "SELECT user_id, status, plan, current_period_end, customer_ref, updated_at \
         FROM billing_entitlements WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(Entitlement {
                user_id: row.get(0)?,
                status: row.get(1)?,
                plan: row.get(2)?,
                current_period_end: row.get(3)?,
                customer_ref: row.get(4)?,
                updated_at: row.get(5)?,
            })
        },
    );

    match result {
        Ok(e) => Ok(Some(e)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn upsert(conn: &Connection, update: &EntitlementUpdate) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO billing_entitlements (user_id, status, plan, current_period_end, customer_ref, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
         ON CONFLICT(user_id) DO UPDATE SET
           status = excluded.status,
           plan = excluded.plan,
           current_period_end = excluded.current_period_end,
           customer_ref = COALESCE(excluded.customer_ref, billing_entitlements.customer_ref),
           updated_at = excluded.updated_at",
        params![
            update.user_id,
            update.status.as_str(),
            update.plan,
            update.current_period_end.map(|t| t.to_rfc3339()),
            update.customer_ref,
        ],
    )?;
    Ok(())
}

/// Profile flags win; otherwise fall back to the cached entitlement.
pub fn is_paid(conn: &Connection, user_id: &str, now: DateTime<Utc>) -> AppResult<bool> {
    let flags: Option<(bool, bool)> = match conn.query_row(
        "SELECT is_pro, is_admin FROM profiles WHERE id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    ) {
        Ok(flags) => Some(flags),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };

    match flags {
        None => Ok(false),
        Some((true, _)) | Some((_, true)) => Ok(true),
        Some(_) => Ok(get(conn, user_id)?
            .map(|e| e.is_current(now))
            .unwrap_or(false)),
    }
}

pub fn require_paid(conn: &Connection, user: &CurrentUser) -> AppResult<()> {
    if is_paid(conn, &user.id, Utc::now())? {
        Ok(())
    } else {
        Err(AppError::Forbidden("Subscription required".into()))
    }
}
