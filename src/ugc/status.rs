use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UgcStatus {
    Pending,
    Approved,
    Rejected,
    Archived,
    Trash,
}

/// Statuses a moderator may set. `Pending` is only ever the initial state.
pub const MODERATION_TARGETS: [UgcStatus; 4] = [
    UgcStatus::Approved,
    UgcStatus::Rejected,
    UgcStatus::Archived,
    UgcStatus::Trash,
];

impl UgcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UgcStatus::Pending => "pending",
            UgcStatus::Approved => "approved",
            UgcStatus::Rejected => "rejected",
            UgcStatus::Archived => "archived",
            UgcStatus::Trash => "trash",
        }
    }

    pub fn is_public(&self) -> bool {
        *self == UgcStatus::Approved
    }

    /// Parse a requested moderation target against the allow-list.
    pub fn moderation_target(raw: &str) -> Result<Self, AppError> {
        let status: UgcStatus = raw.parse()?;
        if MODERATION_TARGETS.contains(&status) {
            Ok(status)
        } else {
            Err(AppError::BadRequest(format!(
                "Status '{}' cannot be set by moderation",
                status
            )))
        }
    }
}

impl fmt::Display for UgcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UgcStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(UgcStatus::Pending),
            "approved" => Ok(UgcStatus::Approved),
            "rejected" => Ok(UgcStatus::Rejected),
            "archived" => Ok(UgcStatus::Archived),
            "trash" => Ok(UgcStatus::Trash),
            other => Err(AppError::BadRequest(format!("Unknown status: {}", other))),
        }
    }
}
