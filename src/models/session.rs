use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, Result};

/// The kind of account a session authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    Patient,
}

impl Role {
    /// The value stored in the `users.user_type` column.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Role::Doctor => "Doctor",
            Role::Patient => "Patient",
        }
    }

    pub fn from_db_str(value: &str) -> Result<Self> {
        match value {
            "Doctor" => Ok(Role::Doctor),
            "Patient" => Ok(Role::Patient),
            other => Err(AppError::MissingData(format!("unknown user_type {}", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Doctor => f.write_str("doctor"),
            Role::Patient => f.write_str("patient"),
        }
    }
}

/// Represents one authenticated login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// The ID of the user this session belongs to.
    pub user_id: i64,
    pub role: Role,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful validation.
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: i64, role: Role, display_name: String, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            role,
            display_name,
            created_at: now,
            last_activity: now,
        }
    }

    /// Expired once `now - last_activity` reaches the inactivity window.
    pub fn is_expired(&self, now: DateTime<Utc>, inactivity_window: TimeDelta) -> bool {
        now - self.last_activity >= inactivity_window
    }
}
