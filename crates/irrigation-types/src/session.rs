use serde::{Deserialize, Serialize};

/// Role hierarchy enforced by `require_role`. Derived `Ord` gives
/// `None < Viewer < Manager < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    None,
    Viewer,
    Manager,
    Owner,
}

/// Length, in hex characters, of a session token.
pub const SESSION_TOKEN_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub role: Role,
    pub created_us: u64,
    pub last_activity_us: u64,
    pub request_count: u64,
    pub active: bool,
}

impl Session {
    pub fn new(token: String, username: String, role: Role, now_us: u64) -> Self {
        Self {
            token,
            username,
            role,
            created_us: now_us,
            last_activity_us: now_us,
            request_count: 0,
            active: true,
        }
    }
}
