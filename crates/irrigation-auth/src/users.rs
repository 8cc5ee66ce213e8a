use std::collections::HashMap;

use irrigation_types::session::Role;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl UserRecord {
    pub fn new(username: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role,
        }
    }
}

/// The fixed user table the login flow compares credentials against. There
/// is no user-management UI (out of scope) — the table is built once at
/// startup from deployment configuration and never mutated at runtime.
pub struct UserTable {
    users: HashMap<String, UserRecord>,
}

impl UserTable {
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.username.clone(), u)).collect(),
        }
    }

    pub fn check_credentials(&self, username: &str, password: &str) -> Option<&UserRecord> {
        self.users
            .get(username)
            .filter(|user| user.password == password)
    }
}
