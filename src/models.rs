use serde::{Deserialize, Serialize};

use crate::permissions::PermissionGrant;

/// What an operator types into the login form. Embedded in the session cookie
/// and rebuilt on every protected request; never written anywhere durable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCredentials {
    pub server_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ConnectionCredentials {
    /// Builds credentials from login form input. Empty strings count as absent.
    pub fn new(
        server_uri: impl Into<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        Self {
            server_uri: server_uri.into(),
            username: non_empty(username),
            password: non_empty(password),
        }
    }

    pub fn anonymous(server_uri: impl Into<String>) -> Self {
        Self::new(server_uri, None, None)
    }

    /// Structural check: a scheme-qualified server URI, and username/password
    /// either both present or both absent.
    pub fn validate(&self) -> Result<(), String> {
        if self.server_uri.trim().is_empty() {
            return Err("Server URI is required".to_string());
        }
        if !self.server_uri.contains("://") {
            return Err("Server URI must include a scheme, e.g. mongodb://host:27017".to_string());
        }
        if self.username.is_some() != self.password.is_some() {
            return Err("Username and password must be provided together".to_string());
        }
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// `(permissionSetName, database)` pair as the server spells it: `{ role, db }`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PermissionSetRef {
    pub role: String,
    #[serde(default)]
    pub db: String,
}

impl PermissionSetRef {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: db.into(),
        }
    }
}

/// An account as reported by `usersInfo`. Only lives for one response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    #[serde(rename = "user")]
    pub name: String,
    #[serde(rename = "db")]
    pub home_database: String,
    #[serde(rename = "roles", default)]
    pub granted_permission_sets: Vec<PermissionSetRef>,
}

/// A permission-set definition assembled for `createRole`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSet {
    pub name: String,
    pub home_database: String,
    pub builtin: bool,
    pub inherited_sets: Vec<PermissionSetRef>,
    pub grants: Vec<PermissionGrant>,
}
