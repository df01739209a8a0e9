//! AdminConnection - administrative surface of the target deployment
//!
//! The controller only ever needs three user management commands, each
//! scoped to a database. Keeping them behind a trait lets tests swap the
//! driver for an in-memory double.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AdminResult;
use crate::user::RoleGrant;

/// Arguments of a `createUser` command
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    /// Omitted from the command when `None` (e.g. x.509 users in `$external`)
    pub password: Option<String>,
    pub roles: Vec<RoleGrant>,
    /// Omitted from the command when empty, letting the server pick defaults
    pub mechanisms: Vec<String>,
}

/// One entry of a `usersInfo` reply
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserInfo {
    #[serde(rename = "user")]
    pub name: String,
    pub db: String,
    #[serde(default)]
    pub roles: Vec<RoleGrant>,
    #[serde(default)]
    pub mechanisms: Vec<String>,
}

/// User management commands against the target deployment
#[async_trait]
pub trait AdminConnection: Send + Sync {
    /// Create `user` in `database`
    async fn create_user(&self, database: &str, user: &NewUser) -> AdminResult<()>;

    /// Drop the user `name` from `database`
    async fn drop_user(&self, database: &str, name: &str) -> AdminResult<()>;

    /// Look up the user `name` in `database`
    ///
    /// Zero or one entries are expected.
    async fn users_info(&self, database: &str, name: &str) -> AdminResult<Vec<UserInfo>>;
}
