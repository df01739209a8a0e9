//! In-memory AdminConnection used by tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::admin::{AdminConnection, NewUser, UserInfo};
use crate::error::{AdminError, AdminResult};
use crate::user::RoleGrant;

/// A recorded administrative command
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCall {
    CreateUser { database: String, user: NewUser },
    DropUser { database: String, name: String },
    UsersInfo { database: String, name: String },
}

/// Users keyed by (database, name), plus a log of every command received
#[derive(Default)]
pub struct MockAdmin {
    users: Mutex<HashMap<(String, String), UserInfo>>,
    calls: Mutex<Vec<AdminCall>>,
    create_failure: Option<String>,
}

impl MockAdmin {
    pub fn with_user(self, database: &str, name: &str, roles: Vec<RoleGrant>) -> Self {
        self.users.lock().unwrap().insert(
            (database.to_string(), name.to_string()),
            UserInfo {
                name: name.to_string(),
                db: database.to_string(),
                roles,
                mechanisms: vec!["SCRAM-SHA-256".to_string()],
            },
        );
        self
    }

    /// Make every `createUser` fail with `message`
    pub fn with_create_failure(mut self, message: &str) -> Self {
        self.create_failure = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<AdminCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn has_user(&self, database: &str, name: &str) -> bool {
        self.users
            .lock()
            .unwrap()
            .contains_key(&(database.to_string(), name.to_string()))
    }

    fn record(&self, call: AdminCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AdminConnection for MockAdmin {
    async fn create_user(&self, database: &str, user: &NewUser) -> AdminResult<()> {
        self.record(AdminCall::CreateUser {
            database: database.to_string(),
            user: user.clone(),
        });
        if let Some(message) = &self.create_failure {
            return Err(AdminError::Command(message.clone()));
        }

        let mut users = self.users.lock().unwrap();
        let key = (database.to_string(), user.name.clone());
        if users.contains_key(&key) {
            return Err(AdminError::Command(format!(
                "User \"{}@{}\" already exists",
                user.name, database
            )));
        }

        // The server qualifies bare role names with the user's database
        let roles = user
            .roles
            .iter()
            .map(|grant| RoleGrant {
                db: Some(grant.db.clone().unwrap_or_else(|| database.to_string())),
                role: grant.role.clone(),
            })
            .collect();
        let mechanisms = if user.mechanisms.is_empty() {
            vec!["SCRAM-SHA-1".to_string(), "SCRAM-SHA-256".to_string()]
        } else {
            user.mechanisms.clone()
        };
        users.insert(
            key,
            UserInfo {
                name: user.name.clone(),
                db: database.to_string(),
                roles,
                mechanisms,
            },
        );
        Ok(())
    }

    async fn drop_user(&self, database: &str, name: &str) -> AdminResult<()> {
        self.record(AdminCall::DropUser {
            database: database.to_string(),
            name: name.to_string(),
        });
        match self
            .users
            .lock()
            .unwrap()
            .remove(&(database.to_string(), name.to_string()))
        {
            Some(_) => Ok(()),
            None => Err(AdminError::Command(format!(
                "User '{}@{}' not found",
                name, database
            ))),
        }
    }

    async fn users_info(&self, database: &str, name: &str) -> AdminResult<Vec<UserInfo>> {
        self.record(AdminCall::UsersInfo {
            database: database.to_string(),
            name: name.to_string(),
        });
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(&(database.to_string(), name.to_string()))
            .cloned()
            .into_iter()
            .collect())
    }
}
