//! Database user model
//!
//! Conversion between resource attributes and the typed user spec.

use std::collections::{BTreeSet, HashMap};

use mongoform_core::resource::Value;
use serde::{Deserialize, Serialize};

use crate::admin::{NewUser, UserInfo};
use crate::error::{UserError, UserResult};
use crate::identifier::UserKey;

/// Maximum number of role grants on a single user
pub const MAX_ROLES: usize = 25;

pub const ATTR_AUTH_DATABASE: &str = "auth_database";
pub const ATTR_NAME: &str = "name";
pub const ATTR_PASSWORD: &str = "password";
pub const ATTR_AUTH_MECHANISMS: &str = "auth_mechanisms";
pub const ATTR_ROLE: &str = "role";

/// A role granted to a user, optionally qualified by the database it applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
    pub role: String,
}

impl RoleGrant {
    pub fn new(db: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            db: Some(db.into()),
            role: role.into(),
        }
    }

    fn from_value(index: usize, value: &Value) -> UserResult<Self> {
        let decoding_error = |reason: &str| UserError::RoleDecoding {
            index,
            reason: reason.to_string(),
        };

        let Value::Map(map) = value else {
            return Err(decoding_error("expected a block with 'role' and 'db'"));
        };
        let role = match map.get("role") {
            Some(Value::String(role)) => role.clone(),
            Some(_) => return Err(decoding_error("'role' must be a string")),
            None => return Err(decoding_error("'role' is required")),
        };
        // An empty db is what an unset optional field looks like in configuration
        let db = match map.get("db") {
            Some(Value::String(db)) if db.is_empty() => None,
            Some(Value::String(db)) => Some(db.clone()),
            Some(_) => return Err(decoding_error("'db' must be a string")),
            None => None,
        };
        Ok(Self { db, role })
    }

    fn to_value(&self) -> Value {
        let mut map = HashMap::new();
        map.insert("role".to_string(), Value::String(self.role.clone()));
        if let Some(db) = &self.db {
            map.insert("db".to_string(), Value::String(db.clone()));
        }
        Value::Map(map)
    }
}

/// Attributes the server never reports back, held locally between calls
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalValues {
    pub password: Option<String>,
    /// Empty when the configuration leaves the choice to the server
    pub auth_mechanisms: BTreeSet<String>,
}

impl LocalValues {
    pub fn from_spec(spec: &UserSpec) -> Self {
        Self {
            password: spec.password.clone(),
            auth_mechanisms: spec.auth_mechanisms.clone(),
        }
    }

    /// Pick the locally held values out of tracked attributes, ignoring
    /// anything malformed.
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Self {
        let password = attributes
            .get(ATTR_PASSWORD)
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let auth_mechanisms = match attributes.get(ATTR_AUTH_MECHANISMS) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => BTreeSet::new(),
        };
        Self {
            password,
            auth_mechanisms,
        }
    }
}

/// Desired (or observed) state of a database user
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserSpec {
    pub auth_database: String,
    pub name: String,
    /// Write-only; never read back from the server
    pub password: Option<String>,
    pub auth_mechanisms: BTreeSet<String>,
    /// Ordered, without duplicates
    pub roles: Vec<RoleGrant>,
}

impl UserSpec {
    /// Decode a spec from resource attributes.
    ///
    /// Everything that can be rejected locally is rejected here, before any
    /// remote call is made.
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> UserResult<Self> {
        let auth_database = required_string(attributes, ATTR_AUTH_DATABASE)?;
        let name = required_string(attributes, ATTR_NAME)?;

        let password = match attributes.get(ATTR_PASSWORD) {
            Some(Value::String(p)) if p.is_empty() => None,
            Some(Value::String(p)) => Some(p.clone()),
            Some(_) => {
                return Err(UserError::InvalidAttribute {
                    name: ATTR_PASSWORD,
                    expected: "a string",
                });
            }
            None => None,
        };

        let auth_mechanisms = match attributes.get(ATTR_AUTH_MECHANISMS) {
            Some(Value::List(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or(UserError::InvalidAttribute {
                            name: ATTR_AUTH_MECHANISMS,
                            expected: "a set of strings",
                        })
                })
                .collect::<UserResult<BTreeSet<_>>>()?,
            Some(_) => {
                return Err(UserError::InvalidAttribute {
                    name: ATTR_AUTH_MECHANISMS,
                    expected: "a set of strings",
                });
            }
            None => BTreeSet::new(),
        };

        let roles = match attributes.get(ATTR_ROLE) {
            Some(Value::List(items)) => decode_roles(items)?,
            Some(_) => {
                return Err(UserError::InvalidAttribute {
                    name: ATTR_ROLE,
                    expected: "a set of role blocks",
                });
            }
            None => Vec::new(),
        };

        Ok(Self {
            auth_database,
            name,
            password,
            auth_mechanisms,
            roles,
        })
    }

    /// Build the spec observed on the server for `key`
    ///
    /// The password cannot be read back and the server fills in default
    /// mechanisms the configuration never asked for, so both come from the
    /// locally held values.
    pub fn observed(key: &UserKey, info: UserInfo, local: LocalValues) -> Self {
        let mut roles = Vec::with_capacity(info.roles.len());
        for grant in info.roles {
            if !roles.contains(&grant) {
                roles.push(grant);
            }
        }
        Self {
            auth_database: key.database.clone(),
            name: info.name,
            password: local.password,
            auth_mechanisms: local.auth_mechanisms,
            roles,
        }
    }

    pub fn key(&self) -> UserKey {
        UserKey::new(self.auth_database.clone(), self.name.clone())
    }

    /// Arguments for the `createUser` command
    pub fn new_user(&self) -> NewUser {
        NewUser {
            name: self.name.clone(),
            password: self.password.clone(),
            roles: self.roles.clone(),
            mechanisms: self.auth_mechanisms.iter().cloned().collect(),
        }
    }

    pub fn to_attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        attributes.insert(
            ATTR_AUTH_DATABASE.to_string(),
            Value::String(self.auth_database.clone()),
        );
        attributes.insert(ATTR_NAME.to_string(), Value::String(self.name.clone()));
        if let Some(password) = &self.password {
            attributes.insert(ATTR_PASSWORD.to_string(), Value::String(password.clone()));
        }
        attributes.insert(
            ATTR_AUTH_MECHANISMS.to_string(),
            Value::List(
                self.auth_mechanisms
                    .iter()
                    .map(|m| Value::String(m.clone()))
                    .collect(),
            ),
        );
        attributes.insert(
            ATTR_ROLE.to_string(),
            Value::List(self.roles.iter().map(RoleGrant::to_value).collect()),
        );
        attributes
    }
}

fn required_string(attributes: &HashMap<String, Value>, name: &'static str) -> UserResult<String> {
    match attributes.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None => Err(UserError::MissingAttribute(name)),
        Some(_) => Err(UserError::InvalidAttribute {
            name,
            expected: "a string",
        }),
    }
}

// The limit applies to distinct grants; repeats collapse first.
fn decode_roles(items: &[Value]) -> UserResult<Vec<RoleGrant>> {
    let mut roles = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let grant = RoleGrant::from_value(index, item)?;
        if !roles.contains(&grant) {
            roles.push(grant);
        }
    }

    if roles.len() > MAX_ROLES {
        return Err(UserError::TooManyRoles {
            count: roles.len(),
            max: MAX_ROLES,
        });
    }
    Ok(roles)
}
