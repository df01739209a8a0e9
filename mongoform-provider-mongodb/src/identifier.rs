//! Identifier codec
//!
//! A database user is tracked by an opaque identifier: the standard base64
//! encoding of `<database>.<name>`. Decoding splits on the first dot, so the
//! database part never contains a dot while the name may.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{UserError, UserResult};

/// Decoded form of an identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserKey {
    pub database: String,
    pub name: String,
}

impl UserKey {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
        }
    }

    pub fn encode(&self) -> String {
        encode(&self.database, &self.name)
    }
}

/// Build the identifier for a user in `database`
pub fn encode(database: &str, name: &str) -> String {
    STANDARD.encode(format!("{}.{}", database, name))
}

/// Recover the database and user name from an identifier
pub fn decode(id: &str) -> UserResult<UserKey> {
    let format_error = |reason: String| UserError::IdFormat {
        id: id.to_string(),
        reason,
    };

    let bytes = STANDARD.decode(id).map_err(|e| format_error(e.to_string()))?;
    let decoded = String::from_utf8(bytes).map_err(|e| format_error(e.to_string()))?;

    match decoded.split_once('.') {
        Some((database, name)) if !database.is_empty() && !name.is_empty() => {
            Ok(UserKey::new(database, name))
        }
        _ => Err(format_error("expected <database>.<name>".to_string())),
    }
}
