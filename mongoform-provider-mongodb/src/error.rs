//! Error types for the database user resource

use thiserror::Error;

/// Errors returned by an [`AdminConnection`](crate::admin::AdminConnection)
#[derive(Debug, Error)]
pub enum AdminError {
    /// The client could not be configured or could not reach the server
    #[error("connection error: {0}")]
    Connection(String),

    /// The server rejected the administrative command
    #[error("{0}")]
    Command(String),

    /// The server reply did not have the expected shape
    #[error("unexpected reply: {0}")]
    Decode(String),
}

/// Result type for administrative commands
pub type AdminResult<T> = Result<T, AdminError>;

/// Errors raised while reconciling a database user
#[derive(Debug, Error)]
pub enum UserError {
    /// The persisted identifier is not base64 or not `<database>.<name>`
    #[error("unexpected format of ID ({id}): {reason}")]
    IdFormat { id: String, reason: String },

    /// An administrative command was rejected
    #[error("{command} failed: {source}")]
    RemoteCommand {
        command: &'static str,
        #[source]
        source: AdminError,
    },

    /// A role entry could not be mapped to a role grant
    #[error("error decoding role at index {index}: {reason}")]
    RoleDecoding { index: usize, reason: String },

    /// The lookup returned no matching account
    #[error("user '{name}' does not exist in database '{database}'")]
    UserNotFound { database: String, name: String },

    #[error("required attribute '{0}' is missing")]
    MissingAttribute(&'static str),

    #[error("attribute '{name}' must be {expected}")]
    InvalidAttribute {
        name: &'static str,
        expected: &'static str,
    },

    #[error("{count} roles given, at most {max} allowed")]
    TooManyRoles { count: usize, max: usize },
}

impl UserError {
    pub(crate) fn remote(command: &'static str) -> impl FnOnce(AdminError) -> Self {
        move |source| Self::RemoteCommand { command, source }
    }

    /// Returns true if the account is gone on the remote side
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UserNotFound { .. })
    }
}

/// Result type for user lifecycle operations
pub type UserResult<T> = Result<T, UserError>;
