//! Resource schemas for the MongoDB provider

use mongoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::user::{
    ATTR_AUTH_DATABASE, ATTR_AUTH_MECHANISMS, ATTR_NAME, ATTR_PASSWORD, ATTR_ROLE, MAX_ROLES,
};

pub const DATABASE_USER: &str = "database_user";

/// Returns the schema for database_user
pub fn database_user() -> ResourceSchema {
    ResourceSchema::new(DATABASE_USER)
        .with_description("A user account scoped to an authentication database.")
        .attribute(
            AttributeSchema::new(ATTR_AUTH_DATABASE, types::non_empty_string())
                .required()
                .with_description("Database the account is created in."),
        )
        .attribute(
            AttributeSchema::new(ATTR_NAME, types::non_empty_string())
                .required()
                .with_description("Account user name."),
        )
        .attribute(
            AttributeSchema::new(ATTR_PASSWORD, AttributeType::String)
                .write_only()
                .with_description("Account password. Never read back from the server."),
        )
        .attribute(
            AttributeSchema::new(
                ATTR_AUTH_MECHANISMS,
                AttributeType::Set(Box::new(AttributeType::String)),
            )
            .with_description("Authentication mechanisms (e.g. SCRAM-SHA-256)."),
        )
        .attribute(
            AttributeSchema::new(ATTR_ROLE, AttributeType::Set(Box::new(role_grant_type())))
                .with_max_items(MAX_ROLES)
                .with_description("Roles granted to the account."),
        )
}

fn role_grant_type() -> AttributeType {
    AttributeType::Struct {
        name: "RoleGrant".to_string(),
        fields: vec![
            AttributeSchema::new("db", AttributeType::String)
                .with_description("Database the role applies to."),
            AttributeSchema::new("role", AttributeType::String)
                .required()
                .with_description("Role name."),
        ],
    }
}
