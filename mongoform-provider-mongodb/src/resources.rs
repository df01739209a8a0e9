//! Resource type definitions for the MongoDB provider

use mongoform_core::provider::ResourceType;
use mongoform_core::schema::ResourceSchema;

use crate::schemas;

pub struct DatabaseUserType;

impl ResourceType for DatabaseUserType {
    fn name(&self) -> &'static str {
        schemas::DATABASE_USER
    }

    fn schema(&self) -> ResourceSchema {
        schemas::database_user()
    }
}

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(DatabaseUserType)]
}
