//! Mongoform MongoDB Provider
//!
//! Manages MongoDB database users declaratively.
//!
//! ## Module Structure
//!
//! - `admin` - AdminConnection trait and command payloads
//! - `client` - AdminConnection backed by the MongoDB driver
//! - `controller` - Create/read/update/delete of a database user
//! - `identifier` - Encoding of the persisted identifier
//! - `provider` - MongodbProvider implementation
//! - `resources` / `schemas` - Resource types and their attribute schemas
//! - `user` - Typed user spec and attribute conversion

pub mod admin;
pub mod client;
pub mod controller;
pub mod error;
pub mod identifier;
pub mod provider;
pub mod resources;
pub mod schemas;
pub mod user;

#[cfg(test)]
mod mock;

// Re-export main types
pub use admin::{AdminConnection, NewUser, UserInfo};
pub use client::{ConnectionConfig, MongoAdminClient};
pub use controller::DatabaseUserController;
pub use error::{AdminError, UserError};
pub use provider::MongodbProvider;
pub use user::{LocalValues, RoleGrant, UserSpec};

use mongoform_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use mongoform_core::resource::{Resource, ResourceId, State};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl<A: AdminConnection> Provider for MongodbProvider<A> {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
        prior: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        let prior = prior.cloned();
        Box::pin(async move {
            self.read_resource(&id, identifier.as_deref(), prior.as_ref())
                .await
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        _from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &to).await })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        state: &State,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let state = state.clone();
        Box::pin(async move { self.delete_resource(&id, &identifier, &state).await })
    }
}
