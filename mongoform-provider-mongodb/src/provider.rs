//! MongoDB Provider implementation
//!
//! Dispatches lifecycle calls to the controller of the matching resource
//! type and converts errors for the host.

use mongoform_core::provider::{ProviderError, ProviderResult};
use mongoform_core::resource::{Resource, ResourceId, State};

use crate::admin::AdminConnection;
use crate::client::{ConnectionConfig, MongoAdminClient};
use crate::controller::DatabaseUserController;
use crate::error::UserError;
use crate::schemas::DATABASE_USER;
use crate::user::LocalValues;

impl From<UserError> for ProviderError {
    fn from(err: UserError) -> Self {
        let not_found = err.is_not_found();
        ProviderError::new(err.to_string())
            .with_not_found(not_found)
            .with_cause(err)
    }
}

/// MongoDB Provider
pub struct MongodbProvider<A = MongoAdminClient> {
    users: DatabaseUserController<A>,
}

impl MongodbProvider<MongoAdminClient> {
    /// Create a provider talking to the deployment described by `config`
    pub async fn connect(config: &ConnectionConfig) -> ProviderResult<Self> {
        let client = MongoAdminClient::connect(config).await.map_err(|e| {
            ProviderError::new(format!("Failed to configure MongoDB client: {}", e)).with_cause(e)
        })?;
        Ok(Self::with_admin(client))
    }
}

impl<A: AdminConnection> MongodbProvider<A> {
    pub fn with_admin(admin: A) -> Self {
        Self {
            users: DatabaseUserController::new(admin),
        }
    }

    pub fn users(&self) -> &DatabaseUserController<A> {
        &self.users
    }

    fn check_resource_type(id: &ResourceId) -> ProviderResult<()> {
        if id.resource_type == DATABASE_USER {
            Ok(())
        } else {
            Err(
                ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                    .for_resource(id.clone()),
            )
        }
    }

    /// Read a resource by its persisted identifier
    ///
    /// Without a prior state this is an import: nothing is held locally.
    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
        prior: Option<&State>,
    ) -> ProviderResult<State> {
        Self::check_resource_type(id)?;
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        let result = match prior {
            Some(prior) => {
                let local = LocalValues::from_attributes(&prior.attributes);
                self.users.read(id, identifier, local).await
            }
            None => self.users.import(id, identifier).await,
        };
        result.map_err(|e| ProviderError::from(e).for_resource(id.clone()))
    }

    /// Create a resource
    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        Self::check_resource_type(&resource.id)?;
        self.users
            .create(&resource.id, &resource.attributes)
            .await
            .map_err(|e| ProviderError::from(e).for_resource(resource.id.clone()))
    }

    /// Update a resource
    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        to: &Resource,
    ) -> ProviderResult<State> {
        Self::check_resource_type(id)?;
        self.users
            .update(id, identifier, &to.attributes)
            .await
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))
    }

    /// Delete a resource
    pub async fn delete_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        state: &State,
    ) -> ProviderResult<()> {
        Self::check_resource_type(id)?;
        self.users
            .delete(identifier, &state.attributes)
            .await
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))
    }
}
