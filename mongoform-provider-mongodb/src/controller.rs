//! DatabaseUserController - lifecycle of a single database user
//!
//! Create, read, update and delete map onto `createUser`, `usersInfo` and
//! `dropUser`. Updates are performed as drop then create, which is not
//! atomic: if the create fails the old account is already gone.

use std::collections::HashMap;

use log::{debug, info, warn};
use mongoform_core::resource::{ResourceId, State, Value};

use crate::admin::AdminConnection;
use crate::error::{UserError, UserResult};
use crate::identifier::{self, UserKey};
use crate::user::{ATTR_AUTH_DATABASE, LocalValues, UserSpec};

/// Reconciles declared users against the deployment behind `A`
pub struct DatabaseUserController<A> {
    admin: A,
}

impl<A: AdminConnection> DatabaseUserController<A> {
    pub fn new(admin: A) -> Self {
        Self { admin }
    }

    pub fn admin(&self) -> &A {
        &self.admin
    }

    /// Create the user and return its observed state
    ///
    /// The returned state carries the identifier the host must persist.
    pub async fn create(
        &self,
        id: &ResourceId,
        attributes: &HashMap<String, Value>,
    ) -> UserResult<State> {
        let spec = UserSpec::from_attributes(attributes)?;
        self.create_user(&spec).await?;

        let identifier = spec.key().encode();
        info!(
            "created user {} in database {}",
            spec.name, spec.auth_database
        );
        self.read(id, &identifier, LocalValues::from_spec(&spec))
            .await
    }

    /// Read the user tracked by `identifier`
    ///
    /// `local` holds what the server cannot report faithfully (the password
    /// and the configured mechanisms); it is echoed into the returned state.
    pub async fn read(
        &self,
        id: &ResourceId,
        identifier: &str,
        local: LocalValues,
    ) -> UserResult<State> {
        let key = identifier::decode(identifier)?;
        debug!("reading user {} in database {}", key.name, key.database);

        let users = self
            .admin
            .users_info(&key.database, &key.name)
            .await
            .map_err(UserError::remote("usersInfo"))?;
        let Some(info) = users.into_iter().next() else {
            return Err(UserError::UserNotFound {
                database: key.database,
                name: key.name,
            });
        };

        let spec = UserSpec::observed(&key, info, local);
        Ok(State::existing(id.clone(), spec.to_attributes()).with_identifier(identifier))
    }

    /// Attach an existing user from its identifier alone
    pub async fn import(&self, id: &ResourceId, identifier: &str) -> UserResult<State> {
        self.read(id, identifier, LocalValues::default()).await
    }

    /// Replace the user tracked by `identifier` with the desired one
    ///
    /// The identifier changes when the name or database changes.
    pub async fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        attributes: &HashMap<String, Value>,
    ) -> UserResult<State> {
        let current = identifier::decode(identifier)?;
        let spec = UserSpec::from_attributes(attributes)?;

        self.drop_user(&current.database, &current.name).await?;
        if let Err(e) = self.create_user(&spec).await {
            warn!(
                "user {} was dropped from database {} but could not be recreated: {}",
                current.name, current.database, e
            );
            return Err(e);
        }

        let new_identifier = spec.key().encode();
        info!(
            "replaced user {}.{} with {}.{}",
            current.database, current.name, spec.auth_database, spec.name
        );
        self.read(id, &new_identifier, LocalValues::from_spec(&spec))
            .await
    }

    /// Drop the user tracked by `identifier`
    ///
    /// The user name comes from the identifier, while the database comes from
    /// the tracked `auth_database` attribute.
    pub async fn delete(
        &self,
        identifier: &str,
        tracked: &HashMap<String, Value>,
    ) -> UserResult<()> {
        let UserKey { name, .. } = identifier::decode(identifier)?;
        let database = tracked
            .get(ATTR_AUTH_DATABASE)
            .and_then(Value::as_str)
            .ok_or(UserError::MissingAttribute(ATTR_AUTH_DATABASE))?;

        self.drop_user(database, &name).await?;
        info!("dropped user {} from database {}", name, database);
        Ok(())
    }

    async fn create_user(&self, spec: &UserSpec) -> UserResult<()> {
        debug!(
            "creating user {} in database {} with {} roles",
            spec.name,
            spec.auth_database,
            spec.roles.len()
        );
        self.admin
            .create_user(&spec.auth_database, &spec.new_user())
            .await
            .map_err(UserError::remote("createUser"))
    }

    async fn drop_user(&self, database: &str, name: &str) -> UserResult<()> {
        debug!("dropping user {} from database {}", name, database);
        self.admin
            .drop_user(database, name)
            .await
            .map_err(UserError::remote("dropUser"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{AdminCall, MockAdmin};
    use crate::user::{ATTR_AUTH_MECHANISMS, ATTR_NAME, ATTR_PASSWORD, ATTR_ROLE, RoleGrant};

    fn resource_id() -> ResourceId {
        ResourceId::new("database_user", "app")
    }

    fn role(db: &str, role: &str) -> Value {
        let mut map = HashMap::new();
        map.insert("db".to_string(), Value::String(db.to_string()));
        map.insert("role".to_string(), Value::String(role.to_string()));
        Value::Map(map)
    }

    fn attributes(database: &str, name: &str, roles: Vec<Value>) -> HashMap<String, Value> {
        let mut attrs = HashMap::new();
        attrs.insert(
            ATTR_AUTH_DATABASE.to_string(),
            Value::String(database.to_string()),
        );
        attrs.insert(ATTR_NAME.to_string(), Value::String(name.to_string()));
        attrs.insert(
            ATTR_PASSWORD.to_string(),
            Value::String("s3cret".to_string()),
        );
        attrs.insert(ATTR_ROLE.to_string(), Value::List(roles));
        attrs
    }

    fn roles_of(state: &State) -> Vec<Value> {
        match state.attributes.get(ATTR_ROLE) {
            Some(Value::List(items)) => items.clone(),
            other => panic!("unexpected role attribute: {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_then_read_is_consistent() {
        let controller = DatabaseUserController::new(MockAdmin::default());
        let attrs = attributes("admin", "alice", vec![role("admin", "read")]);

        let state = controller.create(&resource_id(), &attrs).await.unwrap();
        let identifier = state.identifier.clone().unwrap();
        assert_eq!(identifier, "YWRtaW4uYWxpY2U=");
        assert_eq!(
            state.attributes.get(ATTR_PASSWORD),
            Some(&Value::String("s3cret".to_string()))
        );

        let read = controller
            .read(&resource_id(), &identifier, LocalValues::default())
            .await
            .unwrap();
        assert_eq!(roles_of(&read), vec![role("admin", "read")]);
        assert_eq!(
            read.attributes.get(ATTR_AUTH_DATABASE),
            Some(&Value::String("admin".to_string()))
        );
        assert!(!read.attributes.contains_key(ATTR_PASSWORD));
    }

    #[tokio::test]
    async fn server_default_mechanisms_are_not_reported() {
        let controller = DatabaseUserController::new(MockAdmin::default());
        let attrs = attributes("admin", "alice", vec![]);

        let created = controller.create(&resource_id(), &attrs).await.unwrap();
        assert_eq!(
            created.attributes.get(ATTR_AUTH_MECHANISMS),
            Some(&Value::List(vec![]))
        );

        let identifier = created.identifier.clone().unwrap();
        let read = controller
            .read(
                &resource_id(),
                &identifier,
                LocalValues::from_attributes(&created.attributes),
            )
            .await
            .unwrap();
        assert_eq!(read.attributes, created.attributes);
    }

    #[tokio::test]
    async fn create_twice_surfaces_remote_error() {
        let controller = DatabaseUserController::new(MockAdmin::default());
        let attrs = attributes("admin", "alice", vec![]);

        controller.create(&resource_id(), &attrs).await.unwrap();
        let err = controller.create(&resource_id(), &attrs).await.unwrap_err();
        assert!(matches!(
            err,
            UserError::RemoteCommand {
                command: "createUser",
                ..
            }
        ));
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn read_missing_user_is_not_found() {
        let controller = DatabaseUserController::new(MockAdmin::default());
        let err = controller
            .read(
                &resource_id(),
                &identifier::encode("admin", "ghost"),
                LocalValues::default(),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn read_rejects_malformed_identifier() {
        let admin = MockAdmin::default();
        let controller = DatabaseUserController::new(admin);
        let err = controller
            .read(&resource_id(), "not-base64!!", LocalValues::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::IdFormat { .. }));
        assert!(controller.admin().calls().is_empty());
    }

    #[tokio::test]
    async fn import_reads_without_password() {
        let admin = MockAdmin::default().with_user("reporting", "etl", vec![]);
        let controller = DatabaseUserController::new(admin);

        let state = controller
            .import(&resource_id(), &identifier::encode("reporting", "etl"))
            .await
            .unwrap();
        assert!(state.exists);
        assert_eq!(
            state.attributes.get(ATTR_NAME),
            Some(&Value::String("etl".to_string()))
        );
        assert!(!state.attributes.contains_key(ATTR_PASSWORD));
    }

    #[tokio::test]
    async fn update_replaces_identity() {
        let admin = MockAdmin::default().with_user("db1", "user1", vec![]);
        let controller = DatabaseUserController::new(admin);
        let desired = attributes("db2", "user2", vec![role("db2", "readWrite")]);

        let state = controller
            .update(&resource_id(), &identifier::encode("db1", "user1"), &desired)
            .await
            .unwrap();

        let new_identifier = state.identifier.clone().unwrap();
        assert_eq!(
            identifier::decode(&new_identifier).unwrap(),
            UserKey::new("db2", "user2")
        );

        let calls = controller.admin().calls();
        assert_eq!(
            calls[0],
            AdminCall::DropUser {
                database: "db1".to_string(),
                name: "user1".to_string(),
            }
        );
        match &calls[1] {
            AdminCall::CreateUser { database, user } => {
                assert_eq!(database, "db2");
                assert_eq!(user.name, "user2");
                assert_eq!(user.roles, vec![RoleGrant::new("db2", "readWrite")]);
            }
            other => panic!("expected createUser, got {:?}", other),
        }
        assert!(!controller.admin().has_user("db1", "user1"));
        assert!(controller.admin().has_user("db2", "user2"));
    }

    #[tokio::test]
    async fn update_validates_before_dropping() {
        let admin = MockAdmin::default().with_user("admin", "alice", vec![]);
        let controller = DatabaseUserController::new(admin);
        let current = identifier::encode("admin", "alice");

        let mut no_role = HashMap::new();
        no_role.insert("db".to_string(), Value::String("admin".to_string()));
        let desired = attributes("admin", "alice", vec![Value::Map(no_role)]);
        let err = controller
            .update(&resource_id(), &current, &desired)
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::RoleDecoding { index: 0, .. }));

        let too_many = (0..26)
            .map(|i| role("admin", &format!("role{}", i)))
            .collect();
        let err = controller
            .update(&resource_id(), &current, &attributes("admin", "alice", too_many))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UserError::TooManyRoles {
                count: 26,
                max: 25
            }
        ));

        assert!(controller.admin().calls().is_empty());
        assert!(controller.admin().has_user("admin", "alice"));
    }

    #[tokio::test]
    async fn update_fails_when_drop_fails() {
        let controller = DatabaseUserController::new(MockAdmin::default());
        let desired = attributes("admin", "alice", vec![]);

        let err = controller
            .update(&resource_id(), &identifier::encode("admin", "alice"), &desired)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UserError::RemoteCommand {
                command: "dropUser",
                ..
            }
        ));
        // No create is attempted after a failed drop
        assert_eq!(controller.admin().calls().len(), 1);
    }

    #[tokio::test]
    async fn update_leaves_user_dropped_when_create_fails() {
        let admin = MockAdmin::default()
            .with_user("admin", "alice", vec![])
            .with_create_failure("unknown mechanism");
        let controller = DatabaseUserController::new(admin);
        let desired = attributes("admin", "alice", vec![]);

        let err = controller
            .update(&resource_id(), &identifier::encode("admin", "alice"), &desired)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UserError::RemoteCommand {
                command: "createUser",
                ..
            }
        ));
        assert!(!controller.admin().has_user("admin", "alice"));
    }

    #[tokio::test]
    async fn delete_scopes_database_from_tracked_state() {
        let admin = MockAdmin::default().with_user("live_db", "alice", vec![]);
        let controller = DatabaseUserController::new(admin);
        let tracked = attributes("live_db", "someone_else", vec![]);

        controller
            .delete(&identifier::encode("id_db", "alice"), &tracked)
            .await
            .unwrap();

        assert_eq!(
            controller.admin().calls(),
            vec![AdminCall::DropUser {
                database: "live_db".to_string(),
                name: "alice".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn delete_requires_tracked_database() {
        let controller = DatabaseUserController::new(MockAdmin::default());
        let err = controller
            .delete(&identifier::encode("admin", "alice"), &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::MissingAttribute("auth_database")));
        assert!(controller.admin().calls().is_empty());
    }

    #[tokio::test]
    async fn delete_surfaces_remote_failure() {
        let controller = DatabaseUserController::new(MockAdmin::default());
        let tracked = attributes("admin", "alice", vec![]);
        let err = controller
            .delete(&identifier::encode("admin", "alice"), &tracked)
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::RemoteCommand { .. }));
    }

    #[tokio::test]
    async fn role_limit_is_checked_before_remote_calls() {
        let controller = DatabaseUserController::new(MockAdmin::default());
        let roles = |n: usize| {
            (0..n)
                .map(|i| role("admin", &format!("role{}", i)))
                .collect::<Vec<_>>()
        };

        let err = controller
            .create(&resource_id(), &attributes("admin", "bob", roles(26)))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::TooManyRoles { .. }));
        assert!(controller.admin().calls().is_empty());

        let state = controller
            .create(&resource_id(), &attributes("admin", "bob", roles(25)))
            .await
            .unwrap();
        assert_eq!(roles_of(&state).len(), 25);
    }

    #[tokio::test]
    async fn repeated_role_does_not_count_against_limit() {
        let controller = DatabaseUserController::new(MockAdmin::default());
        let mut roles: Vec<Value> = (0..25)
            .map(|i| role("admin", &format!("role{}", i)))
            .collect();
        roles.push(role("admin", "role0"));

        let state = controller
            .create(&resource_id(), &attributes("admin", "carol", roles))
            .await
            .unwrap();
        assert_eq!(roles_of(&state).len(), 25);
        match &controller.admin().calls()[0] {
            AdminCall::CreateUser { user, .. } => assert_eq!(user.roles.len(), 25),
            other => panic!("expected createUser, got {:?}", other),
        }
    }
}
