//! Per-kind dispatch table
//!
//! Every principal kind is served by one [`PrincipalBinding`] that knows how
//! to look the principal up, create it, and write its join row. Adding a kind
//! means adding a binding here; the resolver, writer and purger go through the
//! table and never branch on kind themselves.

use crate::collaborators::{
    GroupService, LocalGroupService, LocalRoleStore, LocalUserManager, OperationContext, RoleStore,
    UserManager,
};
use crate::context;
use crate::error::Result;
use crate::store::{GroupRepository, Repositories, RoleRefRepository, RoleRepository, UserRepository};
use crate::types::{GroupRecord, PrincipalKind, PrincipalRecord, RecordId, Role, RoleRefRow};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Lookup, creation and join-row writing for one principal kind
#[async_trait]
pub trait PrincipalBinding: Send + Sync {
    fn kind(&self) -> PrincipalKind;

    /// Find an existing principal by name
    async fn lookup(&self, name: &str) -> Result<Option<PrincipalRecord>>;

    /// Create the principal; `None` when the collaborator created nothing
    async fn create(&self, name: &str) -> Result<Option<RecordId>>;

    /// Join table holding this kind's role references
    fn ref_table(&self) -> &Arc<dyn RoleRefRepository>;

    async fn write_row(&self, row: RoleRefRow) -> Result<RoleRefRow> {
        Ok(self.ref_table().create(row).await?)
    }
}

fn record(kind: PrincipalKind, id: Option<RecordId>, name: &str) -> Option<PrincipalRecord> {
    id.map(|id| PrincipalRecord {
        id,
        kind,
        name: name.to_string(),
    })
}

/// Users, created through the user manager as service-config users
pub struct UserBinding {
    users: Arc<dyn UserRepository>,
    manager: Arc<dyn UserManager>,
    refs: Arc<dyn RoleRefRepository>,
}

impl UserBinding {
    pub fn new(
        users: Arc<dyn UserRepository>,
        manager: Arc<dyn UserManager>,
        refs: Arc<dyn RoleRefRepository>,
    ) -> Self {
        Self { users, manager, refs }
    }
}

#[async_trait]
impl PrincipalBinding for UserBinding {
    fn kind(&self) -> PrincipalKind {
        PrincipalKind::User
    }

    async fn lookup(&self, name: &str) -> Result<Option<PrincipalRecord>> {
        let user = self.users.find_by_name(name).await?;
        Ok(user.and_then(|u| record(PrincipalKind::User, u.id, &u.name)))
    }

    async fn create(&self, name: &str) -> Result<Option<RecordId>> {
        if self.manager.create_service_config_user(name).await?.is_none() {
            warn!(
                user = name,
                "serviceConfigUser creation failed; this may be transient and correct itself when the transaction commits"
            );
            return Ok(None);
        }

        match self.users.find_by_name(name).await?.and_then(|u| u.id) {
            Some(id) => Ok(Some(id)),
            None => {
                error!(user = name, "No User created!! Irrecoverable error!");
                Ok(None)
            }
        }
    }

    fn ref_table(&self) -> &Arc<dyn RoleRefRepository> {
        &self.refs
    }
}

/// Groups, created as external groups through the group service
pub struct GroupBinding {
    groups: Arc<dyn GroupRepository>,
    service: Arc<dyn GroupService>,
    refs: Arc<dyn RoleRefRepository>,
}

impl GroupBinding {
    pub fn new(
        groups: Arc<dyn GroupRepository>,
        service: Arc<dyn GroupService>,
        refs: Arc<dyn RoleRefRepository>,
    ) -> Self {
        Self { groups, service, refs }
    }
}

#[async_trait]
impl PrincipalBinding for GroupBinding {
    fn kind(&self) -> PrincipalKind {
        PrincipalKind::Group
    }

    async fn lookup(&self, name: &str) -> Result<Option<PrincipalRecord>> {
        let group = self.groups.find_by_name(name).await?;
        Ok(group.and_then(|g| record(PrincipalKind::Group, g.id, &g.name)))
    }

    async fn create(&self, name: &str) -> Result<Option<RecordId>> {
        let Some(created) = self
            .service
            .create_group_without_login(GroupRecord::external(name))
            .await?
        else {
            debug!(group = name, "group service created nothing");
            return Ok(None);
        };

        self.service
            .write_audit_log(&created, None, OperationContext::Create)
            .await?;

        Ok(created.id)
    }

    fn ref_table(&self) -> &Arc<dyn RoleRefRepository> {
        &self.refs
    }
}

/// Nested roles, created bare through the role store
pub struct RoleBinding {
    roles: Arc<dyn RoleRepository>,
    store: Arc<dyn RoleStore>,
    refs: Arc<dyn RoleRefRepository>,
}

impl RoleBinding {
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        store: Arc<dyn RoleStore>,
        refs: Arc<dyn RoleRefRepository>,
    ) -> Self {
        Self { roles, store, refs }
    }
}

#[async_trait]
impl PrincipalBinding for RoleBinding {
    fn kind(&self) -> PrincipalKind {
        PrincipalKind::Role
    }

    async fn lookup(&self, name: &str) -> Result<Option<PrincipalRecord>> {
        let role = self.roles.find_by_name(name).await?;
        Ok(role.and_then(|r| record(PrincipalKind::Role, r.id, &r.name)))
    }

    async fn create(&self, name: &str) -> Result<Option<RecordId>> {
        // Nested roles must be written row by row
        context::set_bulk_mode(false);

        match self.store.create_role(Role::new(name), false).await {
            Ok(role) => Ok(role.id),
            Err(e) => {
                error!(role = name, "Failed to create Role: {}", e);
                Ok(None)
            }
        }
    }

    fn ref_table(&self) -> &Arc<dyn RoleRefRepository> {
        &self.refs
    }
}

/// One binding per principal kind
#[derive(Clone)]
pub struct DispatchTable {
    bindings: [Arc<dyn PrincipalBinding>; 3],
}

impl DispatchTable {
    pub fn new(
        users: Arc<dyn PrincipalBinding>,
        groups: Arc<dyn PrincipalBinding>,
        roles: Arc<dyn PrincipalBinding>,
    ) -> Self {
        debug_assert_eq!(users.kind(), PrincipalKind::User);
        debug_assert_eq!(groups.kind(), PrincipalKind::Group);
        debug_assert_eq!(roles.kind(), PrincipalKind::Role);
        Self {
            bindings: [users, groups, roles],
        }
    }

    /// Table over `repos` using the given collaborators
    pub fn with_collaborators(
        repos: &Repositories,
        user_manager: Arc<dyn UserManager>,
        group_service: Arc<dyn GroupService>,
        role_store: Arc<dyn RoleStore>,
    ) -> Self {
        let refs = &repos.role_refs;
        Self::new(
            Arc::new(UserBinding::new(
                repos.users.clone(),
                user_manager,
                refs.table(PrincipalKind::User).clone(),
            )),
            Arc::new(GroupBinding::new(
                repos.groups.clone(),
                group_service,
                refs.table(PrincipalKind::Group).clone(),
            )),
            Arc::new(RoleBinding::new(
                repos.roles.clone(),
                role_store,
                refs.table(PrincipalKind::Role).clone(),
            )),
        )
    }

    /// Table over `repos` using the store-backed local collaborators
    pub fn local(repos: &Repositories) -> Self {
        Self::with_collaborators(
            repos,
            Arc::new(LocalUserManager::new(repos.users.clone())),
            Arc::new(LocalGroupService::new(
                repos.groups.clone(),
                repos.group_audit.clone(),
            )),
            Arc::new(LocalRoleStore::new(repos.roles.clone())),
        )
    }

    pub fn binding(&self, kind: PrincipalKind) -> &Arc<dyn PrincipalBinding> {
        &self.bindings[kind.index()]
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Arc<dyn PrincipalBinding>> {
        self.bindings.iter()
    }
}
