//! External collaborators that create principals
//!
//! User management, group management and role storage live outside the
//! reconciliation engine. The `Local*` implementations here write straight to
//! the repositories and back tests and single-process deployments.

use crate::error::{Result, StoreError};
use crate::store::{GroupAuditRepository, GroupRepository, RoleRepository, UserRepository};
use crate::types::{GroupRecord, Role, UserRecord};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub use crate::types::{GroupAuditEntry, OperationContext};

/// User management service
#[async_trait]
pub trait UserManager: Send + Sync {
    /// Create an externally-sourced user; `None` if nothing was created
    async fn create_service_config_user(&self, name: &str) -> Result<Option<UserRecord>>;
}

/// Group management service
#[async_trait]
pub trait GroupService: Send + Sync {
    /// Create a group without a login session; `None` if nothing was created
    async fn create_group_without_login(&self, group: GroupRecord) -> Result<Option<GroupRecord>>;

    /// Record a transaction-log entry for a group change
    async fn write_audit_log(
        &self,
        group: &GroupRecord,
        previous: Option<&GroupRecord>,
        context: OperationContext,
    ) -> Result<()>;
}

/// Role storage service
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Persist a new role; fails on a name conflict
    async fn create_role(&self, role: Role, admin_flag: bool) -> Result<Role>;
}

/// [`UserManager`] writing to a [`UserRepository`]
pub struct LocalUserManager {
    users: Arc<dyn UserRepository>,
}

impl LocalUserManager {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserManager for LocalUserManager {
    async fn create_service_config_user(&self, name: &str) -> Result<Option<UserRecord>> {
        if let Some(existing) = self.users.find_by_name(name).await? {
            return Ok(Some(existing));
        }
        let created = self.users.create(UserRecord::external(name)).await?;
        info!(user = %created.name, "created service-config user");
        Ok(Some(created))
    }
}

/// [`GroupService`] writing groups and their transaction log to the store,
/// so both roll back together
pub struct LocalGroupService {
    groups: Arc<dyn GroupRepository>,
    audit_log: Arc<dyn GroupAuditRepository>,
}

impl LocalGroupService {
    pub fn new(groups: Arc<dyn GroupRepository>, audit_log: Arc<dyn GroupAuditRepository>) -> Self {
        Self { groups, audit_log }
    }

    /// Entries written so far
    pub async fn audit_entries(&self) -> Result<Vec<GroupAuditEntry>> {
        Ok(self.audit_log.entries().await?)
    }
}

#[async_trait]
impl GroupService for LocalGroupService {
    async fn create_group_without_login(&self, group: GroupRecord) -> Result<Option<GroupRecord>> {
        match self.groups.create(group).await {
            Ok(created) => Ok(Some(created)),
            // Lost a race with another creator; nothing new was created
            Err(StoreError::Conflict(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_audit_log(
        &self,
        group: &GroupRecord,
        previous: Option<&GroupRecord>,
        context: OperationContext,
    ) -> Result<()> {
        info!(group = %group.name, ?context, "group transaction log");
        self.audit_log
            .append(GroupAuditEntry {
                group: group.clone(),
                previous: previous.cloned(),
                context,
            })
            .await?;
        Ok(())
    }
}

/// [`RoleStore`] writing bare role rows to a [`RoleRepository`]
pub struct LocalRoleStore {
    roles: Arc<dyn RoleRepository>,
}

impl LocalRoleStore {
    pub fn new(roles: Arc<dyn RoleRepository>) -> Self {
        Self { roles }
    }
}

#[async_trait]
impl RoleStore for LocalRoleStore {
    async fn create_role(&self, role: Role, admin_flag: bool) -> Result<Role> {
        let created = self.roles.create(role).await?;
        info!(role = %created.name, admin_flag, "created role");
        Ok(created)
    }
}
