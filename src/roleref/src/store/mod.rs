//! Repository interfaces for principals and role join tables

use crate::error::StoreResult;
use crate::types::{GroupAuditEntry, GroupRecord, PrincipalKind, RecordId, Role, RoleRefRow, UserRecord};
use async_trait::async_trait;
use std::sync::Arc;

pub mod memory;

pub use memory::InMemoryStore;

/// User store
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<UserRecord>>;

    /// Insert a user; fails with `Conflict` if the name is taken
    async fn create(&self, user: UserRecord) -> StoreResult<UserRecord>;
}

/// Group store
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<GroupRecord>>;

    /// Insert a group; fails with `Conflict` if the name is taken
    async fn create(&self, group: GroupRecord) -> StoreResult<GroupRecord>;
}

/// Group transaction log, written in the same unit of work as the group rows
#[async_trait]
pub trait GroupAuditRepository: Send + Sync {
    async fn append(&self, entry: GroupAuditEntry) -> StoreResult<()>;

    /// Entries in write order
    async fn entries(&self) -> StoreResult<Vec<GroupAuditEntry>>;
}

/// Role store (role rows only, not their join tables)
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>>;

    /// Insert a role; fails with `Conflict` if the name is taken
    async fn create(&self, role: Role) -> StoreResult<Role>;
}

/// One role join table (users, groups or sub-roles)
#[async_trait]
pub trait RoleRefRepository: Send + Sync {
    /// Which principal kind this table maps
    fn kind(&self) -> PrincipalKind;

    async fn find_ids_by_role_id(&self, role_id: RecordId) -> StoreResult<Vec<RecordId>>;

    async fn find_by_role_id(&self, role_id: RecordId) -> StoreResult<Vec<RoleRefRow>>;

    /// Delete rows by id; unknown ids are ignored
    async fn delete_by_ids(&self, ids: &[RecordId]) -> StoreResult<usize>;

    /// Insert a row and return it with its assigned id
    async fn create(&self, row: RoleRefRow) -> StoreResult<RoleRefRow>;
}

/// The three join tables, addressable by kind
#[derive(Clone)]
pub struct RoleRefTables {
    tables: [Arc<dyn RoleRefRepository>; 3],
}

impl RoleRefTables {
    pub fn new(
        users: Arc<dyn RoleRefRepository>,
        groups: Arc<dyn RoleRefRepository>,
        roles: Arc<dyn RoleRefRepository>,
    ) -> Self {
        debug_assert_eq!(users.kind(), PrincipalKind::User);
        debug_assert_eq!(groups.kind(), PrincipalKind::Group);
        debug_assert_eq!(roles.kind(), PrincipalKind::Role);
        Self {
            tables: [users, groups, roles],
        }
    }

    pub fn table(&self, kind: PrincipalKind) -> &Arc<dyn RoleRefRepository> {
        &self.tables[kind.index()]
    }
}

/// All repositories the reconciliation engine reads and writes
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub group_audit: Arc<dyn GroupAuditRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub role_refs: RoleRefTables,
}
