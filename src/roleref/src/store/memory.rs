//! In-memory implementation of the role reference repositories
//!
//! # Purpose
//! Implements every repository trait plus [`TransactionalStore`] with plain
//! maps guarded by `tokio::sync::RwLock`. Used by tests, benchmarks and
//! embedders that do not need durability.
//!
//! # Transactions
//! `begin` takes an owned transaction lock, so units of work are serialized
//! (the stand-in for the row lock a relational store takes on the role), and
//! snapshots the state. `rollback` restores the snapshot; `commit` keeps the
//! current state. Repository calls made outside a transaction apply directly.

use super::{
    GroupAuditRepository, GroupRepository, Repositories, RoleRefRepository, RoleRefTables,
    RoleRepository, UserRepository,
};
use crate::error::{StoreError, StoreResult};
use crate::transaction::{TransactionHandle, TransactionalStore};
use crate::types::{GroupAuditEntry, GroupRecord, PrincipalKind, RecordId, Role, RoleRefRow, UserRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct StoreState {
    next_id: RecordId,
    users: HashMap<String, UserRecord>,
    groups: HashMap<String, GroupRecord>,
    group_audit: Vec<GroupAuditEntry>,
    roles: HashMap<String, Role>,
    role_refs: [BTreeMap<RecordId, RoleRefRow>; 3],
}

impl StoreState {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store for principals and role join tables
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    tx_lock: Arc<Mutex<()>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository bundle backed by this store
    pub fn repositories(&self) -> Repositories {
        let store = Arc::new(self.clone());
        Repositories {
            users: store.clone(),
            groups: store.clone(),
            group_audit: store.clone(),
            roles: store,
            role_refs: RoleRefTables::new(
                Arc::new(self.ref_table(PrincipalKind::User)),
                Arc::new(self.ref_table(PrincipalKind::Group)),
                Arc::new(self.ref_table(PrincipalKind::Role)),
            ),
        }
    }

    /// Join table view for one principal kind
    pub fn ref_table(&self, kind: PrincipalKind) -> InMemoryRoleRefTable {
        InMemoryRoleRefTable {
            kind,
            state: self.state.clone(),
        }
    }

    /// All join rows of `kind`, ordered by row id
    pub async fn role_ref_rows(&self, kind: PrincipalKind) -> Vec<RoleRefRow> {
        let state = self.state.read().await;
        state.role_refs[kind.index()].values().cloned().collect()
    }

    /// Number of principals of `kind`
    pub async fn principal_count(&self, kind: PrincipalKind) -> usize {
        let state = self.state.read().await;
        match kind {
            PrincipalKind::User => state.users.len(),
            PrincipalKind::Group => state.groups.len(),
            PrincipalKind::Role => state.roles.len(),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<UserRecord>> {
        let state = self.state.read().await;
        Ok(state.users.get(name).cloned())
    }

    async fn create(&self, mut user: UserRecord) -> StoreResult<UserRecord> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.name) {
            return Err(StoreError::Conflict(format!("user {}", user.name)));
        }
        user.id = Some(state.allocate_id());
        state.users.insert(user.name.clone(), user.clone());
        Ok(user)
    }
}

#[async_trait]
impl GroupRepository for InMemoryStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<GroupRecord>> {
        let state = self.state.read().await;
        Ok(state.groups.get(name).cloned())
    }

    async fn create(&self, mut group: GroupRecord) -> StoreResult<GroupRecord> {
        let mut state = self.state.write().await;
        if state.groups.contains_key(&group.name) {
            return Err(StoreError::Conflict(format!("group {}", group.name)));
        }
        group.id = Some(state.allocate_id());
        state.groups.insert(group.name.clone(), group.clone());
        Ok(group)
    }
}

#[async_trait]
impl GroupAuditRepository for InMemoryStore {
    async fn append(&self, entry: GroupAuditEntry) -> StoreResult<()> {
        self.state.write().await.group_audit.push(entry);
        Ok(())
    }

    async fn entries(&self) -> StoreResult<Vec<GroupAuditEntry>> {
        Ok(self.state.read().await.group_audit.clone())
    }
}

#[async_trait]
impl RoleRepository for InMemoryStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.get(name).cloned())
    }

    async fn create(&self, mut role: Role) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        if state.roles.contains_key(&role.name) {
            return Err(StoreError::Conflict(format!("role {}", role.name)));
        }
        role.id = Some(state.allocate_id());
        state.roles.insert(role.name.clone(), role.clone());
        Ok(role)
    }
}

/// One join table of an [`InMemoryStore`]
#[derive(Clone)]
pub struct InMemoryRoleRefTable {
    kind: PrincipalKind,
    state: Arc<RwLock<StoreState>>,
}

#[async_trait]
impl RoleRefRepository for InMemoryRoleRefTable {
    fn kind(&self) -> PrincipalKind {
        self.kind
    }

    async fn find_ids_by_role_id(&self, role_id: RecordId) -> StoreResult<Vec<RecordId>> {
        let state = self.state.read().await;
        Ok(state.role_refs[self.kind.index()]
            .iter()
            .filter(|(_, row)| row.role_id == role_id)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn find_by_role_id(&self, role_id: RecordId) -> StoreResult<Vec<RoleRefRow>> {
        let state = self.state.read().await;
        Ok(state.role_refs[self.kind.index()]
            .values()
            .filter(|row| row.role_id == role_id)
            .cloned()
            .collect())
    }

    async fn delete_by_ids(&self, ids: &[RecordId]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.write().await;
        let table = &mut state.role_refs[self.kind.index()];
        let removed = ids.iter().filter(|id| table.remove(*id).is_some()).count();
        debug!(kind = %self.kind, removed, "deleted role ref rows");
        Ok(removed)
    }

    async fn create(&self, mut row: RoleRefRow) -> StoreResult<RoleRefRow> {
        if row.kind != self.kind {
            return Err(StoreError::Database(format!(
                "{} row written to {} join table",
                row.kind, self.kind
            )));
        }
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        row.id = Some(id);
        state.role_refs[self.kind.index()].insert(id, row.clone());
        Ok(row)
    }
}

struct InMemoryTransaction {
    state: Arc<RwLock<StoreState>>,
    snapshot: StoreState,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl TransactionHandle for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        *this.state.write().await = this.snapshot;
        Ok(())
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn TransactionHandle>> {
        let guard = self.tx_lock.clone().lock_owned().await;
        let snapshot = self.state.read().await.clone();
        Ok(Box::new(InMemoryTransaction {
            state: self.state.clone(),
            snapshot,
            _guard: guard,
        }))
    }
}
