//! Shared fixtures for role reference integration tests

#![allow(dead_code)]

use cretoai_roleref::context::{self, CallerIdentity, RequestContext};
use cretoai_roleref::store::{GroupRepository, RoleRepository, UserRepository};
use cretoai_roleref::{
    GroupRecord, InMemoryStore, PrincipalKind, RecordId, ReconcileSummary, ReconcilerConfig,
    Result, Role, RoleRefService, UserRecord,
};
use std::collections::BTreeSet;

pub const ADMIN_ID: RecordId = 1;
pub const REGULAR_ID: RecordId = 2;

pub fn admin() -> RequestContext {
    RequestContext::new(CallerIdentity::admin(ADMIN_ID, "admin"))
}

pub fn regular() -> RequestContext {
    RequestContext::new(CallerIdentity::new(REGULAR_ID, "bob.smith"))
}

/// In-memory store plus a service over it
pub struct Fixture {
    pub store: InMemoryStore,
    pub service: RoleRefService,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig::default())
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        let store = InMemoryStore::new();
        let service = RoleRefService::local(&store, config);
        Self { store, service }
    }

    pub async fn add_user(&self, name: &str) -> RecordId {
        let user = self
            .store
            .repositories()
            .users
            .create(UserRecord::external(name))
            .await
            .unwrap();
        user.id.unwrap()
    }

    pub async fn add_group(&self, name: &str) -> RecordId {
        let group = self
            .store
            .repositories()
            .groups
            .create(GroupRecord::external(name))
            .await
            .unwrap();
        group.id.unwrap()
    }

    pub async fn add_role(&self, name: &str) -> RecordId {
        let role = self
            .store
            .repositories()
            .roles
            .create(Role::new(name))
            .await
            .unwrap();
        role.id.unwrap()
    }

    pub async fn principal_id(&self, kind: PrincipalKind, name: &str) -> Option<RecordId> {
        let repos = self.store.repositories();
        match kind {
            PrincipalKind::User => repos.users.find_by_name(name).await.unwrap().and_then(|u| u.id),
            PrincipalKind::Group => repos.groups.find_by_name(name).await.unwrap().and_then(|g| g.id),
            PrincipalKind::Role => repos.roles.find_by_name(name).await.unwrap().and_then(|r| r.id),
        }
    }

    /// Apply `role` as `ctx`
    pub async fn apply_as(
        &self,
        ctx: RequestContext,
        role: &Role,
        create_missing: bool,
    ) -> Result<ReconcileSummary> {
        context::scope(ctx, self.service.apply(role, create_missing)).await
    }

    /// `(role_id, principal_id, principal_name)` of every row of `kind`
    pub async fn rows(&self, kind: PrincipalKind) -> BTreeSet<(RecordId, RecordId, String)> {
        self.store
            .role_ref_rows(kind)
            .await
            .into_iter()
            .map(|r| (r.role_id, r.principal_id, r.principal_name))
            .collect()
    }

    pub async fn row_count(&self) -> usize {
        let mut total = 0;
        for kind in PrincipalKind::ALL {
            total += self.store.role_ref_rows(kind).await.len();
        }
        total
    }
}
