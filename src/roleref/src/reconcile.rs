//! Role reference reconciliation
//!
//! Replaces a role's join rows so they match its declared members:
//!
//! ```text
//! validate → purge(role.id) → for kind in USER, GROUP, ROLE:
//!                               for name in distinct non-blank members:
//!                                 resolve(kind, name) ─ found ─→ write row
//!                                         │
//!                                      missing ─ lazy ─→ defer to commit
//!                                         │
//!                                       strict ─→ InvalidInput
//! ```
//!
//! Deferred associations run when the enclosing [`Transaction`] commits. They
//! create the missing principal and write the row using audit fields captured
//! while the request context was still available.

use crate::context::{AdminProbe, AuditFieldSource};
use crate::dispatch::DispatchTable;
use crate::error::{Result, RoleRefError};
use crate::purger::JoinTablePurger;
use crate::resolver::PrincipalResolver;
use crate::transaction::{CommitAction, Transaction};
use crate::types::{AuditFields, PrincipalKind, RecordId, Role};
use crate::writer::JoinTableWriter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reconciler configuration
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Service-wide switch for creating missing principals at commit time.
    /// When off, every reconciliation is strict.
    pub allow_lazy_creation: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            allow_lazy_creation: true,
        }
    }
}

impl ReconcilerConfig {
    pub fn with_lazy_creation(mut self, enabled: bool) -> Self {
        self.allow_lazy_creation = enabled;
        self
    }
}

/// A member whose principal will be created when the transaction commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredAssociation {
    pub kind: PrincipalKind,
    pub name: String,
    pub role_id: RecordId,
}

impl DeferredAssociation {
    fn failure_message(&self) -> String {
        format!(
            "Failed to associate {}:{} with role id:[{}]",
            self.kind, self.name, self.role_id
        )
    }
}

/// Commit action resolving (creating if needed) and associating one member
pub struct DeferredAssociate {
    association: DeferredAssociation,
    audit: AuditFields,
    resolver: Arc<PrincipalResolver>,
    writer: Arc<JoinTableWriter>,
}

impl DeferredAssociate {
    pub fn new(
        association: DeferredAssociation,
        audit: AuditFields,
        resolver: Arc<PrincipalResolver>,
        writer: Arc<JoinTableWriter>,
    ) -> Self {
        Self {
            association,
            audit,
            resolver,
            writer,
        }
    }
}

#[async_trait]
impl CommitAction for DeferredAssociate {
    fn describe(&self) -> String {
        let a = &self.association;
        format!("associate {}:{} with role {}", a.kind, a.name, a.role_id)
    }

    async fn run(&self) -> Result<()> {
        let a = &self.association;
        let Some(principal_id) = self.resolver.resolve(a.kind, &a.name, true).await? else {
            let message = a.failure_message();
            debug!(role_id = a.role_id, kind = %a.kind, name = %a.name, "{}", message);
            return Err(RoleRefError::DeferredFailure(message));
        };

        self.writer
            .associate_with(a.kind, a.role_id, principal_id, &a.name, self.audit.clone())
            .await?;
        debug!(
            role_id = a.role_id,
            kind = %a.kind,
            name = %a.name,
            principal_id,
            "Associated {}:{} with role id:[{}]",
            a.kind,
            a.name,
            a.role_id
        );
        Ok(())
    }
}

/// Outcome of one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub role_id: RecordId,

    /// Whether the purge ran
    pub purged: bool,

    /// Rows written immediately
    pub associated: usize,

    /// Associations queued for commit
    pub deferred: usize,
}

/// Reconciles a role's join tables with its declared members
pub struct RoleRefReconciler {
    purger: JoinTablePurger,
    resolver: Arc<PrincipalResolver>,
    writer: Arc<JoinTableWriter>,
    admin_probe: Arc<dyn AdminProbe>,
    config: ReconcilerConfig,
}

impl RoleRefReconciler {
    pub fn new(
        table: DispatchTable,
        admin_probe: Arc<dyn AdminProbe>,
        audit_source: Arc<dyn AuditFieldSource>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            purger: JoinTablePurger::new(table.clone()),
            resolver: Arc::new(PrincipalResolver::new(table.clone())),
            writer: Arc::new(JoinTableWriter::new(table, audit_source)),
            admin_probe,
            config,
        }
    }

    /// Reconcile `role` within `tx`.
    ///
    /// With `create_missing` (and lazy creation enabled and an admin caller),
    /// absent members are queued on `tx` and created at commit. Otherwise the
    /// first absent member fails the call with `InvalidInput`; rows already
    /// written are left for the caller to roll back with `tx`.
    pub async fn reconcile(
        &self,
        role: &Role,
        create_missing: bool,
        tx: &mut Transaction,
    ) -> Result<ReconcileSummary> {
        let role_id = validate(role)?;
        debug!(role_id, role = %role.name, create_missing, tx = %tx.id(), "==> reconcile role refs");

        let purged = self.purger.purge(Some(role_id)).await?;
        let lazy = create_missing && self.config.allow_lazy_creation && self.caller_is_admin().await;

        let mut summary = ReconcileSummary {
            role_id,
            purged,
            ..Default::default()
        };

        for kind in PrincipalKind::ALL {
            for name in role.members.distinct_names(kind) {
                match self.resolver.resolve(kind, &name, false).await? {
                    Some(principal_id) => {
                        self.writer.associate(kind, role_id, principal_id, &name).await?;
                        summary.associated += 1;
                    }
                    None if lazy => {
                        let association = DeferredAssociation { kind, name, role_id };
                        tx.register_commit_action(Box::new(DeferredAssociate::new(
                            association,
                            self.writer.capture_audit_fields(),
                            self.resolver.clone(),
                            self.writer.clone(),
                        )));
                        summary.deferred += 1;
                    }
                    None => return Err(RoleRefError::InvalidInput(kind.missing_message(&name))),
                }
            }
        }

        debug!(
            role_id,
            associated = summary.associated,
            deferred = summary.deferred,
            "<== reconcile role refs"
        );
        Ok(summary)
    }

    /// Delete all join rows of `role`; `false` if the role has no id
    pub async fn cleanup(&self, role: &Role) -> Result<bool> {
        self.purger.purge(role.id).await
    }

    async fn caller_is_admin(&self) -> bool {
        match self.admin_probe.is_caller_admin().await {
            Ok(admin) => admin,
            Err(e) => {
                warn!("admin capability check failed, treating caller as non-admin: {}", e);
                false
            }
        }
    }
}

fn validate(role: &Role) -> Result<RecordId> {
    if role.name.trim().is_empty() {
        return Err(RoleRefError::InvalidInput("Role name must not be empty".to_string()));
    }
    role.id.ok_or_else(|| {
        RoleRefError::InvalidInput(format!("Role with name: {} has no id", role.name))
    })
}
