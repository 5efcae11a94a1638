//! Transactional entry points
//!
//! [`RoleRefService`] wraps the reconciler in a unit of work: it begins a
//! transaction, reconciles, and commits (running deferred associations) or
//! rolls back on the first error.

use crate::collaborators::{GroupService, RoleStore, UserManager};
use crate::context::{AdminProbe, AuditFieldSource, ContextAdminProbe, ContextAuditFields};
use crate::dispatch::DispatchTable;
use crate::error::Result;
use crate::reconcile::{ReconcileSummary, ReconcilerConfig, RoleRefReconciler};
use crate::store::{InMemoryStore, Repositories};
use crate::transaction::{Transaction, TransactionManager, TransactionalStore};
use crate::types::Role;
use std::sync::Arc;
use tracing::{info, warn};

/// Role reference reconciliation service
pub struct RoleRefService {
    reconciler: RoleRefReconciler,
    transactions: TransactionManager,
}

impl RoleRefService {
    pub fn new(reconciler: RoleRefReconciler, transactions: TransactionManager) -> Self {
        Self {
            reconciler,
            transactions,
        }
    }

    /// Service over `repos` with explicit collaborators
    #[allow(clippy::too_many_arguments)]
    pub fn with_collaborators(
        repos: &Repositories,
        store: Arc<dyn TransactionalStore>,
        user_manager: Arc<dyn UserManager>,
        group_service: Arc<dyn GroupService>,
        role_store: Arc<dyn RoleStore>,
        admin_probe: Arc<dyn AdminProbe>,
        audit_source: Arc<dyn AuditFieldSource>,
        config: ReconcilerConfig,
    ) -> Self {
        let table = DispatchTable::with_collaborators(repos, user_manager, group_service, role_store);
        Self::new(
            RoleRefReconciler::new(table, admin_probe, audit_source, config),
            TransactionManager::new(store),
        )
    }

    /// Service over an [`InMemoryStore`] with local collaborators and the
    /// ambient request context
    pub fn local(store: &InMemoryStore, config: ReconcilerConfig) -> Self {
        let table = DispatchTable::local(&store.repositories());
        Self::new(
            RoleRefReconciler::new(
                table,
                Arc::new(ContextAdminProbe),
                Arc::new(ContextAuditFields),
                config,
            ),
            TransactionManager::new(Arc::new(store.clone())),
        )
    }

    /// Reconcile `role` in its own transaction
    pub async fn apply(&self, role: &Role, create_missing: bool) -> Result<ReconcileSummary> {
        let mut tx = self.transactions.begin().await?;

        match self.reconciler.reconcile(role, create_missing, &mut tx).await {
            Ok(summary) => {
                let executed = tx.commit().await?;
                info!(
                    role_id = summary.role_id,
                    associated = summary.associated,
                    deferred = executed,
                    "role refs reconciled"
                );
                Ok(summary)
            }
            Err(e) => {
                abort(tx).await;
                Err(e)
            }
        }
    }

    /// Remove all join rows of `role` in its own transaction
    pub async fn cleanup(&self, role: &Role) -> Result<bool> {
        let tx = self.transactions.begin().await?;

        match self.reconciler.cleanup(role).await {
            Ok(purged) => {
                tx.commit().await?;
                Ok(purged)
            }
            Err(e) => {
                abort(tx).await;
                Err(e)
            }
        }
    }
}

async fn abort(tx: Transaction) {
    let id = tx.id();
    if let Err(e) = tx.rollback().await {
        warn!(tx = %id, "rollback failed: {}", e);
    }
}
