//! Ambient request context
//!
//! The admin service runs each request inside a [`RequestContext`] scope
//! carrying the caller and per-request switches. Reconciliation reads it
//! through the [`AdminProbe`] and [`AuditFieldSource`] seams only, and never
//! from inside a deferred action: audit values are captured at enqueue time.

use crate::error::{Result, RoleRefError};
use crate::types::{AuditFields, RecordId};
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Authenticated caller of the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: Option<RecordId>,
    pub login_id: String,
    pub is_admin: bool,
}

impl CallerIdentity {
    pub fn new(user_id: RecordId, login_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            login_id: login_id.into(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: RecordId, login_id: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::new(user_id, login_id)
        }
    }
}

/// Per-request state
#[derive(Debug, Default)]
pub struct RequestContext {
    caller: Option<CallerIdentity>,
    bulk_mode: AtomicBool,
}

impl RequestContext {
    pub fn new(caller: CallerIdentity) -> Self {
        Self {
            caller: Some(caller),
            bulk_mode: AtomicBool::new(false),
        }
    }

    /// Start the request in bulk mode (batched writes allowed)
    pub fn with_bulk_mode(self, enabled: bool) -> Self {
        self.bulk_mode.store(enabled, Ordering::SeqCst);
        self
    }

    pub fn caller(&self) -> Option<&CallerIdentity> {
        self.caller.as_ref()
    }
}

tokio::task_local! {
    static REQUEST: Arc<RequestContext>;
}

/// Run `fut` with `ctx` as the ambient request context
pub async fn scope<F: Future>(ctx: RequestContext, fut: F) -> F::Output {
    REQUEST.scope(Arc::new(ctx), fut).await
}

/// Caller of the current request, if running inside a scope
pub fn current_caller() -> Option<CallerIdentity> {
    REQUEST.try_with(|ctx| ctx.caller.clone()).ok().flatten()
}

/// Switch bulk mode for the rest of the request; no-op outside a scope
pub fn set_bulk_mode(enabled: bool) {
    let _ = REQUEST.try_with(|ctx| ctx.bulk_mode.store(enabled, Ordering::SeqCst));
}

pub fn is_bulk_mode() -> bool {
    REQUEST
        .try_with(|ctx| ctx.bulk_mode.load(Ordering::SeqCst))
        .unwrap_or(false)
}

/// Answers whether the caller holds the admin capability
#[async_trait]
pub trait AdminProbe: Send + Sync {
    async fn is_caller_admin(&self) -> Result<bool>;
}

/// Supplies audit columns for rows about to be created
pub trait AuditFieldSource: Send + Sync {
    fn audit_fields_for_create(&self) -> AuditFields;
}

/// [`AdminProbe`] backed by the ambient [`RequestContext`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextAdminProbe;

#[async_trait]
impl AdminProbe for ContextAdminProbe {
    async fn is_caller_admin(&self) -> Result<bool> {
        current_caller()
            .map(|caller| caller.is_admin)
            .ok_or_else(|| RoleRefError::Internal("no authenticated caller in request context".to_string()))
    }
}

/// [`AuditFieldSource`] stamping the ambient caller and the current time
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextAuditFields;

impl AuditFieldSource for ContextAuditFields {
    fn audit_fields_for_create(&self) -> AuditFields {
        let user_id = current_caller().and_then(|c| c.user_id);
        AuditFields::created_by(user_id, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_caller_visible_inside_scope_only() {
        assert!(current_caller().is_none());

        let caller = scope(RequestContext::new(CallerIdentity::new(7, "alice")), async {
            current_caller()
        })
        .await;

        assert_eq!(caller.unwrap().login_id, "alice");
        assert!(current_caller().is_none());
    }

    #[tokio::test]
    async fn test_admin_probe() {
        let probe = ContextAdminProbe;

        assert!(probe.is_caller_admin().await.is_err());

        let admin = scope(RequestContext::new(CallerIdentity::admin(1, "root")), async {
            probe.is_caller_admin().await.unwrap()
        })
        .await;
        assert!(admin);

        let regular = scope(RequestContext::new(CallerIdentity::new(2, "bob")), async {
            probe.is_caller_admin().await.unwrap()
        })
        .await;
        assert!(!regular);
    }

    #[tokio::test]
    async fn test_bulk_mode_toggle() {
        let ctx = RequestContext::new(CallerIdentity::new(1, "svc")).with_bulk_mode(true);

        let (before, after) = scope(ctx, async {
            let before = is_bulk_mode();
            set_bulk_mode(false);
            (before, is_bulk_mode())
        })
        .await;

        assert!(before);
        assert!(!after);

        // Outside a scope the toggle is a no-op
        set_bulk_mode(true);
        assert!(!is_bulk_mode());
    }

    #[tokio::test]
    async fn test_audit_fields_use_caller() {
        let source = ContextAuditFields;

        let fields = scope(RequestContext::new(CallerIdentity::new(42, "carol")), async {
            source.audit_fields_for_create()
        })
        .await;

        assert_eq!(fields.added_by_id, Some(42));
        assert_eq!(fields.upd_by_id, Some(42));
        assert_eq!(fields.create_time, fields.update_time);

        assert_eq!(source.audit_fields_for_create().added_by_id, None);
    }
}
