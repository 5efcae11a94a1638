//! Join-table writer

use crate::context::AuditFieldSource;
use crate::dispatch::DispatchTable;
use crate::error::Result;
use crate::types::{AuditFields, PrincipalKind, RecordId, RoleRefRow, EXTERNAL_PRINCIPAL_TYPE};
use std::sync::Arc;
use tracing::debug;

/// Inserts one join row per `(role, principal)` association.
///
/// Does not check for duplicates; callers purge the role's rows first.
#[derive(Clone)]
pub struct JoinTableWriter {
    table: DispatchTable,
    audit: Arc<dyn AuditFieldSource>,
}

impl JoinTableWriter {
    pub fn new(table: DispatchTable, audit: Arc<dyn AuditFieldSource>) -> Self {
        Self { table, audit }
    }

    /// Write a row stamped with audit fields taken now
    pub async fn associate(
        &self,
        kind: PrincipalKind,
        role_id: RecordId,
        principal_id: RecordId,
        principal_name: &str,
    ) -> Result<RoleRefRow> {
        let audit = self.audit.audit_fields_for_create();
        self.associate_with(kind, role_id, principal_id, principal_name, audit)
            .await
    }

    /// Write a row stamped with previously captured audit fields
    pub async fn associate_with(
        &self,
        kind: PrincipalKind,
        role_id: RecordId,
        principal_id: RecordId,
        principal_name: &str,
        audit: AuditFields,
    ) -> Result<RoleRefRow> {
        debug!(role_id, %kind, principal_name, principal_id, "==> create role association");

        let row = RoleRefRow {
            id: None,
            kind,
            role_id,
            principal_id,
            principal_name: principal_name.to_string(),
            principal_type: EXTERNAL_PRINCIPAL_TYPE,
            audit,
        };
        let row = self.table.binding(kind).write_row(row).await?;

        debug!(role_id, %kind, principal_name, row_id = ?row.id, "<== create role association");
        Ok(row)
    }

    /// Audit fields as the ambient source would stamp them right now
    pub fn capture_audit_fields(&self) -> AuditFields {
        self.audit.audit_fields_for_create()
    }
}
