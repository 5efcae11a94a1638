//! Join-table purger

use crate::dispatch::DispatchTable;
use crate::error::Result;
use crate::types::RecordId;
use tracing::debug;

/// Deletes every join row of a role across the three join tables
#[derive(Clone)]
pub struct JoinTablePurger {
    table: DispatchTable,
}

impl JoinTablePurger {
    pub fn new(table: DispatchTable) -> Self {
        Self { table }
    }

    /// Remove all rows referencing `role_id`.
    ///
    /// Returns `false` without touching the store when `role_id` is `None`.
    /// Rows are fetched by id and deleted by id, so per-id caches in the store
    /// see every eviction.
    pub async fn purge(&self, role_id: Option<RecordId>) -> Result<bool> {
        let Some(role_id) = role_id else {
            return Ok(false);
        };

        for binding in self.table.bindings() {
            let refs = binding.ref_table();
            let ids = refs.find_ids_by_role_id(role_id).await?;
            let deleted = refs.delete_by_ids(&ids).await?;
            debug!(role_id, kind = %binding.kind(), deleted, "purged role refs");
        }

        Ok(true)
    }
}
