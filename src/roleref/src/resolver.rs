//! Principal resolution
//!
//! Maps `(kind, name)` to a principal id, optionally creating the principal
//! through the kind's collaborator. Holds no caches: every call consults the
//! store.

use crate::dispatch::DispatchTable;
use crate::error::Result;
use crate::types::{PrincipalKind, RecordId};
use tracing::{debug, warn};

/// Resolves principals through a [`DispatchTable`]
#[derive(Clone)]
pub struct PrincipalResolver {
    table: DispatchTable,
}

impl PrincipalResolver {
    pub fn new(table: DispatchTable) -> Self {
        Self { table }
    }

    /// Id of the principal `(kind, name)`.
    ///
    /// With `create_if_absent`, a missing principal is created first. `None`
    /// means the principal does not exist and could not be created; creation
    /// failures are only told apart from "not found" in the logs.
    pub async fn resolve(
        &self,
        kind: PrincipalKind,
        name: &str,
        create_if_absent: bool,
    ) -> Result<Option<RecordId>> {
        debug!(%kind, name, create_if_absent, "==> resolve principal");
        let binding = self.table.binding(kind);

        let id = match binding.lookup(name).await? {
            Some(found) => Some(found.id),
            None if create_if_absent => {
                warn!(
                    %kind,
                    name,
                    "principal specified in role does not exist, creating new {}",
                    kind
                );
                binding.create(name).await?
            }
            None => None,
        };

        debug!(%kind, name, create_if_absent, ?id, "<== resolve principal");
        Ok(id)
    }
}
