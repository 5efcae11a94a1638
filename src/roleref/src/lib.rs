//! # CretoAI Role Reference Reconciliation
//!
//! Keeps a role's denormalized join tables (role → users, role → groups,
//! role → nested roles) in sync with the role's declared membership.
//!
//! ## Features
//!
//! - **Purge-then-write** reconciliation of all three join tables
//! - **Strict or lazy** handling of unknown principals: reject with a
//!   verbatim message, or create them when the transaction commits
//! - **Commit-time queue** owned by the transaction, run in FIFO order
//! - **Single dispatch table** for per-kind lookup, creation and row writes
//! - **Async-first design** using Tokio runtime
//! - **JSON codec** for role-adjacent values with a fixed compact date format
//!
//! ## Example
//!
//! ```rust
//! use cretoai_roleref::context::{self, CallerIdentity, RequestContext};
//! use cretoai_roleref::store::UserRepository;
//! use cretoai_roleref::{InMemoryStore, ReconcilerConfig, Role, RoleRefService, UserRecord};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::new();
//!     store.repositories().users.create(UserRecord::external("alice")).await?;
//!
//!     let service = RoleRefService::local(&store, ReconcilerConfig::default());
//!     let role = Role::new("ops").with_id(10).with_users(["alice", "bob"]);
//!
//!     // bob is created when the transaction commits
//!     let summary = context::scope(
//!         RequestContext::new(CallerIdentity::admin(1, "admin")),
//!         service.apply(&role, true),
//!     )
//!     .await?;
//!
//!     assert_eq!(summary.associated, 1);
//!     assert_eq!(summary.deferred, 1);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod collaborators;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod purger;
pub mod reconcile;
pub mod resolver;
pub mod service;
pub mod store;
pub mod transaction;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use types::{
    AuditFields, GroupRecord, MemberSet, PrincipalKind, RecordId, Role, RoleMember, RoleRefRow,
    UserRecord,
};
pub use error::{Result, RoleRefError, StoreError};
pub use reconcile::{ReconcileSummary, ReconcilerConfig, RoleRefReconciler};
pub use service::RoleRefService;
pub use store::{InMemoryStore, Repositories};
pub use transaction::{Transaction, TransactionManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
