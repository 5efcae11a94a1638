//! Transactions and commit-time actions
//!
//! A [`Transaction`] owns a FIFO [`CommitQueue`]. Work registered with
//! [`Transaction::register_commit_action`] runs when the transaction commits,
//! inside the same unit of work: the first failing action discards the rest
//! and rolls the store back. Rolling back discards queued actions unrun.

use crate::error::{Result, StoreResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Store side of a unit of work
#[async_trait]
pub trait TransactionHandle: Send {
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// A store that can open units of work
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn TransactionHandle>>;
}

/// Work to run when the owning transaction commits
#[async_trait]
pub trait CommitAction: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    async fn run(&self) -> Result<()>;
}

/// Ordered commit-time actions of one transaction
#[derive(Default)]
pub struct CommitQueue {
    actions: VecDeque<Box<dyn CommitAction>>,
}

impl CommitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: Box<dyn CommitAction>) {
        self.actions.push_back(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action in enqueue order, releasing each after it runs.
    ///
    /// Stops at the first failure; actions behind it are dropped unrun.
    pub async fn drain(&mut self) -> Result<usize> {
        let mut executed = 0;
        while let Some(action) = self.actions.pop_front() {
            if let Err(e) = action.run().await {
                let discarded = self.actions.len();
                self.actions.clear();
                warn!(
                    action = %action.describe(),
                    discarded,
                    "commit action failed: {}", e
                );
                return Err(e);
            }
            executed += 1;
        }
        Ok(executed)
    }

    /// Drop all queued actions without running them
    pub fn discard(&mut self) -> usize {
        let n = self.actions.len();
        self.actions.clear();
        n
    }
}

impl fmt::Debug for CommitQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.actions.iter().map(|a| a.describe()))
            .finish()
    }
}

/// An open unit of work plus its commit queue
pub struct Transaction {
    id: Uuid,
    queue: CommitQueue,
    handle: Box<dyn TransactionHandle>,
}

impl Transaction {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Register `action` to run when this transaction commits
    pub fn register_commit_action(&mut self, action: Box<dyn CommitAction>) {
        debug!(tx = %self.id, action = %action.describe(), "registered commit action");
        self.queue.register(action);
    }

    pub fn pending_actions(&self) -> usize {
        self.queue.len()
    }

    /// Run the commit queue, then commit the store.
    ///
    /// Returns the number of commit actions executed. If an action fails the
    /// store is rolled back and the action's error returned.
    pub async fn commit(mut self) -> Result<usize> {
        match self.queue.drain().await {
            Ok(executed) => {
                self.handle.commit().await?;
                debug!(tx = %self.id, executed, "transaction committed");
                Ok(executed)
            }
            Err(e) => {
                if let Err(rb) = self.handle.rollback().await {
                    warn!(tx = %self.id, "rollback after failed commit action also failed: {}", rb);
                }
                Err(e)
            }
        }
    }

    /// Discard queued actions and undo the unit of work
    pub async fn rollback(mut self) -> Result<()> {
        let discarded = self.queue.discard();
        self.handle.rollback().await?;
        debug!(tx = %self.id, discarded, "transaction rolled back");
        Ok(())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("queue", &self.queue)
            .finish()
    }
}

/// Opens transactions against a store
#[derive(Clone)]
pub struct TransactionManager {
    store: Arc<dyn TransactionalStore>,
}

impl TransactionManager {
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }

    pub async fn begin(&self) -> Result<Transaction> {
        let handle = self.store.begin().await?;
        let tx = Transaction {
            id: Uuid::new_v4(),
            queue: CommitQueue::new(),
            handle,
        };
        debug!(tx = %tx.id, "transaction started");
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoleRefError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandle {
        outcome: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl TransactionHandle for RecordingHandle {
        async fn commit(self: Box<Self>) -> StoreResult<()> {
            self.outcome.lock().unwrap().push("commit");
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> StoreResult<()> {
            self.outcome.lock().unwrap().push("rollback");
            Ok(())
        }
    }

    struct RecordingStore {
        outcome: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl TransactionalStore for RecordingStore {
        async fn begin(&self) -> StoreResult<Box<dyn TransactionHandle>> {
            Ok(Box::new(RecordingHandle {
                outcome: self.outcome.clone(),
            }))
        }
    }

    struct Step {
        label: usize,
        fail: bool,
        log: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl CommitAction for Step {
        fn describe(&self) -> String {
            format!("step-{}", self.label)
        }

        async fn run(&self) -> Result<()> {
            self.log.lock().unwrap().push(self.label);
            if self.fail {
                Err(RoleRefError::DeferredFailure(format!("step {} failed", self.label)))
            } else {
                Ok(())
            }
        }
    }

    fn manager() -> (TransactionManager, Arc<Mutex<Vec<&'static str>>>) {
        let outcome = Arc::new(Mutex::new(Vec::new()));
        let store = RecordingStore {
            outcome: outcome.clone(),
        };
        (TransactionManager::new(Arc::new(store)), outcome)
    }

    #[tokio::test]
    async fn test_actions_run_fifo_then_commit() {
        let (manager, outcome) = manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut tx = manager.begin().await.unwrap();
        for label in 0..3 {
            tx.register_commit_action(Box::new(Step { label, fail: false, log: log.clone() }));
        }
        assert_eq!(tx.pending_actions(), 3);

        let executed = tx.commit().await.unwrap();
        assert_eq!(executed, 3);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(*outcome.lock().unwrap(), vec!["commit"]);
    }

    #[tokio::test]
    async fn test_failed_action_aborts_rest_and_rolls_back() {
        let (manager, outcome) = manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut tx = manager.begin().await.unwrap();
        tx.register_commit_action(Box::new(Step { label: 0, fail: false, log: log.clone() }));
        tx.register_commit_action(Box::new(Step { label: 1, fail: true, log: log.clone() }));
        tx.register_commit_action(Box::new(Step { label: 2, fail: false, log: log.clone() }));

        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, RoleRefError::DeferredFailure(_)));
        assert_eq!(*log.lock().unwrap(), vec![0, 1]);
        assert_eq!(*outcome.lock().unwrap(), vec!["rollback"]);
    }

    #[tokio::test]
    async fn test_rollback_discards_actions() {
        let (manager, outcome) = manager();
        let ran = Arc::new(AtomicUsize::new(0));

        struct Counter(Arc<AtomicUsize>);

        #[async_trait]
        impl CommitAction for Counter {
            fn describe(&self) -> String {
                "counter".to_string()
            }

            async fn run(&self) -> Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let mut tx = manager.begin().await.unwrap();
        tx.register_commit_action(Box::new(Counter(ran.clone())));
        tx.rollback().await.unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(*outcome.lock().unwrap(), vec!["rollback"]);
    }

    #[tokio::test]
    async fn test_transaction_ids_are_unique() {
        let (manager, _) = manager();
        let a = manager.begin().await.unwrap();
        let b = manager.begin().await.unwrap();
        assert_ne!(a.id(), b.id());
    }
}
