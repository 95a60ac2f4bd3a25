//! Record store abstraction for reconciliation.
//!
//! The store is the only synchronization point: marker uniqueness decides
//! duplicate deliveries, and the payer's `entitlement_version` guards against
//! lost updates when two reconciliations race on one user. `commit` performs
//! the entitlement write and the marker insert as one atomic step.

use async_trait::async_trait;
use uuid::Uuid;

use models::entitlement::{Entitlement, FeeLine};

use super::errors::PaymentError;

/// Business view of a payment attempt row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAttempt {
    pub reference: String,
    pub payer_email: String,
    pub term: i32,
    pub fee_lines: Vec<FeeLine>,
}

/// Business view of the paying user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payer {
    pub user_id: Uuid,
    pub school_id: Option<Uuid>,
    pub entitlement: Option<Entitlement>,
    pub entitlement_version: i32,
}

/// Result of an atomic entitlement-plus-marker commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Another writer advanced the payer's entitlement first; reload and retry.
    VersionConflict,
    /// The marker already exists; the event was applied by someone else.
    DuplicateMarker,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn marker_exists(&self, event_id: &str) -> Result<bool, PaymentError>;
    async fn find_attempt(&self, reference: &str) -> Result<Option<PaymentAttempt>, PaymentError>;
    async fn find_payer(&self, email: &str) -> Result<Option<Payer>, PaymentError>;

    /// Persist the next entitlement for `user_id` and insert the marker for
    /// `event_id` in one atomic step, guarded by `expected_version`.
    async fn commit(
        &self,
        user_id: Uuid,
        expected_version: i32,
        next: &Entitlement,
        event_id: &str,
    ) -> Result<CommitOutcome, PaymentError>;
}

/// Simple in-memory store for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Inner {
        markers: HashSet<String>,
        attempts: HashMap<String, PaymentAttempt>,
        payers: HashMap<String, Payer>, // keyed by email
    }

    #[derive(Default)]
    pub struct MemoryRecordStore {
        inner: Mutex<Inner>,
        /// Test hook: make the next N commits fail with a version conflict.
        forced_conflicts: AtomicUsize,
    }

    impl MemoryRecordStore {
        pub fn add_attempt(&self, attempt: PaymentAttempt) {
            let mut inner = self.inner.lock().unwrap();
            inner.attempts.insert(attempt.reference.clone(), attempt);
        }

        pub fn add_payer(&self, email: &str, payer: Payer) {
            let mut inner = self.inner.lock().unwrap();
            inner.payers.insert(email.to_string(), payer);
        }

        pub fn entitlement_of(&self, email: &str) -> Option<Entitlement> {
            let inner = self.inner.lock().unwrap();
            inner.payers.get(email).and_then(|p| p.entitlement.clone())
        }

        pub fn version_of(&self, email: &str) -> Option<i32> {
            let inner = self.inner.lock().unwrap();
            inner.payers.get(email).map(|p| p.entitlement_version)
        }

        pub fn marker_count(&self) -> usize {
            self.inner.lock().unwrap().markers.len()
        }

        pub fn force_version_conflicts(&self, n: usize) {
            self.forced_conflicts.store(n, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RecordStore for MemoryRecordStore {
        async fn marker_exists(&self, event_id: &str) -> Result<bool, PaymentError> {
            Ok(self.inner.lock().unwrap().markers.contains(event_id))
        }

        async fn find_attempt(
            &self,
            reference: &str,
        ) -> Result<Option<PaymentAttempt>, PaymentError> {
            Ok(self.inner.lock().unwrap().attempts.get(reference).cloned())
        }

        async fn find_payer(&self, email: &str) -> Result<Option<Payer>, PaymentError> {
            Ok(self.inner.lock().unwrap().payers.get(email).cloned())
        }

        async fn commit(
            &self,
            user_id: Uuid,
            expected_version: i32,
            next: &Entitlement,
            event_id: &str,
        ) -> Result<CommitOutcome, PaymentError> {
            if self
                .forced_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(CommitOutcome::VersionConflict);
            }

            let mut inner = self.inner.lock().unwrap();
            if inner.markers.contains(event_id) {
                return Ok(CommitOutcome::DuplicateMarker);
            }
            let payer = inner
                .payers
                .values_mut()
                .find(|p| p.user_id == user_id)
                .ok_or_else(|| PaymentError::Persistence("payer vanished".into()))?;
            if payer.entitlement_version != expected_version {
                return Ok(CommitOutcome::VersionConflict);
            }
            payer.entitlement = Some(next.clone());
            payer.entitlement_version += 1;
            inner.markers.insert(event_id.to_string());
            Ok(CommitOutcome::Committed)
        }
    }
}
