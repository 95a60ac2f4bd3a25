//! Reconciliation dispatcher.
//!
//! Orchestrates one webhook event: duplicate check, record and payer lookup,
//! calculator invocation, and the atomic commit. Safe under at-least-once
//! delivery and under concurrent delivery of the same event.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use models::entitlement::Entitlement;

use super::calculator::{next_entitlement, PaymentFacts};
use super::errors::PaymentError;
use super::notification::GatewayNotification;
use super::store::{CommitOutcome, RecordStore};

/// Bounded retries when a concurrent writer advances the payer's entitlement
/// between load and commit.
const MAX_VERSION_RETRIES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    /// The entitlement update was applied and the marker written.
    Applied(Entitlement),
    /// A marker for this event id already exists; nothing was changed.
    AlreadyProcessed,
}

pub struct ReconciliationDispatcher<S> {
    store: Arc<S>,
}

impl<S: RecordStore> ReconciliationDispatcher<S> {
    pub fn new(store: Arc<S>) -> Self { Self { store } }

    /// Apply one gateway notification exactly once.
    ///
    /// `UnknownReference` intentionally writes no marker: a record created
    /// after this delivery can still be reconciled by a later redelivery.
    #[instrument(skip(self, notification), fields(event_id = %notification.event_id, reference = %notification.reference))]
    pub async fn reconcile(
        &self,
        notification: &GatewayNotification,
    ) -> Result<ReconciliationOutcome, PaymentError> {
        if self.store.marker_exists(&notification.event_id).await? {
            info!("event already reconciled");
            return Ok(ReconciliationOutcome::AlreadyProcessed);
        }

        let attempt = self
            .store
            .find_attempt(&notification.reference)
            .await?
            .ok_or_else(|| PaymentError::UnknownReference {
                reference: notification.reference.clone(),
            })?;

        let mut payer = self
            .store
            .find_payer(&attempt.payer_email)
            .await?
            .ok_or_else(|| PaymentError::UnknownPayer { email: attempt.payer_email.clone() })?;

        for retry in 0..=MAX_VERSION_RETRIES {
            let school = payer
                .entitlement
                .as_ref()
                .map(|e| e.school)
                .or(payer.school_id)
                .ok_or_else(|| {
                    PaymentError::InvariantViolation(format!(
                        "payer {} has no school to entitle",
                        payer.user_id
                    ))
                })?;
            let facts = PaymentFacts {
                school,
                term: attempt.term,
                fee_lines: attempt.fee_lines.clone(),
            };
            let next = next_entitlement(payer.entitlement.as_ref(), notification.event_type, &facts)?;

            match self
                .store
                .commit(payer.user_id, payer.entitlement_version, &next, &notification.event_id)
                .await?
            {
                CommitOutcome::Committed => {
                    info!(
                        user_id = %payer.user_id,
                        installments = next.installments_paid,
                        fully_paid = next.fully_paid,
                        "entitlement reconciled"
                    );
                    return Ok(ReconciliationOutcome::Applied(next));
                }
                CommitOutcome::DuplicateMarker => {
                    info!("lost reconciliation race, event already applied");
                    return Ok(ReconciliationOutcome::AlreadyProcessed);
                }
                CommitOutcome::VersionConflict => {
                    warn!(retry, user_id = %payer.user_id, "entitlement version conflict");
                    payer = self
                        .store
                        .find_payer(&attempt.payer_email)
                        .await?
                        .ok_or_else(|| PaymentError::UnknownPayer {
                            email: attempt.payer_email.clone(),
                        })?;
                }
            }
        }

        Err(PaymentError::Persistence(format!(
            "entitlement version conflict persisted after {MAX_VERSION_RETRIES} retries"
        )))
    }
}
