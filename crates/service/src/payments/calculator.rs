//! Entitlement state calculator.
//!
//! Pure transition function from (current entitlement, accepted notification)
//! to the next entitlement. Every transition is enumerable here; the
//! dispatcher owns all I/O.

use uuid::Uuid;

use models::entitlement::{Entitlement, FeeLine};

use super::errors::PaymentError;
use super::notification::EventType;

/// Terminal installment count: the third debit settles the cycle.
pub const SETTLED_INSTALLMENTS: i32 = 3;

pub const MIN_TERM: i32 = 1;
pub const MAX_TERM: i32 = 3;

/// Facts taken from the payment attempt record backing a notification.
#[derive(Debug, Clone)]
pub struct PaymentFacts {
    pub school: Uuid,
    pub term: i32,
    pub fee_lines: Vec<FeeLine>,
}

/// Compute the next entitlement.
///
/// A settled entitlement observed with a different term starts a fresh cycle
/// instead of mutating the settled one; that is also the only path on which
/// the `school` field may change.
pub fn next_entitlement(
    current: Option<&Entitlement>,
    event_type: EventType,
    facts: &PaymentFacts,
) -> Result<Entitlement, PaymentError> {
    if !(MIN_TERM..=MAX_TERM).contains(&facts.term) {
        return Err(PaymentError::InvariantViolation(format!(
            "term {} out of range {MIN_TERM}..={MAX_TERM}",
            facts.term
        )));
    }
    if facts.fee_lines.iter().any(|l| l.amount < 0) {
        return Err(PaymentError::InvariantViolation("negative fee amount".into()));
    }

    // Fresh cycle: a settled entitlement for another term is superseded, not
    // mutated.
    let current = current.filter(|c| !(c.fully_paid && c.term != facts.term));
    let school = current.map(|c| c.school).unwrap_or(facts.school);

    let (installments_paid, fully_paid) = match event_type {
        EventType::Single => (current.map(|c| c.installments_paid).unwrap_or(0), true),
        EventType::RecurringFirst => (1, false),
        EventType::RecurringDebit => {
            let next = current.map(|c| c.installments_paid).unwrap_or(0) + 1;
            if next > SETTLED_INSTALLMENTS {
                return Err(PaymentError::InvariantViolation(format!(
                    "installments_paid would exceed {SETTLED_INSTALLMENTS}"
                )));
            }
            (next, next == SETTLED_INSTALLMENTS)
        }
    };

    Ok(Entitlement {
        school,
        fully_paid,
        installments_paid,
        term: facts.term,
        fee_lines: facts.fee_lines.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(term: i32) -> PaymentFacts {
        PaymentFacts {
            school: Uuid::new_v4(),
            term,
            fee_lines: vec![FeeLine { name: "tuition".into(), amount: 50_000 }],
        }
    }

    fn entitlement(school: Uuid, installments: i32, fully_paid: bool, term: i32) -> Entitlement {
        Entitlement {
            school,
            fully_paid,
            installments_paid: installments,
            term,
            fee_lines: vec![],
        }
    }

    #[test]
    fn single_payment_with_no_prior_entitlement() {
        let f = facts(2);
        let next = next_entitlement(None, EventType::Single, &f).unwrap();
        assert!(next.fully_paid);
        assert_eq!(next.installments_paid, 0);
        assert_eq!(next.term, 2);
        assert_eq!(next.school, f.school);
        assert_eq!(next.fee_lines, f.fee_lines);
    }

    #[test]
    fn recurring_first_always_sets_one_installment() {
        let f = facts(1);
        let cur = entitlement(f.school, 2, false, 1);
        let next = next_entitlement(Some(&cur), EventType::RecurringFirst, &f).unwrap();
        assert_eq!(next.installments_paid, 1);
        assert!(!next.fully_paid);
    }

    #[test]
    fn recurring_debit_increments() {
        let f = facts(1);
        let cur = entitlement(f.school, 1, false, 1);
        let next = next_entitlement(Some(&cur), EventType::RecurringDebit, &f).unwrap();
        assert_eq!(next.installments_paid, 2);
        assert!(!next.fully_paid);
    }

    #[test]
    fn third_debit_settles() {
        let f = facts(1);
        let cur = entitlement(f.school, 2, false, 1);
        let next = next_entitlement(Some(&cur), EventType::RecurringDebit, &f).unwrap();
        assert_eq!(next.installments_paid, SETTLED_INSTALLMENTS);
        assert!(next.fully_paid);
    }

    #[test]
    fn debit_past_settlement_is_invariant_violation() {
        let f = facts(1);
        let cur = entitlement(f.school, SETTLED_INSTALLMENTS, true, 1);
        let err = next_entitlement(Some(&cur), EventType::RecurringDebit, &f).unwrap_err();
        assert!(matches!(err, PaymentError::InvariantViolation(_)));
    }

    #[test]
    fn settled_entitlement_with_new_term_starts_fresh_cycle() {
        let old_school = Uuid::new_v4();
        let f = facts(2);
        let cur = entitlement(old_school, SETTLED_INSTALLMENTS, true, 1);

        let next = next_entitlement(Some(&cur), EventType::RecurringFirst, &f).unwrap();
        assert_eq!(next.installments_paid, 1);
        assert!(!next.fully_paid);
        assert_eq!(next.term, 2);
        // fresh cycle is the one case allowed to move the school reference
        assert_eq!(next.school, f.school);
    }

    #[test]
    fn unsettled_entitlement_keeps_its_school() {
        let old_school = Uuid::new_v4();
        let f = facts(1);
        let cur = entitlement(old_school, 1, false, 1);
        let next = next_entitlement(Some(&cur), EventType::RecurringDebit, &f).unwrap();
        assert_eq!(next.school, old_school);
    }

    #[test]
    fn single_after_settled_other_term_restarts() {
        let f = facts(3);
        let cur = entitlement(Uuid::new_v4(), SETTLED_INSTALLMENTS, true, 1);
        let next = next_entitlement(Some(&cur), EventType::Single, &f).unwrap();
        assert!(next.fully_paid);
        assert_eq!(next.installments_paid, 0);
        assert_eq!(next.term, 3);
    }

    #[test]
    fn out_of_range_term_rejected() {
        let mut f = facts(1);
        f.term = 4;
        let err = next_entitlement(None, EventType::Single, &f).unwrap_err();
        assert!(matches!(err, PaymentError::InvariantViolation(_)));
    }

    #[test]
    fn negative_fee_amount_rejected() {
        let mut f = facts(1);
        f.fee_lines[0].amount = -1;
        let err = next_entitlement(None, EventType::Single, &f).unwrap_err();
        assert!(matches!(err, PaymentError::InvariantViolation(_)));
    }

    #[test]
    fn installment_sequence_settles_exactly_at_three() {
        let f = facts(1);
        let mut cur: Option<Entitlement> = None;
        let sequence = [
            EventType::RecurringFirst,
            EventType::RecurringDebit,
            EventType::RecurringDebit,
        ];
        for (i, ev) in sequence.into_iter().enumerate() {
            let next = next_entitlement(cur.as_ref(), ev, &f).unwrap();
            assert_eq!(next.installments_paid, i as i32 + 1);
            assert_eq!(next.fully_paid, i == 2);
            cur = Some(next);
        }
    }
}
