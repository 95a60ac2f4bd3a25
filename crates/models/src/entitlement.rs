//! Tuition entitlement document embedded in the `user` row.
//!
//! The entitlement is stored as a JSONB column and only ever replaced as a
//! whole under the row's `entitlement_version` guard. All amounts are integer
//! minor currency units; decimal formatting happens at the gateway boundary.

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One named fee item, amount in minor currency units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLine {
    pub name: String,
    pub amount: i64,
}

/// JSON column wrapper for an ordered fee breakdown.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct FeeLines(pub Vec<FeeLine>);

/// A user's current tuition-payment standing for a school/term.
///
/// `fully_paid` is true iff a one-shot payment was accepted or the third
/// installment settled the cycle; `installments_paid` never exceeds 3.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Entitlement {
    pub school: Uuid,
    pub fully_paid: bool,
    pub installments_paid: i32,
    pub term: i32,
    pub fee_lines: Vec<FeeLine>,
}

/// Sum of a fee breakdown in minor units.
pub fn total_amount(lines: &[FeeLine]) -> i64 {
    lines.iter().map(|l| l.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_amount_sums_minor_units() {
        let lines = vec![
            FeeLine { name: "tuition".into(), amount: 50_000 },
            FeeLine { name: "books".into(), amount: 12_050 },
        ];
        assert_eq!(total_amount(&lines), 62_050);
    }

    #[test]
    fn entitlement_round_trips_as_json() {
        let ent = Entitlement {
            school: Uuid::new_v4(),
            fully_paid: false,
            installments_paid: 2,
            term: 1,
            fee_lines: vec![FeeLine { name: "tuition".into(), amount: 50_000 }],
        };
        let json = serde_json::to_value(&ent).unwrap();
        assert_eq!(json["installments_paid"], 2);
        let back: Entitlement = serde_json::from_value(json).unwrap();
        assert_eq!(back, ent);
    }
}
