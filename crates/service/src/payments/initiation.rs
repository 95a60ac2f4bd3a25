//! Payment initiation workflows.
//!
//! Builds gateway requests from the school's fee configuration and appends a
//! payment attempt row that the webhook reconciliation later resolves by
//! reference.

use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use models::entitlement::{total_amount, Entitlement, FeeLines};
use models::payment_record::{self, RecordKind};
use models::{school, user};

use crate::errors::ServiceError;
use super::calculator::{MAX_TERM, MIN_TERM};
use super::gateway::{
    format_amount, CardDetails, CheckoutRequest, GatewayClient, SubscriptionRequest,
};

pub struct InitiationOutcome {
    pub reference: String,
    pub gateway_response: Value,
}

/// Refuse re-initiation for a term the user has already fully paid.
pub fn ensure_not_already_paid(
    entitlement: Option<&Entitlement>,
    term: i32,
) -> Result<(), ServiceError> {
    if let Some(ent) = entitlement {
        if ent.fully_paid && ent.term == term {
            return Err(ServiceError::Conflict(format!("term {term} is already fully paid")));
        }
    }
    Ok(())
}

/// Per-installment amount: a third of the total, rounded up to the nearest
/// whole major unit (100 minor units).
pub fn installment_amount(total: i64) -> i64 {
    let per = (total + 2) / 3;
    ((per + 99) / 100) * 100
}

struct PayerContext {
    user: user::Model,
    school: school::Model,
    fee_lines: FeeLines,
    total: i64,
}

async fn load_payer_context(
    db: &DatabaseConnection,
    user_id: Uuid,
    term: i32,
) -> Result<PayerContext, ServiceError> {
    if !(MIN_TERM..=MAX_TERM).contains(&term) {
        return Err(ServiceError::Validation(format!(
            "term must be in {MIN_TERM}..={MAX_TERM}"
        )));
    }
    let user = user::Entity::find_by_id(user_id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("user"))?;
    ensure_not_already_paid(user.entitlement.as_ref(), term)?;

    let school_id =
        user.school_id.ok_or_else(|| ServiceError::Validation("user has no school".into()))?;
    let school = school::Entity::find_by_id(school_id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("school"))?;

    let fee_lines = school.fee_lines.clone().unwrap_or_default();
    let total = total_amount(&fee_lines.0);
    if total <= 0 {
        return Err(ServiceError::Validation("school has no fee configuration".into()));
    }
    Ok(PayerContext { user, school, fee_lines, total })
}

/// Initiate a one-shot checkout for the full term fees.
#[instrument(skip(db, gateway))]
pub async fn initialize_checkout(
    db: &DatabaseConnection,
    gateway: &GatewayClient,
    user_id: Uuid,
    term: i32,
) -> Result<InitiationOutcome, ServiceError> {
    let ctx = load_payer_context(db, user_id, term).await?;
    let reference = Uuid::new_v4().to_string();
    let cfg = gateway.config();

    let mut request = CheckoutRequest {
        public_key: cfg.public_key.clone(),
        amount: format_amount(ctx.total),
        currency: cfg.currency.clone(),
        country: cfg.country.clone(),
        payment_reference: reference.clone(),
        email: ctx.user.email.clone(),
        product_id: ctx.school.id.to_string(),
        product_description: ctx.school.name.clone(),
        callback_url: cfg.callback_url.clone(),
        hash: None,
        hash_type: None,
    };
    let hash = gateway.generate_hash(&request).await?;
    request.hash = Some(hash);
    request.hash_type = Some("sha256".into());
    let gateway_response = gateway.initialize_checkout(&request).await?;

    payment_record::create_attempt(
        db,
        &reference,
        RecordKind::Full,
        ctx.fee_lines,
        &ctx.user.email,
        term,
    )
    .await?;
    info!(user_id = %user_id, %reference, amount = ctx.total, "checkout initiated");
    Ok(InitiationOutcome { reference, gateway_response })
}

/// Initiate a three-installment subscription billed monthly.
#[instrument(skip(db, gateway, card))]
pub async fn initialize_subscription(
    db: &DatabaseConnection,
    gateway: &GatewayClient,
    user_id: Uuid,
    term: i32,
    card: CardDetails,
) -> Result<InitiationOutcome, ServiceError> {
    let ctx = load_payer_context(db, user_id, term).await?;
    let reference = Uuid::new_v4().to_string();
    let cfg = gateway.config();

    let request = SubscriptionRequest {
        public_key: cfg.public_key.clone(),
        payment_reference: reference.clone(),
        amount: format_amount(installment_amount(ctx.total)),
        currency: cfg.currency.clone(),
        country: cfg.country.clone(),
        email: ctx.user.email.clone(),
        customer_id: ctx.user.id.to_string(),
        product_id: ctx.school.id.to_string(),
        product_description: ctx.school.name.clone(),
        callback_url: cfg.callback_url.clone(),
        billing_cycle: "MONTHLY".into(),
        billing_period: "3".into(),
        auth_type: "3DSECURE".into(),
        card,
    };
    let gateway_response = gateway.initialize_subscription(&request).await?;

    payment_record::create_attempt(
        db,
        &reference,
        RecordKind::Installment,
        ctx.fee_lines,
        &ctx.user.email,
        term,
    )
    .await?;
    info!(user_id = %user_id, %reference, "subscription initiated");
    Ok(InitiationOutcome { reference, gateway_response })
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::entitlement::FeeLine;

    #[test]
    fn installment_amount_rounds_up_to_major_unit() {
        // 500.00 total -> 166.67 per installment -> 167.00
        assert_eq!(installment_amount(50_000), 16_700);
        // exact thirds still round to whole major units
        assert_eq!(installment_amount(30_000), 10_000);
        assert_eq!(installment_amount(100), 100);
    }

    #[test]
    fn already_paid_guard_matches_term_only() {
        let ent = Entitlement {
            school: Uuid::new_v4(),
            fully_paid: true,
            installments_paid: 3,
            term: 1,
            fee_lines: vec![FeeLine { name: "tuition".into(), amount: 1 }],
        };
        assert!(ensure_not_already_paid(Some(&ent), 1).is_err());
        assert!(ensure_not_already_paid(Some(&ent), 2).is_ok());
        assert!(ensure_not_already_paid(None, 1).is_ok());
    }

    #[test]
    fn unsettled_entitlement_does_not_block() {
        let ent = Entitlement {
            school: Uuid::new_v4(),
            fully_paid: false,
            installments_paid: 2,
            term: 1,
            fee_lines: vec![],
        };
        assert!(ensure_not_already_paid(Some(&ent), 1).is_ok());
    }
}
