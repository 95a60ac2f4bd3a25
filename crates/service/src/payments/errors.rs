use thiserror::Error;

/// Business errors for webhook reconciliation.
///
/// `UnsupportedEventType` is soft: the caller acknowledges the delivery and
/// skips it. `Persistence` is transient and safe to retry via gateway
/// redelivery because applied events leave a marker behind.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("malformed gateway payload: {0}")]
    MalformedPayload(String),
    #[error("unsupported gateway event type: {0}")]
    UnsupportedEventType(String),
    #[error("no payment record for reference {reference}")]
    UnknownReference { reference: String },
    #[error("no user found for payer {email}")]
    UnknownPayer { email: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("entitlement invariant violated: {0}")]
    InvariantViolation(String),
}

impl PaymentError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            PaymentError::MalformedPayload(_) => 1301,
            PaymentError::UnsupportedEventType(_) => 1302,
            PaymentError::UnknownReference { .. } => 1303,
            PaymentError::UnknownPayer { .. } => 1304,
            PaymentError::Persistence(_) => 1400,
            PaymentError::InvariantViolation(_) => 1401,
        }
    }

    /// Whether gateway redelivery of the same event may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Persistence(_))
    }
}
