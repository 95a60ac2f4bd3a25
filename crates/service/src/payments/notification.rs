//! Gateway notification adapter.
//!
//! Translates the provider's webhook envelope into a normalized
//! [`GatewayNotification`]. Parsing performs no side effects; unknown event
//! types are reported as `UnsupportedEventType` so the caller can acknowledge
//! and skip them under at-least-once delivery.

use serde::{Deserialize, Serialize};

use super::errors::PaymentError;

/// Normalized payment event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    /// One-shot full payment.
    Single,
    /// First debit of an installment plan.
    RecurringFirst,
    /// Follow-up debit of an installment plan.
    RecurringDebit,
}

/// Normalized webhook event; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayNotification {
    pub event_id: String,
    pub event_type: EventType,
    pub reference: String,
    pub payer_email: String,
}

#[derive(Deserialize, Default)]
struct RawEnvelope {
    #[serde(default, rename = "notificationItems")]
    notification_items: Vec<RawItem>,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(rename = "notificationRequestItem")]
    request_item: RawRequestItem,
}

#[derive(Deserialize)]
struct RawRequestItem {
    #[serde(rename = "eventId")]
    event_id: Option<String>,
    #[serde(rename = "eventType")]
    event_type: Option<String>,
    #[serde(default)]
    data: RawData,
}

#[derive(Deserialize, Default)]
struct RawData {
    reference: Option<String>,
    #[serde(rename = "payerEmail")]
    payer_email: Option<String>,
}

fn required(field: Option<String>, name: &str) -> Result<String, PaymentError> {
    match field {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PaymentError::MalformedPayload(format!("missing {name}"))),
    }
}

/// Parse a raw webhook body into a normalized notification.
pub fn parse_notification(body: &[u8]) -> Result<GatewayNotification, PaymentError> {
    let envelope: RawEnvelope = serde_json::from_slice(body)
        .map_err(|e| PaymentError::MalformedPayload(e.to_string()))?;
    let item = envelope
        .notification_items
        .into_iter()
        .next()
        .ok_or_else(|| PaymentError::MalformedPayload("notificationItems empty".into()))?
        .request_item;

    let event_id = required(item.event_id, "eventId")?;
    let raw_type = required(item.event_type, "eventType")?;
    let reference = required(item.data.reference, "data.reference")?;
    let payer_email = required(item.data.payer_email, "data.payerEmail")?;

    let event_type = match raw_type.as_str() {
        "transaction" => EventType::Single,
        "transaction.recurrent" => EventType::RecurringFirst,
        "transaction.recurring.debit" => EventType::RecurringDebit,
        other => return Err(PaymentError::UnsupportedEventType(other.to_string())),
    };

    Ok(GatewayNotification {
        event_id,
        event_type,
        reference,
        payer_email: models::user::normalize_email(&payer_email),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(event_type: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "notificationItems": [{
                "notificationRequestItem": {
                    "eventId": "evt_123",
                    "eventType": event_type,
                    "data": {
                        "reference": "ref_456",
                        "payerEmail": "Payer@Example.com"
                    }
                }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn parses_each_known_event_type() {
        let cases = [
            ("transaction", EventType::Single),
            ("transaction.recurrent", EventType::RecurringFirst),
            ("transaction.recurring.debit", EventType::RecurringDebit),
        ];
        for (raw, expected) in cases {
            let n = parse_notification(&payload(raw)).unwrap();
            assert_eq!(n.event_type, expected, "for {raw}");
            assert_eq!(n.event_id, "evt_123");
            assert_eq!(n.reference, "ref_456");
            assert_eq!(n.payer_email, "payer@example.com");
        }
    }

    #[test]
    fn unknown_event_type_is_soft_rejected() {
        let err = parse_notification(&payload("transaction.refund")).unwrap_err();
        assert!(matches!(err, PaymentError::UnsupportedEventType(t) if t == "transaction.refund"));
    }

    #[test]
    fn missing_fields_are_malformed() {
        let body = serde_json::to_vec(&json!({
            "notificationItems": [{
                "notificationRequestItem": {
                    "eventType": "transaction",
                    "data": { "reference": "ref_456", "payerEmail": "p@e.com" }
                }
            }]
        }))
        .unwrap();
        let err = parse_notification(&body).unwrap_err();
        assert!(matches!(err, PaymentError::MalformedPayload(m) if m.contains("eventId")));
    }

    #[test]
    fn empty_envelope_is_malformed() {
        let err = parse_notification(br#"{"notificationItems": []}"#).unwrap_err();
        assert!(matches!(err, PaymentError::MalformedPayload(_)));
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = parse_notification(b"not json").unwrap_err();
        assert!(matches!(err, PaymentError::MalformedPayload(_)));
    }
}
