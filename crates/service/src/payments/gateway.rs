//! Payment gateway HTTP client.
//!
//! Thin JSON client over the provider's token, hash and transaction
//! endpoints. Amounts enter as integer minor units and leave on the wire as
//! decimal strings with exactly two fractional digits.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use configs::GatewayConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(String),
    #[error("unexpected gateway response: {0}")]
    UnexpectedResponse(String),
}

/// Format integer minor units as the gateway's decimal string, e.g.
/// `50000` -> `"500.00"`.
pub fn format_amount(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, minor % 100)
}

/// Checkout initiation payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub public_key: String,
    pub amount: String,
    pub currency: String,
    pub country: String,
    pub payment_reference: String,
    pub email: String,
    pub product_id: String,
    pub product_description: String,
    pub callback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_type: Option<String>,
}

/// Card details for a recurring subscription.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub card_name: String,
    pub card_number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
}

/// Recurring subscription initiation payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub public_key: String,
    pub payment_reference: String,
    pub amount: String,
    pub currency: String,
    pub country: String,
    pub email: String,
    pub customer_id: String,
    pub product_id: String,
    pub product_description: String,
    pub callback_url: String,
    pub billing_cycle: String,
    pub billing_period: String,
    #[serde(rename = "type")]
    pub auth_type: String,
    #[serde(flatten)]
    pub card: CardDetails,
}

pub struct GatewayClient {
    http: reqwest::Client,
    cfg: GatewayConfig,
}

impl GatewayClient {
    pub fn new(cfg: GatewayConfig) -> Self {
        Self { http: reqwest::Client::new(), cfg }
    }

    pub fn config(&self) -> &GatewayConfig { &self.cfg }

    async fn post_json(
        &self,
        path: &str,
        body: &impl Serialize,
        bearer: Option<&str>,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), path);
        debug!(%url, "gateway request");
        let mut req = self.http.post(&url).json(body);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|e| GatewayError::Http(e.to_string()))?;
        let status = resp.status();
        let json: Value =
            resp.json().await.map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;
        if !status.is_success() {
            return Err(GatewayError::UnexpectedResponse(format!(
                "status {status}: {json}"
            )));
        }
        Ok(json)
    }

    /// Exchange the key pair for an encrypted bearer token.
    #[instrument(skip(self))]
    pub async fn generate_token(&self) -> Result<Value, GatewayError> {
        let body = serde_json::json!({
            "key": format!("{}.{}", self.cfg.secret_key, self.cfg.public_key),
        });
        self.post_json("encrypt/keys", &body, None).await
    }

    /// Request the transaction hash the checkout call must carry.
    #[instrument(skip(self, request), fields(reference = %request.payment_reference))]
    pub async fn generate_hash(&self, request: &CheckoutRequest) -> Result<String, GatewayError> {
        let json = self.post_json("encrypt/hashs", request, None).await?;
        json.pointer("/data/hash/hash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::UnexpectedResponse("hash missing in response".into()))
    }

    /// Initiate a one-shot checkout transaction.
    #[instrument(skip(self, request), fields(reference = %request.payment_reference))]
    pub async fn initialize_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<Value, GatewayError> {
        self.post_json("payments", request, Some(&self.cfg.encrypted_key)).await
    }

    /// Initiate a recurring subscription.
    #[instrument(skip(self, request), fields(reference = %request.payment_reference))]
    pub async fn initialize_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<Value, GatewayError> {
        self.post_json("recurring/subscribes", request, Some(&self.cfg.encrypted_key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_amount_two_fractional_digits() {
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(1234), "12.34");
        assert_eq!(format_amount(50_000), "500.00");
        assert_eq!(format_amount(100_001), "1000.01");
    }

    #[test]
    fn checkout_request_serializes_camel_case() {
        let req = CheckoutRequest {
            public_key: "pk".into(),
            amount: format_amount(50_000),
            currency: "NGN".into(),
            country: "NG".into(),
            payment_reference: "ref".into(),
            email: "u@e.com".into(),
            product_id: "school".into(),
            product_description: "1".into(),
            callback_url: "http://localhost:5000".into(),
            hash: None,
            hash_type: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["publicKey"], "pk");
        assert_eq!(json["amount"], "500.00");
        assert_eq!(json["paymentReference"], "ref");
        assert!(json.get("hash").is_none());
    }

    #[test]
    fn subscription_request_flattens_card() {
        let req = SubscriptionRequest {
            public_key: "pk".into(),
            payment_reference: "ref".into(),
            amount: format_amount(17_000),
            currency: "NGN".into(),
            country: "NG".into(),
            email: "u@e.com".into(),
            customer_id: "cid".into(),
            product_id: "school".into(),
            product_description: "Some School".into(),
            callback_url: "http://localhost:5000".into(),
            billing_cycle: "MONTHLY".into(),
            billing_period: "3".into(),
            auth_type: "3DSECURE".into(),
            card: CardDetails {
                card_name: "ADA LOVELACE".into(),
                card_number: "5123450000000008".into(),
                expiry_month: "05".into(),
                expiry_year: "30".into(),
                cvv: "100".into(),
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["cardNumber"], "5123450000000008");
        assert_eq!(json["type"], "3DSECURE");
        assert_eq!(json["billingPeriod"], "3");
    }
}
