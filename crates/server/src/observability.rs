use once_cell::sync::Lazy;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

// Prometheus metrics (default registry)
pub static WEBHOOK_EVENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "school_api_webhook_events_total",
        "Total gateway webhook deliveries received"
    )
    .expect("register webhook_events_total")
});

pub static RECONCILE_APPLIED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "school_api_reconcile_applied_total",
        "Webhook events that updated an entitlement"
    )
    .expect("register reconcile_applied_total")
});

pub static RECONCILE_DUPLICATE_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "school_api_reconcile_duplicate_total",
        "Webhook events skipped as already processed"
    )
    .expect("register reconcile_duplicate_total")
});

pub static RECONCILE_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "school_api_reconcile_skipped_total",
        "Webhook deliveries acked without processing (malformed/unsupported)"
    )
    .expect("register reconcile_skipped_total")
});

pub static RECONCILE_FAILED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "school_api_reconcile_failed_total",
        "Webhook events whose reconciliation errored"
    )
    .expect("register reconcile_failed_total")
});

/// Text-format metrics endpoint over the default registry.
pub async fn metrics_handler() -> String {
    let metrics = prometheus::gather();
    let mut buf = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&metrics, &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_appear_in_encoded_output() {
        WEBHOOK_EVENTS_TOTAL.inc();
        RECONCILE_APPLIED_TOTAL.inc();
        let body = metrics_handler().await;
        assert!(body.contains("school_api_webhook_events_total"));
        assert!(body.contains("school_api_reconcile_applied_total"));
    }
}
