use chrono::{DateTime, Utc};
use serde::Serialize;

/// A processed payment-gateway callback, keyed by the gateway's reference.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentRow {
    pub payment_ref: String,
    pub application_id: String,
    pub amount_cents: i64,
    pub received_at: DateTime<Utc>,
}
