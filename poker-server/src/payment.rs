//! The payment-provider interface. The real HTTP client against a
//! third-party processor is out of scope; this crate only needs the
//! trait plus a deterministic sandbox so the deposit/withdrawal
//! lifecycle is exercisable end to end in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Created,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order_id: String,
    pub approval_url: String,
}

#[derive(Debug, Clone)]
pub struct CapturedOrder {
    pub status: OrderStatus,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct Payout {
    pub batch_id: String,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentError(pub String);

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for PaymentError {}

/// Token lifetime is managed with a safety margin of at least 60s before
/// the advertised expiry — concrete providers are expected to refresh
/// their bearer token whenever `expires_at - now < margin`.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_order(&self, amount: i64, currency: &str, description: &str) -> Result<CreatedOrder, PaymentError>;
    async fn get_order(&self, order_id: &str) -> Result<OrderStatus, PaymentError>;
    async fn capture_order(&self, order_id: &str) -> Result<CapturedOrder, PaymentError>;
    async fn send_payout(&self, destination: &str, amount: i64, currency: &str) -> Result<Payout, PaymentError>;
}

/// Deterministic in-memory provider for tests and local development:
/// every order it creates can be captured exactly once, and every payout
/// immediately "succeeds".
pub struct SandboxPaymentProvider {
    return_url_scheme: String,
    orders: Mutex<HashMap<String, (i64, OrderStatus)>>,
    next_id: Mutex<u64>,
}

impl SandboxPaymentProvider {
    pub fn new(return_url_scheme: impl Into<String>) -> Self {
        Self {
            return_url_scheme: return_url_scheme.into(),
            orders: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let mut guard = self.next_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        format!("{prefix}-{id}")
    }
}

#[async_trait]
impl PaymentProvider for SandboxPaymentProvider {
    async fn create_order(&self, amount: i64, _currency: &str, _description: &str) -> Result<CreatedOrder, PaymentError> {
        let order_id = self.fresh_id("order");
        self.orders.lock().unwrap().insert(order_id.clone(), (amount, OrderStatus::Created));
        let approval_url = format!("{}/approve/{}", self.return_url_scheme, order_id);
        Ok(CreatedOrder { order_id, approval_url })
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderStatus, PaymentError> {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .map(|(_, s)| *s)
            .ok_or_else(|| PaymentError(format!("unknown order {order_id}")))
    }

    async fn capture_order(&self, order_id: &str) -> Result<CapturedOrder, PaymentError> {
        let mut orders = self.orders.lock().unwrap();
        let entry = orders.get_mut(order_id).ok_or_else(|| PaymentError(format!("unknown order {order_id}")))?;
        entry.1 = OrderStatus::Completed;
        Ok(CapturedOrder { status: OrderStatus::Completed, amount: entry.0, currency: "USD".to_string() })
    }

    async fn send_payout(&self, _destination: &str, _amount: i64, _currency: &str) -> Result<Payout, PaymentError> {
        Ok(Payout { batch_id: self.fresh_id("payout"), status: OrderStatus::Completed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capture_requires_an_existing_order() {
        let provider = SandboxPaymentProvider::new("pokerapp://payment");
        let err = provider.capture_order("nonexistent").await.unwrap_err();
        assert_eq!(err.0, "unknown order nonexistent");
    }

    #[tokio::test]
    async fn created_order_captures_for_the_same_amount() {
        let provider = SandboxPaymentProvider::new("pokerapp://payment");
        let order = provider.create_order(1000, "USD", "deposit").await.unwrap();
        let captured = provider.capture_order(&order.order_id).await.unwrap();
        assert_eq!(captured.amount, 1000);
        assert_eq!(captured.status, OrderStatus::Completed);
    }

    #[test]
    fn token_refresh_margin_is_at_least_sixty_seconds() {
        assert!(TOKEN_REFRESH_MARGIN >= Duration::from_secs(60));
    }
}
