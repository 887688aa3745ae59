//! payment.rs
//!
//! Платёжный делегат. Сам платёж проводит виджет Paystack на стороне клиента,
//! сервер только готовит попытку: сумму в копейках (kobo), валюту, email и
//! уникальную ссылку `ref_...`. Исход приходит обратно колбэком success/cancel.
//!
//! Если задан секретный ключ, транзакция заранее инициализируется через
//! `/transaction/initialize`. Сетевые вызовы идут через circuit breaker.

use failsafe::futures::CircuitBreaker as _;
use failsafe::{backoff, failure_policy, Config as BreakerConfig, StateMachine};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{CircuitBreakerConfig, PaymentConfig};
use crate::models::NewBooking;

/// Ошибки инициализации платёжного виджета. Пользователь может повторить.
#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),
    #[error("payment gateway error: {0}")]
    Gateway(String),
    #[error("payment gateway is temporarily unavailable")]
    CircuitOpen,
}

/// Одна попытка оплаты. Новая попытка всегда получает новую ссылку.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    /// В минимальных единицах валюты.
    pub amount: i64,
    pub currency: String,
    pub email: String,
    pub reference: String,
}

impl PaymentRequest {
    pub fn for_booking(draft: &NewBooking, reference: String, currency: &str) -> Self {
        Self {
            amount: draft.total_amount * 100,
            currency: currency.to_string(),
            email: draft.customer_email.clone(),
            reference,
        }
    }
}

pub fn new_reference() -> String {
    format!("ref_{}", Uuid::new_v4().simple())
}

/// What the client needs to open the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    pub reference: String,
    pub amount: i64,
    pub currency: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
}

impl PaymentIntent {
    pub fn inline(request: &PaymentRequest, public_key: Option<String>) -> Self {
        Self {
            reference: request.reference.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            email: request.email.clone(),
            public_key,
            authorization_url: None,
            access_code: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Cancel,
}

pub trait PaymentDelegate: Send + Sync {
    fn open<'a>(&'a self, request: &'a PaymentRequest) -> BoxFuture<'a, Result<PaymentIntent, DelegateError>>;
}

// --- Paystack API ---

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    email: &'a str,
    amount: i64,
    currency: &'a str,
    reference: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<InitializeData>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
}

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::Constant>, ()>;

/// Клиент Paystack.
#[derive(Clone)]
pub struct PaystackClient {
    http_client: reqwest::Client,
    base_url: String,
    public_key: Option<String>,
    secret_key: Option<String>,
    circuit_breaker: Breaker,
}

impl PaystackClient {
    pub fn new(config: &PaymentConfig, breaker: &CircuitBreakerConfig) -> Result<Self, DelegateError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DelegateError::Gateway(e.to_string()))?;

        let policy = failure_policy::consecutive_failures(
            breaker.failure_threshold,
            backoff::constant(Duration::from_secs(breaker.timeout_seconds)),
        );
        let circuit_breaker = BreakerConfig::new().failure_policy(policy).build();

        Ok(Self {
            http_client,
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            public_key: config.public_key.clone().filter(|k| !k.is_empty()),
            secret_key: config.secret_key.clone().filter(|k| !k.is_empty()),
            circuit_breaker,
        })
    }

    async fn initialize(&self, secret_key: &str, request: &PaymentRequest) -> Result<PaymentIntent, DelegateError> {
        let body = InitializeRequest {
            email: &request.email,
            amount: request.amount,
            currency: &request.currency,
            reference: &request.reference,
        };

        info!(
            reference = %request.reference,
            amount = request.amount,
            currency = %request.currency,
            "Initializing payment"
        );

        let call = async {
            self.http_client
                .post(format!("{}/transaction/initialize", self.base_url))
                .bearer_auth(secret_key)
                .json(&body)
                .send()
                .await?
                .json::<InitializeResponse>()
                .await
        };

        let response = match self.circuit_breaker.call(call).await {
            Ok(response) => response,
            Err(failsafe::Error::Rejected) => {
                warn!("Circuit breaker is open, payment gateway request blocked");
                return Err(DelegateError::CircuitOpen);
            }
            Err(failsafe::Error::Inner(e)) => {
                error!("Payment gateway request failed: {}", e);
                return Err(DelegateError::Gateway(e.to_string()));
            }
        };

        match response {
            InitializeResponse {
                status: true,
                data: Some(data),
                ..
            } => Ok(PaymentIntent {
                authorization_url: Some(data.authorization_url),
                access_code: Some(data.access_code),
                ..PaymentIntent::inline(request, self.public_key.clone())
            }),
            InitializeResponse { message, .. } => {
                warn!(reference = %request.reference, "Payment gateway rejected initialize: {}", message);
                Err(DelegateError::Rejected(message))
            }
        }
    }
}

impl PaymentDelegate for PaystackClient {
    fn open<'a>(&'a self, request: &'a PaymentRequest) -> BoxFuture<'a, Result<PaymentIntent, DelegateError>> {
        async move {
            match &self.secret_key {
                Some(secret) => self.initialize(secret, request).await,
                // без секретного ключа виджет открывается только с публичным ключом
                None => {
                    if self.public_key.is_none() {
                        return Err(DelegateError::Rejected("payment is not configured".into()));
                    }
                    Ok(PaymentIntent::inline(request, self.public_key.clone()))
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use chrono::NaiveDate;

    fn draft(total: i64) -> NewBooking {
        NewBooking {
            customer_name: "Ada".into(),
            customer_email: "ada@example.com".into(),
            customer_phone: "0800".into(),
            movie_title: "Cosmic Journey".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            showtime: "6:30 PM".into(),
            seats: ["A1".parse().unwrap()].into_iter().collect(),
            total_amount: total,
            status: BookingStatus::Pending,
        }
    }

    #[test]
    fn amount_is_sent_in_kobo() {
        let request = PaymentRequest::for_booking(&draft(8000), "ref_x".into(), "NGN");
        assert_eq!(request.amount, 800_000);
        assert_eq!(request.currency, "NGN");
        assert_eq!(request.email, "ada@example.com");
    }

    #[test]
    fn references_are_fresh() {
        let a = new_reference();
        let b = new_reference();
        assert!(a.starts_with("ref_"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn inline_intent_without_secret_key() {
        let config = PaymentConfig {
            public_key: Some("pk_test_1".into()),
            secret_key: None,
            gateway_url: "http://localhost".into(),
            currency: "NGN".into(),
        };
        let breaker = CircuitBreakerConfig {
            failure_threshold: 3,
            timeout_seconds: 60,
        };
        let client = PaystackClient::new(&config, &breaker).unwrap();
        let request = PaymentRequest::for_booking(&draft(2500), new_reference(), "NGN");
        let intent = client.open(&request).await.unwrap();
        assert_eq!(intent.public_key.as_deref(), Some("pk_test_1"));
        assert_eq!(intent.amount, 250_000);
        assert!(intent.authorization_url.is_none());
    }

    #[tokio::test]
    async fn unconfigured_gateway_is_rejected() {
        let config = PaymentConfig {
            public_key: None,
            secret_key: None,
            gateway_url: "http://localhost".into(),
            currency: "NGN".into(),
        };
        let breaker = CircuitBreakerConfig {
            failure_threshold: 3,
            timeout_seconds: 60,
        };
        let client = PaystackClient::new(&config, &breaker).unwrap();
        let request = PaymentRequest::for_booking(&draft(2500), new_reference(), "NGN");
        assert!(matches!(client.open(&request).await, Err(DelegateError::Rejected(_))));
    }
}
