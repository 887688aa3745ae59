//! Квитанция на email через шаблоны Brevo.
//!
//! Отправка fire-and-forget: ошибка только логируется и никогда не мешает
//! показу билета.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::models::{seat::join_seats, Booking};
use crate::services::ticket::{format_naira, long_date};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("email request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("email provider returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Template params of the booking confirmation email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    #[serde(skip)]
    pub customer_email: String,
    pub customer_name: String,
    pub movie_title: String,
    pub seats: String,
    pub date: String,
    pub time: String,
    /// Уже отформатирована для письма: `₦8,000`.
    pub total_amount: String,
}

impl Receipt {
    pub fn for_booking(booking: &Booking) -> Self {
        Self {
            customer_email: booking.customer_email.clone(),
            customer_name: booking.customer_name.clone(),
            movie_title: booking.movie_title.clone(),
            seats: join_seats(&booking.seats),
            date: long_date(booking.date),
            time: booking.showtime.clone(),
            total_amount: format_naira(booking.total_amount),
        }
    }
}

pub trait ReceiptNotifier: Send + Sync {
    fn send<'a>(&'a self, receipt: &'a Receipt) -> BoxFuture<'a, Result<(), NotifyError>>;
}

/// Used when no Brevo key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

impl ReceiptNotifier for DisabledNotifier {
    fn send<'a>(&'a self, receipt: &'a Receipt) -> BoxFuture<'a, Result<(), NotifyError>> {
        async move {
            debug!(movie = %receipt.movie_title, "Receipt email disabled, skipping");
            Ok(())
        }
        .boxed()
    }
}

pub struct BrevoNotifier {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    template_id: i64,
    sender_name: String,
    sender_email: String,
}

impl BrevoNotifier {
    pub fn new(config: &NotificationConfig, api_key: String) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
            api_key,
            template_id: config.template_id,
            sender_name: config.sender_name.clone(),
            sender_email: config.sender_email.clone(),
        })
    }

    /// `DisabledNotifier` when the API key is absent.
    pub fn from_config(config: &NotificationConfig) -> Result<Arc<dyn ReceiptNotifier>, NotifyError> {
        match config.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Ok(Arc::new(Self::new(config, key.to_string())?)),
            None => Ok(Arc::new(DisabledNotifier)),
        }
    }
}

impl ReceiptNotifier for BrevoNotifier {
    fn send<'a>(&'a self, receipt: &'a Receipt) -> BoxFuture<'a, Result<(), NotifyError>> {
        async move {
            let body = json!({
                "sender": { "name": self.sender_name, "email": self.sender_email },
                "to": [{ "email": receipt.customer_email, "name": receipt.customer_name }],
                "templateId": self.template_id,
                "params": receipt,
            });

            let response = self
                .http_client
                .post(&self.api_url)
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(NotifyError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }
            info!(movie = %receipt.movie_title, "Receipt email sent");
            Ok(())
        }
        .boxed()
    }
}

/// Sends the receipt in the background.
pub fn spawn_receipt(notifier: Arc<dyn ReceiptNotifier>, receipt: Receipt) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&receipt).await {
            warn!(
                movie = %receipt.movie_title,
                seats = %receipt.seats,
                "Failed to send receipt email: {}",
                e
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, NewBooking};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    #[test]
    fn receipt_params_match_template() {
        let booking = Booking::from_new(
            Uuid::new_v4(),
            NewBooking {
                customer_name: "Ada".into(),
                customer_email: "ada@example.com".into(),
                customer_phone: "0800".into(),
                movie_title: "Cosmic Journey".into(),
                date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                showtime: "6:30 PM".into(),
                seats: ["A1".parse().unwrap(), "A2".parse().unwrap()].into_iter().collect(),
                total_amount: 12500,
                status: BookingStatus::Confirmed,
            },
            Utc::now(),
        );

        let params = serde_json::to_value(Receipt::for_booking(&booking)).unwrap();
        assert_eq!(
            params,
            json!({
                "customer_name": "Ada",
                "movie_title": "Cosmic Journey",
                "seats": "A1, A2",
                "date": "Saturday, March 1, 2025",
                "time": "6:30 PM",
                "total_amount": "₦12,500",
            })
        );
    }
}
