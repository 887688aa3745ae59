use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::seat::SeatId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

/// One showing of a movie: the `(movie title, date, showtime)` triple that
/// bookings are matched on. Title comparison is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Screening {
    pub movie_title: String,
    pub date: NaiveDate,
    pub showtime: String,
}

impl Screening {
    pub fn new(movie_title: impl Into<String>, date: NaiveDate, showtime: impl Into<String>) -> Self {
        Self {
            movie_title: movie_title.into(),
            date,
            showtime: showtime.into(),
        }
    }

    /// Точный ключ показа: title и showtime в base64 (URL-safe), без
    /// нормализации, как и сравнение в сверке мест. `:` в base64 не встречается.
    /// `Cosmic Journey` / 2025-03-01 / `6:30 PM` -> `Q29zbWljIEpvdXJuZXk:2025-03-01:NjozMCBQTQ`.
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            URL_SAFE_NO_PAD.encode(&self.movie_title),
            self.date.format("%Y-%m-%d"),
            URL_SAFE_NO_PAD.encode(&self.showtime)
        )
    }
}

/// A booking ready to be written. The movie title is a denormalized copy and
/// survives deletion of the movie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub movie_title: String,
    pub date: NaiveDate,
    pub showtime: String,
    pub seats: BTreeSet<SeatId>,
    pub total_amount: i64,
    pub status: BookingStatus,
}

impl NewBooking {
    pub fn screening(&self) -> Screening {
        Screening::new(self.movie_title.clone(), self.date, self.showtime.clone())
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub movie_title: String,
    pub date: NaiveDate,
    pub showtime: String,
    pub seats: BTreeSet<SeatId>,
    /// Сумма фиксируется при создании и больше не пересчитывается.
    pub total_amount: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn from_new(id: Uuid, new: NewBooking, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            customer_name: new.customer_name,
            customer_email: new.customer_email,
            customer_phone: new.customer_phone,
            movie_title: new.movie_title,
            date: new.date,
            showtime: new.showtime,
            seats: new.seats,
            total_amount: new.total_amount,
            status: new.status,
            created_at,
        }
    }

    pub fn screening(&self) -> Screening {
        Screening::new(self.movie_title.clone(), self.date, self.showtime.clone())
    }

    pub fn matches(&self, screening: &Screening) -> bool {
        self.movie_title == screening.movie_title
            && self.date == screening.date
            && self.showtime == screening.showtime
    }
}

/// Admin-side filter over all bookings. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookingFilter {
    pub date: Option<NaiveDate>,
    pub movie_title: Option<String>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.date.map_or(true, |d| booking.date == d)
            && self
                .movie_title
                .as_deref()
                .map_or(true, |t| booking.movie_title == t)
    }
}
