//! Catalog and booking store adapters.
//!
//! The booking flow only sees these traits. There are no multi-document
//! transactions: a booking is one insert, a cancellation is one status update.

pub mod memory;
pub mod postgres;

use chrono::NaiveDate;
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    movie::default_movies, Booking, BookingFilter, BookingStatus, Movie, MovieInput, NewBooking,
    Screening,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record {0} not found")]
    NotFound(Uuid),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait CatalogStore: Send + Sync {
    fn list_movies(&self) -> BoxFuture<'_, StoreResult<Vec<Movie>>>;

    fn create_movie(&self, input: MovieInput) -> BoxFuture<'_, StoreResult<Movie>>;

    /// Полная перезапись полей фильма. `NotFound`, если id неизвестен.
    fn update_movie(&self, id: Uuid, input: MovieInput) -> BoxFuture<'_, StoreResult<Movie>>;

    fn delete_movie(&self, id: Uuid) -> BoxFuture<'_, StoreResult<()>>;
}

pub trait BookingStore: Send + Sync {
    /// Exact match on title, date and showtime, regardless of status.
    fn list_bookings_matching<'a>(
        &'a self,
        screening: &'a Screening,
    ) -> BoxFuture<'a, StoreResult<Vec<Booking>>>;

    fn list_bookings(&self, filter: BookingFilter) -> BoxFuture<'_, StoreResult<Vec<Booking>>>;

    fn create_booking(&self, booking: NewBooking) -> BoxFuture<'_, StoreResult<Booking>>;

    fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> BoxFuture<'_, StoreResult<()>>;
}

/// Заполняет пустой каталог фильмами по умолчанию.
pub async fn seed_default_movies(catalog: &dyn CatalogStore, today: NaiveDate) -> StoreResult<usize> {
    if !catalog.list_movies().await?.is_empty() {
        return Ok(0);
    }

    let defaults = default_movies(today);
    let count = defaults.len();
    for movie in defaults {
        catalog.create_movie(movie).await?;
    }
    info!("Seeded {} default movies", count);
    Ok(count)
}
