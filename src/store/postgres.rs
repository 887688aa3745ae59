use chrono::{DateTime, NaiveDate, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeSet;
use tracing::warn;
use uuid::Uuid;

use super::{BookingStore, CatalogStore, StoreError, StoreResult};
use crate::models::{
    Booking, BookingFilter, BookingStatus, Movie, MovieInput, MovieStatus, NewBooking, Screening, SeatId,
};

const MOVIE_COLUMNS: &str =
    "id, title, image, rating, duration, genre, showtimes, status, release_date, end_date";

const BOOKING_COLUMNS: &str = "id, customer_name, customer_email, customer_phone, movie_title, \
     date, showtime, seats, total_amount, status, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Строки из БД; статусы хранятся как TEXT
#[derive(FromRow)]
struct MovieRow {
    id: Uuid,
    title: String,
    image: String,
    rating: f64,
    duration: String,
    genre: String,
    showtimes: Vec<String>,
    status: String,
    release_date: NaiveDate,
    end_date: Option<NaiveDate>,
}

impl TryFrom<MovieRow> for Movie {
    type Error = StoreError;

    fn try_from(row: MovieRow) -> Result<Self, Self::Error> {
        Ok(Movie {
            id: row.id,
            title: row.title,
            image: row.image,
            rating: row.rating,
            duration: row.duration,
            genre: row.genre,
            showtimes: row.showtimes,
            status: row.status.parse::<MovieStatus>().map_err(StoreError::Malformed)?,
            release_date: row.release_date,
            end_date: row.end_date,
        })
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    movie_title: String,
    date: NaiveDate,
    showtime: String,
    seats: Vec<String>,
    total_amount: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        // Документы без схемы: битые номера мест пропускаем, а не роняем весь запрос
        let seats: BTreeSet<SeatId> = row
            .seats
            .iter()
            .filter_map(|raw| match raw.parse::<SeatId>() {
                Ok(seat) => Some(seat),
                Err(e) => {
                    warn!(booking_id = %row.id, seat = %raw, "Skipping malformed seat id: {}", e);
                    None
                }
            })
            .collect();

        Ok(Booking {
            id: row.id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            movie_title: row.movie_title,
            date: row.date,
            showtime: row.showtime,
            seats,
            total_amount: row.total_amount,
            status: row.status.parse::<BookingStatus>().map_err(StoreError::Malformed)?,
            created_at: row.created_at,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> StoreResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

impl CatalogStore for PgStore {
    fn list_movies(&self) -> BoxFuture<'_, StoreResult<Vec<Movie>>> {
        async move {
            let rows = sqlx::query_as::<_, MovieRow>(&format!(
                "SELECT {MOVIE_COLUMNS} FROM movies ORDER BY release_date, title"
            ))
            .fetch_all(&self.pool)
            .await?;
            rows.into_iter().map(Movie::try_from).collect()
        }
        .boxed()
    }

    fn create_movie(&self, input: MovieInput) -> BoxFuture<'_, StoreResult<Movie>> {
        async move {
            let row = sqlx::query_as::<_, MovieRow>(&format!(
                "INSERT INTO movies (title, image, rating, duration, genre, showtimes, status, release_date, end_date)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 RETURNING {MOVIE_COLUMNS}"
            ))
            .bind(&input.title)
            .bind(&input.image)
            .bind(input.rating)
            .bind(&input.duration)
            .bind(&input.genre)
            .bind(&input.showtimes)
            .bind(input.status.as_str())
            .bind(input.release_date)
            .bind(input.end_date)
            .fetch_one(&self.pool)
            .await?;
            Movie::try_from(row)
        }
        .boxed()
    }

    fn update_movie(&self, id: Uuid, input: MovieInput) -> BoxFuture<'_, StoreResult<Movie>> {
        async move {
            let row = sqlx::query_as::<_, MovieRow>(&format!(
                "UPDATE movies
                 SET title = $2, image = $3, rating = $4, duration = $5, genre = $6,
                     showtimes = $7, status = $8, release_date = $9, end_date = $10
                 WHERE id = $1
                 RETURNING {MOVIE_COLUMNS}"
            ))
            .bind(id)
            .bind(&input.title)
            .bind(&input.image)
            .bind(input.rating)
            .bind(&input.duration)
            .bind(&input.genre)
            .bind(&input.showtimes)
            .bind(input.status.as_str())
            .bind(input.release_date)
            .bind(input.end_date)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;
            Movie::try_from(row)
        }
        .boxed()
    }

    fn delete_movie(&self, id: Uuid) -> BoxFuture<'_, StoreResult<()>> {
        async move {
            let result = sqlx::query("DELETE FROM movies WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        }
        .boxed()
    }
}

impl BookingStore for PgStore {
    fn list_bookings_matching<'a>(
        &'a self,
        screening: &'a Screening,
    ) -> BoxFuture<'a, StoreResult<Vec<Booking>>> {
        async move {
            let rows = sqlx::query_as::<_, BookingRow>(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE movie_title = $1 AND date = $2 AND showtime = $3"
            ))
            .bind(&screening.movie_title)
            .bind(screening.date)
            .bind(&screening.showtime)
            .fetch_all(&self.pool)
            .await?;
            into_bookings(rows)
        }
        .boxed()
    }

    fn list_bookings(&self, filter: BookingFilter) -> BoxFuture<'_, StoreResult<Vec<Booking>>> {
        async move {
            let rows = sqlx::query_as::<_, BookingRow>(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE ($1::date IS NULL OR date = $1)
                   AND ($2::text IS NULL OR movie_title = $2)
                 ORDER BY created_at DESC"
            ))
            .bind(filter.date)
            .bind(filter.movie_title)
            .fetch_all(&self.pool)
            .await?;
            into_bookings(rows)
        }
        .boxed()
    }

    fn create_booking(&self, booking: NewBooking) -> BoxFuture<'_, StoreResult<Booking>> {
        async move {
            let seats: Vec<String> = booking.seats.iter().map(ToString::to_string).collect();
            let row = sqlx::query_as::<_, BookingRow>(&format!(
                "INSERT INTO bookings
                    (customer_name, customer_email, customer_phone, movie_title, date, showtime, seats, total_amount, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 RETURNING {BOOKING_COLUMNS}"
            ))
            .bind(&booking.customer_name)
            .bind(&booking.customer_email)
            .bind(&booking.customer_phone)
            .bind(&booking.movie_title)
            .bind(booking.date)
            .bind(&booking.showtime)
            .bind(&seats)
            .bind(booking.total_amount)
            .bind(booking.status.as_str())
            .fetch_one(&self.pool)
            .await?;
            Booking::try_from(row)
        }
        .boxed()
    }

    fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> BoxFuture<'_, StoreResult<()>> {
        async move {
            let result = sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
                .bind(id)
                .bind(status.as_str())
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        }
        .boxed()
    }
}
