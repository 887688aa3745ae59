use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BookingStore, CatalogStore, StoreError, StoreResult};
use crate::models::{Booking, BookingFilter, BookingStatus, Movie, MovieInput, NewBooking, Screening};

/// In-process store for local runs and tests. Same read-then-write semantics
/// as the Postgres adapter: no locking across calls.
#[derive(Default)]
pub struct MemoryStore {
    movies: RwLock<Vec<Movie>>,
    bookings: RwLock<Vec<Booking>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogStore for MemoryStore {
    fn list_movies(&self) -> BoxFuture<'_, StoreResult<Vec<Movie>>> {
        async move { Ok(self.movies.read().await.clone()) }.boxed()
    }

    fn create_movie(&self, input: MovieInput) -> BoxFuture<'_, StoreResult<Movie>> {
        async move {
            let movie = input.into_movie(Uuid::new_v4());
            self.movies.write().await.push(movie.clone());
            Ok(movie)
        }
        .boxed()
    }

    fn update_movie(&self, id: Uuid, input: MovieInput) -> BoxFuture<'_, StoreResult<Movie>> {
        async move {
            let mut movies = self.movies.write().await;
            let slot = movies
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or(StoreError::NotFound(id))?;
            *slot = input.into_movie(id);
            Ok(slot.clone())
        }
        .boxed()
    }

    fn delete_movie(&self, id: Uuid) -> BoxFuture<'_, StoreResult<()>> {
        async move {
            let mut movies = self.movies.write().await;
            let before = movies.len();
            movies.retain(|m| m.id != id);
            if movies.len() == before {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        }
        .boxed()
    }
}

impl BookingStore for MemoryStore {
    fn list_bookings_matching<'a>(
        &'a self,
        screening: &'a Screening,
    ) -> BoxFuture<'a, StoreResult<Vec<Booking>>> {
        async move {
            Ok(self
                .bookings
                .read()
                .await
                .iter()
                .filter(|b| b.matches(screening))
                .cloned()
                .collect())
        }
        .boxed()
    }

    fn list_bookings(&self, filter: BookingFilter) -> BoxFuture<'_, StoreResult<Vec<Booking>>> {
        async move {
            let mut found: Vec<Booking> = self
                .bookings
                .read()
                .await
                .iter()
                .filter(|b| filter.matches(b))
                .cloned()
                .collect();
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(found)
        }
        .boxed()
    }

    fn create_booking(&self, booking: NewBooking) -> BoxFuture<'_, StoreResult<Booking>> {
        async move {
            let booking = Booking::from_new(Uuid::new_v4(), booking, Utc::now());
            self.bookings.write().await.push(booking.clone());
            Ok(booking)
        }
        .boxed()
    }

    fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> BoxFuture<'_, StoreResult<()>> {
        async move {
            let mut bookings = self.bookings.write().await;
            let booking = bookings
                .iter_mut()
                .find(|b| b.id == id)
                .ok_or(StoreError::NotFound(id))?;
            booking.status = status;
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::movie::default_movies;
    use chrono::NaiveDate;

    fn new_booking(title: &str, seats: &[&str], status: BookingStatus) -> NewBooking {
        NewBooking {
            customer_name: "Ada".into(),
            customer_email: "ada@example.com".into(),
            customer_phone: "0800".into(),
            movie_title: title.into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            showtime: "6:30 PM".into(),
            seats: seats.iter().map(|s| s.parse().unwrap()).collect(),
            total_amount: 2500 * seats.len() as i64,
            status,
        }
    }

    #[tokio::test]
    async fn movie_round_trip_preserves_fields() {
        let store = MemoryStore::new();
        let input = default_movies(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()).remove(2);
        let created = store.create_movie(input.clone()).await.unwrap();

        let listed = store.list_movies().await.unwrap();
        assert_eq!(listed, vec![created.clone()]);
        assert_eq!(listed[0].release_date, input.release_date);
        assert_eq!(listed[0].showtimes, input.showtimes);

        let mut changed = input.clone();
        changed.rating = 9.5;
        let updated = store.update_movie(created.id, changed).await.unwrap();
        assert_eq!(updated.rating, 9.5);

        store.delete_movie(created.id).await.unwrap();
        assert!(matches!(store.delete_movie(created.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn matching_is_exact_and_case_sensitive() {
        let store = MemoryStore::new();
        store.create_booking(new_booking("Cosmic Journey", &["A1"], BookingStatus::Confirmed)).await.unwrap();
        store.create_booking(new_booking("cosmic journey", &["A2"], BookingStatus::Confirmed)).await.unwrap();

        let screening = Screening::new("Cosmic Journey", NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), "6:30 PM");
        let found = store.list_bookings_matching(&screening).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].movie_title, "Cosmic Journey");
    }

    #[tokio::test]
    async fn status_update_of_unknown_id_fails() {
        let store = MemoryStore::new();
        let booking = store.create_booking(new_booking("X", &["B2"], BookingStatus::Pending)).await.unwrap();
        store.update_booking_status(booking.id, BookingStatus::Cancelled).await.unwrap();
        let all = store.list_bookings(BookingFilter::default()).await.unwrap();
        assert_eq!(all[0].status, BookingStatus::Cancelled);

        let err = store.update_booking_status(Uuid::new_v4(), BookingStatus::Cancelled).await;
        assert!(matches!(err, Err(StoreError::NotFound(_))));
    }
}
