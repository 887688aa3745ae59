//! Seat availability reconciler.
//!
//! Taken seats are never stored; they are the union of seat sets of every
//! booking that matches the screening. This is the only consistency check in
//! the booking flow. Two bookers can both see a seat as free until one of them
//! persists, so a double booking stays possible unless a seat hold backend is
//! configured.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{Booking, BookingStatus, Screening, SeatId};
use crate::store::{BookingStore, StoreResult};

/// Whether cancelled bookings still occupy their seats.
///
/// `IncludeCancelled` is the observed behaviour of the booking site: a
/// cancelled booking keeps its seats. It is the default until product decides
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TakenSeatPolicy {
    #[default]
    IncludeCancelled,
    ExcludeCancelled,
}

impl TakenSeatPolicy {
    pub fn from_flag(count_cancelled_as_taken: bool) -> Self {
        if count_cancelled_as_taken {
            TakenSeatPolicy::IncludeCancelled
        } else {
            TakenSeatPolicy::ExcludeCancelled
        }
    }

    fn counts(&self, booking: &Booking) -> bool {
        match self {
            TakenSeatPolicy::IncludeCancelled => true,
            TakenSeatPolicy::ExcludeCancelled => booking.status != BookingStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub taken: BTreeSet<SeatId>,
    pub retained: BTreeSet<SeatId>,
    /// Места, которые пользователь выбрал, но их уже забронировал кто-то другой.
    pub dropped: BTreeSet<SeatId>,
}

impl Reconciliation {
    pub fn compute(taken: BTreeSet<SeatId>, selection: &BTreeSet<SeatId>) -> Self {
        let (dropped, retained): (BTreeSet<SeatId>, BTreeSet<SeatId>) =
            selection.iter().partition(|seat| taken.contains(*seat));
        Self {
            taken,
            retained,
            dropped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatState {
    Available,
    Taken,
    Selected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatView {
    pub id: SeatId,
    pub state: SeatState,
}

/// Full 96-seat map in row order.
pub fn seat_map(taken: &BTreeSet<SeatId>, selected: &BTreeSet<SeatId>) -> Vec<SeatView> {
    SeatId::all()
        .map(|id| {
            let state = if taken.contains(&id) {
                SeatState::Taken
            } else if selected.contains(&id) {
                SeatState::Selected
            } else {
                SeatState::Available
            };
            SeatView { id, state }
        })
        .collect()
}

pub fn taken_seats_in(bookings: &[Booking], policy: TakenSeatPolicy) -> BTreeSet<SeatId> {
    bookings
        .iter()
        .filter(|b| policy.counts(b))
        .flat_map(|b| b.seats.iter().copied())
        .collect()
}

#[derive(Clone)]
pub struct SeatReconciler {
    bookings: Arc<dyn BookingStore>,
    policy: TakenSeatPolicy,
}

impl SeatReconciler {
    pub fn new(bookings: Arc<dyn BookingStore>, policy: TakenSeatPolicy) -> Self {
        Self { bookings, policy }
    }

    pub fn policy(&self) -> TakenSeatPolicy {
        self.policy
    }

    pub async fn taken_seats(&self, screening: &Screening) -> StoreResult<BTreeSet<SeatId>> {
        let bookings = self.bookings.list_bookings_matching(screening).await?;
        let taken = taken_seats_in(&bookings, self.policy);
        debug!(
            movie = %screening.movie_title,
            date = %screening.date,
            showtime = %screening.showtime,
            bookings = bookings.len(),
            taken = taken.len(),
            "Computed taken seats"
        );
        Ok(taken)
    }

    pub async fn reconcile(
        &self,
        screening: &Screening,
        selection: &BTreeSet<SeatId>,
    ) -> StoreResult<Reconciliation> {
        let taken = self.taken_seats(screening).await?;
        let result = Reconciliation::compute(taken, selection);
        if !result.dropped.is_empty() {
            info!(
                movie = %screening.movie_title,
                date = %screening.date,
                showtime = %screening.showtime,
                dropped = %crate::models::seat::join_seats(&result.dropped),
                "Selected seats were taken by another booking"
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewBooking;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn seats(ids: &[&str]) -> BTreeSet<SeatId> {
        ids.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn screening() -> Screening {
        Screening::new("Cosmic Journey", NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), "6:30 PM")
    }

    fn booking(ids: &[&str], status: BookingStatus) -> NewBooking {
        let s = screening();
        NewBooking {
            customer_name: "Ada".into(),
            customer_email: "ada@example.com".into(),
            customer_phone: "0800".into(),
            movie_title: s.movie_title,
            date: s.date,
            showtime: s.showtime,
            seats: seats(ids),
            total_amount: 0,
            status,
        }
    }

    #[test]
    fn drops_taken_seats_from_selection() {
        let r = Reconciliation::compute(seats(&["A1", "B2"]), &seats(&["A1", "A2"]));
        assert_eq!(r.retained, seats(&["A2"]));
        assert_eq!(r.dropped, seats(&["A1"]));
    }

    #[tokio::test]
    async fn cancelled_bookings_still_occupy_seats_by_default() {
        let store = Arc::new(MemoryStore::new());
        store.create_booking(booking(&["A1", "A2"], BookingStatus::Cancelled)).await.unwrap();
        store.create_booking(booking(&["C3"], BookingStatus::Confirmed)).await.unwrap();

        let reconciler = SeatReconciler::new(store.clone(), TakenSeatPolicy::default());
        assert_eq!(reconciler.taken_seats(&screening()).await.unwrap(), seats(&["A1", "A2", "C3"]));

        let strict = SeatReconciler::new(store, TakenSeatPolicy::ExcludeCancelled);
        assert_eq!(strict.taken_seats(&screening()).await.unwrap(), seats(&["C3"]));
    }

    #[tokio::test]
    async fn other_screenings_do_not_count() {
        let store = Arc::new(MemoryStore::new());
        let mut other = booking(&["A1"], BookingStatus::Confirmed);
        other.showtime = "9:30 PM".into();
        store.create_booking(other).await.unwrap();

        let reconciler = SeatReconciler::new(store, TakenSeatPolicy::default());
        let r = reconciler.reconcile(&screening(), &seats(&["A1"])).await.unwrap();
        assert!(r.taken.is_empty());
        assert_eq!(r.retained, seats(&["A1"]));
    }

    #[test]
    fn seat_map_marks_states() {
        let map = seat_map(&seats(&["A1"]), &seats(&["A1", "A2"]));
        assert_eq!(map.len(), 96);
        assert_eq!(map[0].state, SeatState::Taken);
        assert_eq!(map[1].state, SeatState::Selected);
        assert_eq!(map[2].state, SeatState::Available);
    }

    fn seat_strategy() -> impl Strategy<Value = SeatId> {
        (0usize..8, 1u8..=12).prop_map(|(r, n)| SeatId::new(crate::models::seat::ROWS[r], n).unwrap())
    }

    proptest! {
        #[test]
        fn reconciling_twice_is_idempotent(
            booked in proptest::collection::vec(proptest::collection::btree_set(seat_strategy(), 1..6), 0..5),
            selection in proptest::collection::btree_set(seat_strategy(), 0..10),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = Arc::new(MemoryStore::new());
                for set in &booked {
                    let mut b = booking(&[], BookingStatus::Confirmed);
                    b.seats = set.clone();
                    store.create_booking(b).await.unwrap();
                }
                let reconciler = SeatReconciler::new(store, TakenSeatPolicy::default());
                let first = reconciler.reconcile(&screening(), &selection).await.unwrap();
                let second = reconciler.reconcile(&screening(), &first.retained).await.unwrap();
                assert_eq!(&first.taken, &second.taken);
                assert_eq!(&first.retained, &second.retained);
                assert!(second.dropped.is_empty());
                assert!(first.retained.is_disjoint(&first.taken));
            });
        }
    }
}
