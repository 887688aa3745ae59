//! Async driver around [`WizardSession`].
//!
//! Transitions are applied to a copy of the session; the copy replaces the
//! original only after the transition's effect (reconcile, hold, payment
//! widget) finished. A failed store call therefore leaves the session
//! exactly where it was.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::BookingError;
use crate::models::{seat::join_seats, Booking, BookingStatus, FoodMenu, Movie, NewBooking, Screening, SeatId};
use crate::reconciler::{seat_map, SeatReconciler, SeatView, TakenSeatPolicy};
use crate::seat_hold::{HoldOutcome, NoSeatHold, SeatHoldService};
use crate::services::notification::{spawn_receipt, DisabledNotifier, Receipt, ReceiptNotifier};
use crate::services::payment::{new_reference, PaymentDelegate, PaymentIntent, PaymentOutcome, PaymentRequest};
use crate::services::ticket::Ticket;
use crate::store::{BookingStore, CatalogStore, StoreError, StoreResult};
use crate::wizard::{Effect, WizardEvent, WizardSession, WizardStep};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one wizard event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// Seats deselected because someone else booked them.
    pub dropped_seats: Vec<SeatId>,
    /// Present after `submit_details`: open the payment widget with it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentIntent>,
}

#[derive(Debug, Clone)]
pub enum PaymentResult {
    Confirmed { booking: Booking, ticket: Ticket },
    Cancelled { booking: Booking },
}

pub struct BookingFlow {
    catalog: Arc<dyn CatalogStore>,
    bookings: Arc<dyn BookingStore>,
    reconciler: SeatReconciler,
    holds: Arc<dyn SeatHoldService>,
    payments: Arc<dyn PaymentDelegate>,
    notifier: Arc<dyn ReceiptNotifier>,
    menu: FoodMenu,
    store_timeout: Duration,
    cinema_name: String,
    currency: String,
}

impl BookingFlow {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentDelegate>,
    ) -> Self {
        Self {
            catalog,
            reconciler: SeatReconciler::new(bookings.clone(), TakenSeatPolicy::default()),
            bookings,
            holds: Arc::new(NoSeatHold),
            payments,
            notifier: Arc::new(DisabledNotifier),
            menu: FoodMenu::standard(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            cinema_name: "SQI Cinemas".to_string(),
            currency: "NGN".to_string(),
        }
    }

    pub fn with_seat_holds(mut self, holds: Arc<dyn SeatHoldService>) -> Self {
        self.holds = holds;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ReceiptNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_taken_seat_policy(mut self, policy: TakenSeatPolicy) -> Self {
        self.reconciler = SeatReconciler::new(self.bookings.clone(), policy);
        self
    }

    pub fn with_cinema_name(mut self, name: impl Into<String>) -> Self {
        self.cinema_name = name.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn menu(&self) -> &FoodMenu {
        &self.menu
    }

    async fn guarded<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout(self.store_timeout)))
    }

    pub async fn find_movie(&self, title: &str) -> Result<Movie, BookingError> {
        let movies = self.guarded(self.catalog.list_movies()).await.map_err(|e| {
            error!(movie = %title, "Failed to load movie catalog: {}", e);
            e
        })?;
        movies
            .into_iter()
            .find(|movie| movie.title == title)
            .ok_or_else(|| BookingError::NotFound(title.to_string()))
    }

    /// Unknown title: the wizard does not start.
    pub async fn start(
        &self,
        movie_title: &str,
        showtime: Option<&str>,
        today: NaiveDate,
    ) -> Result<WizardSession, BookingError> {
        let movie = self.find_movie(movie_title).await?;
        let session = WizardSession::start(movie, showtime, today)?;
        info!(session = %session.id(), movie = %movie_title, "Booking session started");
        Ok(session)
    }

    pub async fn apply(&self, session: &mut WizardSession, event: WizardEvent) -> Result<StepOutcome, BookingError> {
        let mut next = session.clone();
        next.touch(Utc::now());
        let effect = next.apply(event, &self.menu)?;

        let mut outcome = StepOutcome::default();
        match effect {
            None => {}
            Some(Effect::Reconcile(screening)) => {
                let dropped = self.reconcile(&mut next, &screening).await?;
                outcome.dropped_seats = dropped.into_iter().collect();
            }
            Some(Effect::HoldSeats { screening, seats }) => {
                if let Err(e) = self.hold(&mut next, screening, seats).await {
                    // конфликт удержания: сессия уже вернулась на шаг выбора мест
                    if matches!(e, BookingError::Validation(_)) {
                        *session = next;
                    }
                    return Err(e);
                }
            }
            Some(Effect::RequestPayment(draft)) => {
                // после отмены оплаты удержание снято: берём его заново до виджета
                if let Err(e) = self.hold(&mut next, draft.screening(), draft.seats.clone()).await {
                    if matches!(e, BookingError::Validation(_)) {
                        *session = next;
                    }
                    return Err(e);
                }
                match self.request_payment(&mut next, draft).await {
                    Ok(intent) => outcome.payment = Some(intent),
                    Err(e) => {
                        if session.held() != next.held() {
                            self.release_holds(&mut next).await;
                        }
                        return Err(e);
                    }
                }
            }
        }

        *session = next;
        if matches!(session.step(), WizardStep::Date | WizardStep::Seats) {
            self.release_holds(session).await;
        }
        Ok(outcome)
    }

    async fn reconcile(&self, session: &mut WizardSession, screening: &Screening) -> Result<BTreeSet<SeatId>, BookingError> {
        let result = self
            .guarded(self.reconciler.reconcile(screening, session.seats()))
            .await
            .map_err(|e| {
                error!(
                    movie = %screening.movie_title,
                    date = %screening.date,
                    showtime = %screening.showtime,
                    "Failed to load bookings for screening: {}",
                    e
                );
                e
            })?;
        Ok(session.apply_reconciliation(screening, result, &self.menu))
    }

    async fn hold(
        &self,
        session: &mut WizardSession,
        screening: Screening,
        seats: BTreeSet<SeatId>,
    ) -> Result<(), BookingError> {
        if session.held().is_some_and(|(s, held)| *s == screening && *held == seats) {
            return Ok(());
        }
        self.release_holds(session).await;

        match self.guarded(self.holds.hold(&screening, &seats, session.id())).await? {
            HoldOutcome::Held => {
                session.record_hold(screening, seats);
                Ok(())
            }
            HoldOutcome::Conflict(conflicts) => {
                info!(
                    session = %session.id(),
                    movie = %screening.movie_title,
                    seats = %join_seats(&conflicts),
                    "Seats are held by another booking"
                );
                session.reject_hold(&conflicts, &self.menu);
                Err(BookingError::validation(format!(
                    "Seats {} were just taken by another booking, please choose again",
                    join_seats(&conflicts)
                )))
            }
        }
    }

    async fn request_payment(&self, session: &mut WizardSession, draft: NewBooking) -> Result<PaymentIntent, BookingError> {
        let request = PaymentRequest::for_booking(&draft, new_reference(), &self.currency);
        let intent = self.payments.open(&request).await?;
        info!(
            session = %session.id(),
            reference = %request.reference,
            amount = request.amount,
            "Payment widget opened"
        );
        session.begin_payment(request.reference, draft);
        Ok(intent)
    }

    /// Payment widget callback. Both outcomes close the attempt.
    pub async fn complete_payment(
        &self,
        session: &mut WizardSession,
        reference: &str,
        outcome: PaymentOutcome,
    ) -> Result<PaymentResult, BookingError> {
        let attempt = session.take_payment(reference)?;
        session.touch(Utc::now());

        match outcome {
            PaymentOutcome::Success => {
                let draft = attempt.draft.with_status(BookingStatus::Confirmed);
                let booking = match self.guarded(self.bookings.create_booking(draft.clone())).await {
                    Ok(booking) => booking,
                    Err(source) => {
                        error!(
                            reference = %attempt.reference,
                            email = %draft.customer_email,
                            movie = %draft.movie_title,
                            date = %draft.date,
                            showtime = %draft.showtime,
                            seats = %join_seats(&draft.seats),
                            amount = draft.total_amount,
                            "Payment succeeded but booking was not recorded: {}",
                            source
                        );
                        session.require_support(attempt.reference.clone());
                        return Err(BookingError::PaymentNotRecorded {
                            reference: attempt.reference,
                            source,
                        });
                    }
                };

                let ticket = Ticket::issue(&self.cinema_name, &booking, session.food(), &self.menu, Utc::now());
                session.complete(booking.clone(), ticket.clone());
                self.release_holds(session).await;
                spawn_receipt(self.notifier.clone(), Receipt::for_booking(&booking));

                info!(
                    booking = %booking.id,
                    ticket = %ticket.number,
                    seats = %join_seats(&booking.seats),
                    "Booking confirmed"
                );
                Ok(PaymentResult::Confirmed { booking, ticket })
            }
            PaymentOutcome::Cancel => {
                let draft = attempt.draft.with_status(BookingStatus::Cancelled);
                self.release_holds(session).await;
                let booking = self
                    .guarded(self.bookings.create_booking(draft.clone()))
                    .await
                    .map_err(|e| {
                        error!(
                            reference = %attempt.reference,
                            movie = %draft.movie_title,
                            date = %draft.date,
                            showtime = %draft.showtime,
                            "Failed to record cancelled booking: {}",
                            e
                        );
                        e
                    })?;
                info!(booking = %booking.id, reference = %attempt.reference, "Payment cancelled");
                Ok(PaymentResult::Cancelled { booking })
            }
        }
    }

    /// Back to the catalog: frees whatever the session still holds.
    pub async fn reset(&self, session: &mut WizardSession) {
        self.release_holds(session).await;
        info!(session = %session.id(), "Booking session reset");
    }

    pub async fn release_holds(&self, session: &mut WizardSession) {
        let Some((screening, seats)) = session.take_hold() else {
            return;
        };
        if let Err(e) = self.guarded(self.holds.release(&screening, &seats, session.id())).await {
            warn!(
                session = %session.id(),
                seats = %join_seats(&seats),
                "Failed to release seat hold: {}",
                e
            );
        }
    }

    /// All 96 seats of a screening, in row order.
    pub async fn seat_map(&self, screening: &Screening) -> Result<Vec<SeatView>, BookingError> {
        let taken = self
            .guarded(self.reconciler.taken_seats(screening))
            .await
            .map_err(|e| {
                error!(
                    movie = %screening.movie_title,
                    date = %screening.date,
                    showtime = %screening.showtime,
                    "Failed to load bookings for screening: {}",
                    e
                );
                e
            })?;
        Ok(seat_map(&taken, &BTreeSet::new()))
    }
}
