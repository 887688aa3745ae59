//! Booking wizard.
//!
//! `WizardSession` is a pure state machine: `apply` validates an event,
//! mutates the session and returns the side effect the caller must run
//! (reconcile seats, hold seats, open the payment widget). The async side lives
//! in [`flow::BookingFlow`]; per-session serialization of requests lives in
//! [`registry::SessionRegistry`].
//!
//! Steps, in order: `date -> seats -> food -> details -> ticket`. Payment
//! happens inside the `details -> ticket` transition and is not a step.

pub mod customer;
pub mod flow;
pub mod registry;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{seat::join_seats, Booking, BookingStatus, FoodMenu, Movie, NewBooking, Screening, SeatId};
use crate::pricing::{self, PriceBreakdown};
use crate::reconciler::Reconciliation;
use crate::services::ticket::Ticket;

pub use customer::CustomerDetails;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStep {
    Date,
    Seats,
    Food,
    Details,
    Ticket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardEvent {
    SelectDate { date: NaiveDate },
    SelectShowtime { showtime: String },
    ToggleSeat { seat: SeatId },
    ChangeFood { item_id: String, delta: i32 },
    Continue,
    Back,
    SubmitDetails { details: CustomerDetails },
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fetch taken seats for the screening and reconcile the selection.
    Reconcile(Screening),
    /// Hold the selected seats before leaving the `seats` step.
    HoldSeats {
        screening: Screening,
        seats: BTreeSet<SeatId>,
    },
    /// Open the payment widget for this draft.
    RequestPayment(NewBooking),
}

/// Открытая попытка оплаты. Колбэк виджета закрывает её в любом случае.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentAttempt {
    pub reference: String,
    pub draft: NewBooking,
}

#[derive(Debug, Clone)]
pub struct WizardSession {
    id: Uuid,
    movie: Movie,
    today: NaiveDate,
    step: WizardStep,
    date: Option<NaiveDate>,
    showtime: Option<String>,
    seats: BTreeSet<SeatId>,
    taken: BTreeSet<SeatId>,
    food: BTreeMap<String, u32>,
    customer: Option<CustomerDetails>,
    price: PriceBreakdown,
    payment: Option<PaymentAttempt>,
    held: Option<(Screening, BTreeSet<SeatId>)>,
    confirmed: Option<Booking>,
    ticket: Option<Ticket>,
    support_reference: Option<String>,
    last_activity: DateTime<Utc>,
}

impl WizardSession {
    /// Starts a wizard for `movie`. A preselected showtime must be one of the
    /// movie's showtimes.
    pub fn start(movie: Movie, showtime: Option<&str>, today: NaiveDate) -> Result<Self, BookingError> {
        if let Some(time) = showtime {
            if !movie.has_showtime(time) {
                return Err(BookingError::validation(format!(
                    "'{}' has no {} showing",
                    movie.title, time
                )));
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            movie,
            today,
            step: WizardStep::Date,
            date: None,
            showtime: showtime.map(str::to_string),
            seats: BTreeSet::new(),
            taken: BTreeSet::new(),
            food: BTreeMap::new(),
            customer: None,
            price: PriceBreakdown::default(),
            payment: None,
            held: None,
            confirmed: None,
            ticket: None,
            support_reference: None,
            last_activity: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn movie(&self) -> &Movie {
        &self.movie
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn showtime(&self) -> Option<&str> {
        self.showtime.as_deref()
    }

    pub fn seats(&self) -> &BTreeSet<SeatId> {
        &self.seats
    }

    pub fn taken(&self) -> &BTreeSet<SeatId> {
        &self.taken
    }

    pub fn food(&self) -> &BTreeMap<String, u32> {
        &self.food
    }

    pub fn customer(&self) -> Option<&CustomerDetails> {
        self.customer.as_ref()
    }

    pub fn price(&self) -> PriceBreakdown {
        self.price
    }

    pub fn total(&self) -> i64 {
        self.price.total
    }

    pub fn payment(&self) -> Option<&PaymentAttempt> {
        self.payment.as_ref()
    }

    pub fn held(&self) -> Option<&(Screening, BTreeSet<SeatId>)> {
        self.held.as_ref()
    }

    pub fn confirmed(&self) -> Option<&Booking> {
        self.confirmed.as_ref()
    }

    pub fn ticket(&self) -> Option<&Ticket> {
        self.ticket.as_ref()
    }

    pub fn support_reference(&self) -> Option<&str> {
        self.support_reference.as_deref()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// The `(movie, date, showtime)` triple once both date and showtime are chosen.
    pub fn screening(&self) -> Option<Screening> {
        match (self.date, &self.showtime) {
            (Some(date), Some(showtime)) => {
                Some(Screening::new(self.movie.title.clone(), date, showtime.clone()))
            }
            _ => None,
        }
    }

    pub fn apply(&mut self, event: WizardEvent, menu: &FoodMenu) -> Result<Option<Effect>, BookingError> {
        if self.step == WizardStep::Ticket {
            return Err(BookingError::validation("This booking is complete; start a new booking"));
        }
        if let Some(reference) = &self.support_reference {
            return Err(BookingError::validation(format!(
                "Payment {reference} needs support follow-up; start a new booking"
            )));
        }
        if self.payment.is_some() {
            return Err(BookingError::validation("A payment is already in progress for this booking"));
        }

        match (self.step, event) {
            (WizardStep::Date, WizardEvent::SelectDate { date }) => {
                if !self.movie.is_bookable_on(date, self.today) {
                    return Err(BookingError::validation(format!(
                        "{} is not bookable on {}",
                        self.movie.title, date
                    )));
                }
                self.date = Some(date);
                Ok(self.screening().map(Effect::Reconcile))
            }
            (WizardStep::Date, WizardEvent::SelectShowtime { showtime }) => {
                if !self.movie.has_showtime(&showtime) {
                    return Err(BookingError::validation(format!(
                        "'{}' has no {} showing",
                        self.movie.title, showtime
                    )));
                }
                self.showtime = Some(showtime);
                Ok(self.screening().map(Effect::Reconcile))
            }
            (WizardStep::Date, WizardEvent::Continue) => {
                let screening = self
                    .screening()
                    .ok_or_else(|| BookingError::validation("Select a date and a showtime first"))?;
                self.step = WizardStep::Seats;
                Ok(Some(Effect::Reconcile(screening)))
            }
            (WizardStep::Seats, WizardEvent::ToggleSeat { seat }) => {
                if self.taken.contains(&seat) {
                    return Err(BookingError::validation(format!("Seat {seat} is already taken")));
                }
                if !self.seats.remove(&seat) {
                    self.seats.insert(seat);
                }
                self.reprice(menu);
                Ok(None)
            }
            (WizardStep::Seats, WizardEvent::Continue) => {
                self.step = WizardStep::Food;
                match self.screening() {
                    Some(screening) if !self.seats.is_empty() => Ok(Some(Effect::HoldSeats {
                        screening,
                        seats: self.seats.clone(),
                    })),
                    _ => Ok(None),
                }
            }
            (WizardStep::Seats, WizardEvent::Back) => {
                self.step = WizardStep::Date;
                Ok(None)
            }
            (WizardStep::Food, WizardEvent::ChangeFood { item_id, delta }) => {
                if menu.get(&item_id).is_none() {
                    return Err(BookingError::validation(format!("Unknown menu item '{item_id}'")));
                }
                let current = i64::from(self.food.get(&item_id).copied().unwrap_or(0));
                let next = (current + i64::from(delta)).clamp(0, i64::from(u32::MAX)) as u32;
                if next == 0 {
                    self.food.remove(&item_id);
                } else {
                    self.food.insert(item_id, next);
                }
                self.reprice(menu);
                Ok(None)
            }
            (WizardStep::Food, WizardEvent::Continue) => {
                self.step = WizardStep::Details;
                self.reprice(menu);
                Ok(None)
            }
            (WizardStep::Food, WizardEvent::Back) => {
                self.step = WizardStep::Seats;
                Ok(self.screening().map(Effect::Reconcile))
            }
            (WizardStep::Details, WizardEvent::SubmitDetails { details }) => {
                let details = details.validated()?;
                self.reprice(menu);
                if self.seats.is_empty() {
                    return Err(BookingError::validation("Select at least one seat"));
                }
                if self.price.total < 1 {
                    return Err(BookingError::validation("Nothing to pay for"));
                }
                let screening = self
                    .screening()
                    .ok_or_else(|| BookingError::validation("Select a date and a showtime first"))?;
                self.customer = Some(details.clone());
                Ok(Some(Effect::RequestPayment(NewBooking {
                    customer_name: details.name,
                    customer_email: details.email,
                    customer_phone: details.phone,
                    movie_title: screening.movie_title,
                    date: screening.date,
                    showtime: screening.showtime,
                    seats: self.seats.clone(),
                    total_amount: self.price.total,
                    status: BookingStatus::Pending,
                })))
            }
            (step, event) => Err(BookingError::validation(format!(
                "{} is not allowed on the {} step",
                event_name(&event),
                step_name(step)
            ))),
        }
    }

    /// Applies a reconciliation result. Results for a screening the session
    /// has since moved away from are ignored. Returns the dropped seats.
    pub fn apply_reconciliation(
        &mut self,
        screening: &Screening,
        result: Reconciliation,
        menu: &FoodMenu,
    ) -> BTreeSet<SeatId> {
        if self.screening().as_ref() != Some(screening) {
            return BTreeSet::new();
        }
        // Пересчитываем от текущего выбора, а не от снимка на момент запроса
        let fresh = Reconciliation::compute(result.taken, &self.seats);
        self.taken = fresh.taken;
        self.seats = fresh.retained;
        self.reprice(menu);
        fresh.dropped
    }

    pub fn record_hold(&mut self, screening: Screening, seats: BTreeSet<SeatId>) {
        self.held = Some((screening, seats));
    }

    pub fn take_hold(&mut self) -> Option<(Screening, BTreeSet<SeatId>)> {
        self.held.take()
    }

    /// Seats held by someone else: deselect them, mark them taken and send
    /// the booker back to seat selection.
    pub fn reject_hold(&mut self, conflicts: &BTreeSet<SeatId>, menu: &FoodMenu) {
        for seat in conflicts {
            self.seats.remove(seat);
            self.taken.insert(*seat);
        }
        self.step = WizardStep::Seats;
        self.reprice(menu);
    }

    pub fn begin_payment(&mut self, reference: String, draft: NewBooking) {
        self.payment = Some(PaymentAttempt { reference, draft });
    }

    /// Closes the open payment attempt. A reference that does not match it
    /// is rejected and the attempt stays open.
    pub fn take_payment(&mut self, reference: &str) -> Result<PaymentAttempt, BookingError> {
        match &self.payment {
            Some(attempt) if attempt.reference == reference => {
                self.payment.take().ok_or_else(|| BookingError::validation("No payment in progress"))
            }
            Some(_) => Err(BookingError::validation(format!("Unknown payment reference '{reference}'"))),
            None => Err(BookingError::validation("No payment in progress")),
        }
    }

    pub fn complete(&mut self, booking: Booking, ticket: Ticket) {
        self.confirmed = Some(booking);
        self.ticket = Some(ticket);
        self.step = WizardStep::Ticket;
    }

    pub fn require_support(&mut self, reference: String) {
        self.support_reference = Some(reference);
    }

    fn reprice(&mut self, menu: &FoodMenu) {
        self.price = pricing::breakdown(self.seats.len(), &self.food, menu);
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            step: self.step,
            movie_title: self.movie.title.clone(),
            showtimes: self.movie.showtimes.clone(),
            available_dates: self.movie.bookable_dates(self.today),
            date: self.date,
            showtime: self.showtime.clone(),
            seats: self.seats.iter().map(ToString::to_string).collect(),
            seats_label: join_seats(&self.seats),
            taken: self.taken.iter().map(ToString::to_string).collect(),
            food: self.food.clone(),
            price: self.price,
            pay_enabled: self.price.total > 0 && !self.seats.is_empty(),
            payment_reference: self.payment.as_ref().map(|p| p.reference.clone()),
            booking_id: self.confirmed.as_ref().map(|b| b.id),
            ticket: self.ticket.clone(),
            support_reference: self.support_reference.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub step: WizardStep,
    pub movie_title: String,
    pub showtimes: Vec<String>,
    pub available_dates: Vec<NaiveDate>,
    pub date: Option<NaiveDate>,
    pub showtime: Option<String>,
    pub seats: Vec<String>,
    pub seats_label: String,
    pub taken: Vec<String>,
    pub food: BTreeMap<String, u32>,
    pub price: PriceBreakdown,
    pub pay_enabled: bool,
    pub payment_reference: Option<String>,
    pub booking_id: Option<Uuid>,
    pub ticket: Option<Ticket>,
    pub support_reference: Option<String>,
}

fn step_name(step: WizardStep) -> &'static str {
    match step {
        WizardStep::Date => "date",
        WizardStep::Seats => "seats",
        WizardStep::Food => "food",
        WizardStep::Details => "details",
        WizardStep::Ticket => "ticket",
    }
}

fn event_name(event: &WizardEvent) -> &'static str {
    match event {
        WizardEvent::SelectDate { .. } => "select_date",
        WizardEvent::SelectShowtime { .. } => "select_showtime",
        WizardEvent::ToggleSeat { .. } => "toggle_seat",
        WizardEvent::ChangeFood { .. } => "change_food",
        WizardEvent::Continue => "continue",
        WizardEvent::Back => "back",
        WizardEvent::SubmitDetails { .. } => "submit_details",
    }
}
