#![allow(dead_code)]

use chrono::NaiveDate;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use cinema_booking::models::{
    Booking, BookingFilter, BookingStatus, MovieInput, MovieStatus, NewBooking, Screening,
};
use cinema_booking::services::notification::{NotifyError, Receipt, ReceiptNotifier};
use cinema_booking::services::payment::{DelegateError, PaymentDelegate, PaymentIntent, PaymentRequest};
use cinema_booking::store::{BookingStore, CatalogStore, MemoryStore, StoreError, StoreResult};
use cinema_booking::wizard::CustomerDetails;

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, 20).unwrap()
}

pub fn show_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

pub fn cosmic_journey() -> MovieInput {
    MovieInput {
        title: "Cosmic Journey".into(),
        image: "movie-cosmic.jpg".into(),
        rating: 9.1,
        duration: "2h 35m".into(),
        genre: "Sci-Fi/Adventure".into(),
        showtimes: vec!["3:00 PM".into(), "6:30 PM".into(), "9:30 PM".into()],
        status: MovieStatus::NowShowing,
        release_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        end_date: None,
    }
}

pub fn screening() -> Screening {
    Screening::new("Cosmic Journey", show_date(), "6:30 PM")
}

pub async fn store_with_catalog() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.create_movie(cosmic_journey()).await.unwrap();
    store
}

pub fn customer() -> CustomerDetails {
    let name: String = Name().fake();
    let email: String = SafeEmail().fake();
    CustomerDetails::new(name, email, "08031234567")
}

pub async fn all_bookings(store: &MemoryStore) -> Vec<Booking> {
    store.list_bookings(BookingFilter::default()).await.unwrap()
}

/// Opens an inline widget intent and remembers every request.
#[derive(Default)]
pub struct FakePayments {
    pub requests: Mutex<Vec<PaymentRequest>>,
    pub fail: AtomicBool,
}

impl FakePayments {
    pub fn failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl PaymentDelegate for FakePayments {
    fn open<'a>(&'a self, request: &'a PaymentRequest) -> BoxFuture<'a, Result<PaymentIntent, DelegateError>> {
        async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DelegateError::Gateway("widget failed to load".into()));
            }
            self.requests.lock().unwrap().push(request.clone());
            Ok(PaymentIntent::inline(request, Some("pk_test".into())))
        }
        .boxed()
    }
}

/// Forwards every receipt to a channel.
pub struct ChannelNotifier {
    pub tx: mpsc::UnboundedSender<Receipt>,
    pub fail: bool,
}

impl ChannelNotifier {
    pub fn new(fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<Receipt>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx, fail }), rx)
    }
}

impl ReceiptNotifier for ChannelNotifier {
    fn send<'a>(&'a self, receipt: &'a Receipt) -> BoxFuture<'a, Result<(), NotifyError>> {
        async move {
            let _ = self.tx.send(receipt.clone());
            if self.fail {
                return Err(NotifyError::Rejected {
                    status: 500,
                    body: "smtp down".into(),
                });
            }
            Ok(())
        }
        .boxed()
    }
}

/// Delegates to a `MemoryStore` but refuses to create bookings with the given status.
pub struct RejectingBookings {
    pub inner: Arc<MemoryStore>,
    pub reject: BookingStatus,
}

impl BookingStore for RejectingBookings {
    fn list_bookings_matching<'a>(&'a self, screening: &'a Screening) -> BoxFuture<'a, StoreResult<Vec<Booking>>> {
        self.inner.list_bookings_matching(screening)
    }

    fn list_bookings(&self, filter: BookingFilter) -> BoxFuture<'_, StoreResult<Vec<Booking>>> {
        self.inner.list_bookings(filter)
    }

    fn create_booking(&self, booking: NewBooking) -> BoxFuture<'_, StoreResult<Booking>> {
        if booking.status == self.reject {
            return async { Err(StoreError::Unavailable("connection reset".into())) }.boxed();
        }
        self.inner.create_booking(booking)
    }

    fn update_booking_status(&self, id: Uuid, status: BookingStatus) -> BoxFuture<'_, StoreResult<()>> {
        self.inner.update_booking_status(id, status)
    }
}

/// Every call hangs forever.
pub struct HangingBookings;

impl BookingStore for HangingBookings {
    fn list_bookings_matching<'a>(&'a self, _screening: &'a Screening) -> BoxFuture<'a, StoreResult<Vec<Booking>>> {
        futures::future::pending().boxed()
    }

    fn list_bookings(&self, _filter: BookingFilter) -> BoxFuture<'_, StoreResult<Vec<Booking>>> {
        futures::future::pending().boxed()
    }

    fn create_booking(&self, _booking: NewBooking) -> BoxFuture<'_, StoreResult<Booking>> {
        futures::future::pending().boxed()
    }

    fn update_booking_status(&self, _id: Uuid, _status: BookingStatus) -> BoxFuture<'_, StoreResult<()>> {
        futures::future::pending().boxed()
    }
}
