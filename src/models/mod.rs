pub mod movie;
pub mod booking;
pub mod seat;
pub mod food;

pub use movie::{Movie, MovieInput, MovieStatus};
pub use booking::{Booking, BookingFilter, BookingStatus, NewBooking, Screening};
pub use seat::SeatId;
pub use food::{FoodCategory, FoodItem, FoodMenu};
