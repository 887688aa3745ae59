pub mod admin;
pub mod cleanup;
pub mod notification;
pub mod payment;
pub mod ticket;
