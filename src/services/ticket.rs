use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use uuid::Uuid;

use crate::models::{seat::join_seats, Booking, FoodMenu};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketFoodLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub subtotal: i64,
}

/// Printable receipt for a confirmed booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    pub number: String,
    pub cinema_name: String,
    pub booking_id: Uuid,
    pub movie_title: String,
    pub date: NaiveDate,
    pub date_label: String,
    pub showtime: String,
    pub seats: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub food: Vec<TicketFoodLine>,
    pub total: i64,
    pub issued_at: DateTime<Utc>,
}

/// `SQI` + последние 6 цифр метки времени в миллисекундах.
pub fn ticket_number(issued_at: DateTime<Utc>) -> String {
    format!("SQI{:06}", issued_at.timestamp_millis().rem_euclid(1_000_000))
}

/// "Saturday, March 1, 2025"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// ₦ with thousands separators: 12500 -> "₦12,500".
pub fn format_naira(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}₦{grouped}")
}

impl Ticket {
    /// Food lines follow menu order. Items missing from the menu are skipped.
    pub fn issue(
        cinema_name: &str,
        booking: &Booking,
        food: &BTreeMap<String, u32>,
        menu: &FoodMenu,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let food = menu
            .items()
            .iter()
            .filter_map(|item| {
                let quantity = *food.get(&item.id)?;
                (quantity > 0).then(|| TicketFoodLine {
                    name: item.name.clone(),
                    quantity,
                    unit_price: item.price,
                    subtotal: item.price * i64::from(quantity),
                })
            })
            .collect();

        Self {
            number: ticket_number(issued_at),
            cinema_name: cinema_name.to_string(),
            booking_id: booking.id,
            movie_title: booking.movie_title.clone(),
            date: booking.date,
            date_label: long_date(booking.date),
            showtime: booking.showtime.clone(),
            seats: join_seats(&booking.seats),
            customer_name: booking.customer_name.clone(),
            customer_email: booking.customer_email.clone(),
            customer_phone: booking.customer_phone.clone(),
            food,
            total: booking.total_amount,
            issued_at,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.cinema_name);
        let _ = writeln!(out, "Ticket #{}", self.number);
        let _ = writeln!(out);
        let _ = writeln!(out, "Movie:    {}", self.movie_title);
        let _ = writeln!(out, "Date:     {}", self.date_label);
        let _ = writeln!(out, "Time:     {}", self.showtime);
        let _ = writeln!(out, "Seats:    {}", self.seats);
        let _ = writeln!(out, "Customer: {}", self.customer_name);
        let _ = writeln!(out, "Email:    {}", self.customer_email);
        let _ = writeln!(out, "Phone:    {}", self.customer_phone);
        if !self.food.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Food & drinks:");
            for line in &self.food {
                let _ = writeln!(
                    out,
                    "  {}: {} × {} = {}",
                    line.name,
                    line.quantity,
                    format_naira(line.unit_price),
                    format_naira(line.subtotal)
                );
            }
        }
        let _ = writeln!(out);
        let _ = write!(out, "Total: {}", format_naira(self.total));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, NewBooking};
    use chrono::TimeZone;

    fn booking() -> Booking {
        let new = NewBooking {
            customer_name: "Ada Obi".into(),
            customer_email: "ada@example.com".into(),
            customer_phone: "08012345678".into(),
            movie_title: "Cosmic Journey".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            showtime: "6:30 PM".into(),
            seats: ["A2".parse().unwrap(), "A1".parse().unwrap()].into_iter().collect(),
            total_amount: 8000,
            status: BookingStatus::Confirmed,
        };
        Booking::from_new(Uuid::new_v4(), new, Utc::now())
    }

    #[test]
    fn number_uses_last_six_millisecond_digits() {
        let at = Utc.timestamp_millis_opt(1_740_000_123_456).unwrap();
        assert_eq!(ticket_number(at), "SQI123456");
        let early = Utc.timestamp_millis_opt(1_000_000_000_042).unwrap();
        assert_eq!(ticket_number(early), "SQI000042");
    }

    #[test]
    fn naira_formatting() {
        assert_eq!(format_naira(500), "₦500");
        assert_eq!(format_naira(2500), "₦2,500");
        assert_eq!(format_naira(1_234_567), "₦1,234,567");
    }

    #[test]
    fn renders_food_lines_and_total() {
        let menu = FoodMenu::standard();
        let food: BTreeMap<String, u32> = [("popcorn-small".to_string(), 2)].into_iter().collect();
        let ticket = Ticket::issue("SQI Cinemas", &booking(), &food, &menu, Utc::now());

        assert_eq!(ticket.seats, "A1, A2");
        assert_eq!(ticket.date_label, "Saturday, March 1, 2025");
        assert_eq!(ticket.food.len(), 1);
        assert_eq!(ticket.food[0].subtotal, 3000);

        let text = ticket.render_text();
        assert!(text.contains("Small Popcorn: 2 × ₦1,500 = ₦3,000"), "{text}");
        assert!(text.ends_with("Total: ₦8,000"));
        assert!(text.contains(&ticket.number));
    }
}
