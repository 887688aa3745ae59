use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ряды зала, от экрана к задней стене.
pub const ROWS: [char; 8] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H'];
pub const SEATS_PER_ROW: u8 = 12;

/// Seat identifier of the form `{row}{number}`, e.g. `C7`.
///
/// Seats are never persisted on their own; a seat is taken when some booking
/// for the same screening lists it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatId {
    row: char,
    number: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeatIdError {
    #[error("seat id is empty")]
    Empty,
    #[error("unknown row '{0}', expected A-H")]
    UnknownRow(char),
    #[error("invalid seat number in '{0}', expected 1-12")]
    InvalidNumber(String),
}

impl SeatId {
    pub fn new(row: char, number: u8) -> Result<Self, SeatIdError> {
        let row = row.to_ascii_uppercase();
        if !ROWS.contains(&row) {
            return Err(SeatIdError::UnknownRow(row));
        }
        if !(1..=SEATS_PER_ROW).contains(&number) {
            return Err(SeatIdError::InvalidNumber(format!("{row}{number}")));
        }
        Ok(Self { row, number })
    }

    pub fn row(&self) -> char {
        self.row
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    /// Все 96 мест в порядке рядов.
    pub fn all() -> impl Iterator<Item = SeatId> {
        ROWS.into_iter()
            .flat_map(|row| (1..=SEATS_PER_ROW).map(move |number| SeatId { row, number }))
    }
}

impl FromStr for SeatId {
    type Err = SeatIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let row = chars.next().ok_or(SeatIdError::Empty)?;
        let number: u8 = chars
            .as_str()
            .parse()
            .map_err(|_| SeatIdError::InvalidNumber(s.to_string()))?;
        SeatId::new(row, number)
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.number)
    }
}

impl TryFrom<String> for SeatId {
    type Error = SeatIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeatId> for String {
    fn from(seat: SeatId) -> Self {
        seat.to_string()
    }
}

/// Joins seat ids the way tickets and receipts print them: `A1, A2`.
pub fn join_seats<'a>(seats: impl IntoIterator<Item = &'a SeatId>) -> String {
    seats
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_ids() {
        let seat: SeatId = "C7".parse().unwrap();
        assert_eq!(seat.row(), 'C');
        assert_eq!(seat.number(), 7);
        assert_eq!(seat.to_string(), "C7");
        assert_eq!("h12".parse::<SeatId>().unwrap().to_string(), "H12");
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!("".parse::<SeatId>(), Err(SeatIdError::Empty));
        assert_eq!("Z1".parse::<SeatId>(), Err(SeatIdError::UnknownRow('Z')));
        assert!(matches!("A0".parse::<SeatId>(), Err(SeatIdError::InvalidNumber(_))));
        assert!(matches!("A13".parse::<SeatId>(), Err(SeatIdError::InvalidNumber(_))));
        assert!(matches!("Ax".parse::<SeatId>(), Err(SeatIdError::InvalidNumber(_))));
    }

    #[test]
    fn seat_map_has_96_ordered_seats() {
        let all: Vec<SeatId> = SeatId::all().collect();
        assert_eq!(all.len(), 96);
        assert_eq!(all.first().unwrap().to_string(), "A1");
        assert_eq!(all.last().unwrap().to_string(), "H12");
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn serde_uses_plain_strings() {
        let seats: Vec<SeatId> = serde_json::from_str(r#"["A1","B10"]"#).unwrap();
        assert_eq!(serde_json::to_string(&seats).unwrap(), r#"["A1","B10"]"#);
        assert!(serde_json::from_str::<SeatId>(r#""Q3""#).is_err());
    }
}
