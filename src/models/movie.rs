use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Сколько дней вперёд можно бронировать, если у фильма нет даты окончания проката.
pub const DEFAULT_BOOKING_WINDOW_DAYS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MovieStatus {
    NowShowing,
    ComingSoon,
}

impl MovieStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovieStatus::NowShowing => "now-showing",
            MovieStatus::ComingSoon => "coming-soon",
        }
    }
}

impl fmt::Display for MovieStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovieStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "now-showing" => Ok(MovieStatus::NowShowing),
            "coming-soon" => Ok(MovieStatus::ComingSoon),
            other => Err(format!("unknown movie status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub image: String,
    pub rating: f64,
    pub duration: String,
    pub genre: String,
    pub showtimes: Vec<String>,
    pub status: MovieStatus,
    pub release_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Movie fields as submitted by an administrator, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MovieInput {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    pub image: String,
    #[validate(range(min = 0.0, max = 10.0, message = "rating must be between 0 and 10"))]
    pub rating: f64,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub genre: String,
    #[validate(length(min = 1, message = "at least one showtime is required"))]
    pub showtimes: Vec<String>,
    pub status: MovieStatus,
    pub release_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl MovieInput {
    pub fn into_movie(self, id: Uuid) -> Movie {
        Movie {
            id,
            title: self.title,
            image: self.image,
            rating: self.rating,
            duration: self.duration,
            genre: self.genre,
            showtimes: self.showtimes,
            status: self.status,
            release_date: self.release_date,
            end_date: self.end_date,
        }
    }
}

impl Movie {
    pub fn has_showtime(&self, showtime: &str) -> bool {
        self.showtimes.iter().any(|s| s == showtime)
    }

    /// Первый день, на который можно купить билет.
    pub fn first_bookable_date(&self, today: NaiveDate) -> NaiveDate {
        self.release_date.max(today)
    }

    /// Last bookable day: the end date, or 30 days from today when absent.
    pub fn last_bookable_date(&self, today: NaiveDate) -> NaiveDate {
        self.end_date.unwrap_or_else(|| {
            today
                .checked_add_days(Days::new(DEFAULT_BOOKING_WINDOW_DAYS))
                .unwrap_or(today)
        })
    }

    pub fn is_bookable_on(&self, date: NaiveDate, today: NaiveDate) -> bool {
        date >= self.first_bookable_date(today) && date <= self.last_bookable_date(today)
    }

    pub fn bookable_dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        let last = self.last_bookable_date(today);
        self.first_bookable_date(today)
            .iter_days()
            .take_while(|d| *d <= last)
            .collect()
    }
}

/// Каталог по умолчанию для пустой базы.
pub fn default_movies(today: NaiveDate) -> Vec<MovieInput> {
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or(today);
    let showtimes = |times: [&str; 3]| times.iter().map(|t| t.to_string()).collect::<Vec<_>>();

    vec![
        MovieInput {
            title: "The Guardian".to_string(),
            image: "src/assets/movie-guardian.jpg".to_string(),
            rating: 8.7,
            duration: "2h 15m".to_string(),
            genre: "Action/Thriller".to_string(),
            showtimes: showtimes(["2:00 PM", "5:30 PM", "8:45 PM"]),
            status: MovieStatus::NowShowing,
            release_date: date(2024, 1, 15),
            end_date: None,
        },
        MovieInput {
            title: "Love Actually".to_string(),
            image: "src/assets/movie-love.jpg".to_string(),
            rating: 7.8,
            duration: "1h 58m".to_string(),
            genre: "Romance/Comedy".to_string(),
            showtimes: showtimes(["1:30 PM", "4:15 PM", "7:00 PM"]),
            status: MovieStatus::NowShowing,
            release_date: date(2024, 1, 20),
            end_date: None,
        },
        MovieInput {
            title: "Cosmic Journey".to_string(),
            image: "src/assets/movie-cosmic.jpg".to_string(),
            rating: 9.1,
            duration: "2h 35m".to_string(),
            genre: "Sci-Fi/Adventure".to_string(),
            showtimes: showtimes(["3:00 PM", "6:30 PM", "9:30 PM"]),
            status: MovieStatus::NowShowing,
            release_date: date(2024, 1, 10),
            end_date: None,
        },
        MovieInput {
            title: "Adventure Island".to_string(),
            image: "src/assets/movie-adventure.jpg".to_string(),
            rating: 8.2,
            duration: "1h 45m".to_string(),
            genre: "Animation/Family".to_string(),
            showtimes: showtimes(["12:00 PM", "2:30 PM", "5:00 PM"]),
            status: MovieStatus::ComingSoon,
            release_date: today.checked_add_days(Days::new(7)).unwrap_or(today),
            end_date: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn movie(release: NaiveDate, end: Option<NaiveDate>) -> Movie {
        MovieInput {
            title: "Cosmic Journey".into(),
            image: String::new(),
            rating: 9.1,
            duration: "2h 35m".into(),
            genre: "Sci-Fi".into(),
            showtimes: vec!["6:30 PM".into()],
            status: MovieStatus::NowShowing,
            release_date: release,
            end_date: end,
        }
        .into_movie(Uuid::new_v4())
    }

    #[test]
    fn window_defaults_to_thirty_days() {
        let today = day(2025, 3, 1);
        let m = movie(day(2024, 1, 10), None);
        assert_eq!(m.first_bookable_date(today), today);
        assert_eq!(m.last_bookable_date(today), day(2025, 3, 31));
        assert_eq!(m.bookable_dates(today).len(), 31);
        assert!(!m.is_bookable_on(day(2025, 2, 28), today));
    }

    #[test]
    fn window_starts_at_release_for_coming_soon() {
        let today = day(2025, 3, 1);
        let m = movie(day(2025, 3, 8), Some(day(2025, 3, 10)));
        assert_eq!(m.bookable_dates(today), vec![day(2025, 3, 8), day(2025, 3, 9), day(2025, 3, 10)]);
        assert!(!m.is_bookable_on(day(2025, 3, 7), today));
    }

    #[test]
    fn ended_run_has_no_dates() {
        let today = day(2025, 3, 1);
        let m = movie(day(2024, 1, 10), Some(day(2025, 2, 1)));
        assert!(m.bookable_dates(today).is_empty());
    }

    #[test]
    fn status_round_trips_as_kebab_case() {
        assert_eq!(serde_json::to_string(&MovieStatus::ComingSoon).unwrap(), r#""coming-soon""#);
        assert_eq!("now-showing".parse::<MovieStatus>(), Ok(MovieStatus::NowShowing));
        assert!("soon".parse::<MovieStatus>().is_err());
    }

    #[test]
    fn input_validation_checks_rating_and_showtimes() {
        let mut input = default_movies(day(2025, 3, 1)).remove(0);
        assert!(input.validate().is_ok());
        input.rating = 11.0;
        input.showtimes.clear();
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("rating"));
        assert!(fields.contains_key("showtimes"));
    }
}
