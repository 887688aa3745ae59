use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::BookingError;
use crate::models::{FoodCategory, FoodItem, Movie, MovieStatus, Screening};
use crate::reconciler::SeatView;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/food", get(food_menu))
        .route("/seats", get(seat_map))
}

// GET /api/movies?status=now-showing
#[derive(Debug, Deserialize)]
pub struct MoviesQuery {
    pub status: Option<MovieStatus>,
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MoviesQuery>,
) -> Result<Json<Vec<Movie>>, BookingError> {
    let movies = state.catalog.list_movies().await.map_err(|e| {
        tracing::error!("list_movies failed: {}", e);
        e
    })?;
    let movies = movies
        .into_iter()
        .filter(|m| params.status.map_or(true, |status| m.status == status))
        .collect();
    Ok(Json(movies))
}

// GET /api/food
#[derive(Debug, Serialize)]
pub struct FoodMenuResponse {
    pub snacks: Vec<FoodItem>,
    pub drinks: Vec<FoodItem>,
}

pub async fn food_menu(State(state): State<Arc<AppState>>) -> Json<FoodMenuResponse> {
    let menu = state.flow.menu();
    Json(FoodMenuResponse {
        snacks: menu.by_category(FoodCategory::Snacks).cloned().collect(),
        drinks: menu.by_category(FoodCategory::Drinks).cloned().collect(),
    })
}

// GET /api/seats?movie_title=&date=&showtime=
#[derive(Debug, Deserialize)]
pub struct SeatsQuery {
    pub movie_title: String,
    pub date: NaiveDate,
    pub showtime: String,
}

pub async fn seat_map(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeatsQuery>,
) -> Result<Json<Vec<SeatView>>, BookingError> {
    let screening = Screening::new(params.movie_title, params.date, params.showtime);
    Ok(Json(state.flow.seat_map(&screening).await?))
}
