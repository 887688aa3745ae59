use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::Local;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::{basic_credentials, AdminUser};
use crate::models::{Booking, BookingFilter, BookingStatus, Movie, MovieInput};
use crate::services::admin::{AdminError, DashboardStats, LoginResponse};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/{id}", put(update_movie).delete(delete_movie))
        .route("/bookings", get(list_bookings))
        .route("/bookings/{id}/cancel", patch(cancel_booking))
        .route("/stats", get(stats))
}

/* ---------- SESSION ---------- */

// POST /api/admin/login (Basic auth)
async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<LoginResponse>, AdminError> {
    let (username, password) = basic_credentials(&headers).ok_or(AdminError::InvalidCredentials)?;
    Ok(Json(state.admin.login(&username, &password).await?))
}

// POST /api/admin/logout
async fn logout(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
) -> Result<impl IntoResponse, AdminError> {
    state.admin.logout(&admin.username).await?;
    Ok(Json(json!({ "success": true })))
}

/* ---------- MOVIES ---------- */

fn validated(input: MovieInput) -> Result<MovieInput, AdminError> {
    input
        .validate()
        .map_err(|e| AdminError::Validation(e.to_string()))?;
    if input.end_date.is_some_and(|end| end < input.release_date) {
        return Err(AdminError::Validation("end_date must not be before release_date".into()));
    }
    Ok(input)
}

async fn list_movies(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<Movie>>, AdminError> {
    Ok(Json(state.catalog.list_movies().await?))
}

async fn create_movie(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Json(input): Json<MovieInput>,
) -> Result<impl IntoResponse, AdminError> {
    let movie = state.catalog.create_movie(validated(input)?).await?;
    tracing::info!(admin = %admin.username, movie = %movie.title, "Movie created");
    Ok((StatusCode::CREATED, Json(movie)))
}

async fn update_movie(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<MovieInput>,
) -> Result<Json<Movie>, AdminError> {
    let movie = state.catalog.update_movie(id, validated(input)?).await?;
    tracing::info!(admin = %admin.username, movie = %movie.title, "Movie updated");
    Ok(Json(movie))
}

async fn delete_movie(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AdminError> {
    state.catalog.delete_movie(id).await?;
    tracing::info!(admin = %admin.username, movie = %id, "Movie deleted");
    Ok(StatusCode::NO_CONTENT)
}

/* ---------- BOOKINGS ---------- */

// GET /api/admin/bookings?date=&movie_title=
async fn list_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Vec<Booking>>, AdminError> {
    Ok(Json(state.bookings.list_bookings(filter).await?))
}

// PATCH /api/admin/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminError> {
    state
        .bookings
        .update_booking_status(id, BookingStatus::Cancelled)
        .await?;
    tracing::info!(admin = %admin.username, booking = %id, "Booking cancelled");
    Ok(Json(json!({ "success": true, "id": id, "status": BookingStatus::Cancelled })))
}

/* ---------- DASHBOARD ---------- */

async fn stats(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<DashboardStats>, AdminError> {
    let movies = state.catalog.list_movies().await?;
    let bookings = state.bookings.list_bookings(BookingFilter::default()).await?;
    Ok(Json(DashboardStats::compute(&movies, &bookings, Local::now().date_naive())))
}
