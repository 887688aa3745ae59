use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::Booking;
use crate::services::payment::PaymentOutcome;
use crate::services::ticket::Ticket;
use crate::wizard::{
    flow::{PaymentResult, StepOutcome},
    SessionView, WizardEvent,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings/sessions", post(start_session))
        .route("/bookings/sessions/{id}", get(get_session).delete(reset_session))
        .route("/bookings/sessions/{id}/events", post(apply_event))
        .route("/bookings/sessions/{id}/payment", post(complete_payment))
}

/* ---------- SESSIONS ---------- */

// POST /api/bookings/sessions
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub movie_title: String,
    pub showtime: Option<String>,
}

pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let today = Local::now().date_naive();
    let session = state
        .flow
        .start(&req.movie_title, req.showtime.as_deref(), today)
        .await?;
    let view = session.view();
    state.sessions.insert(session).await;
    Ok((StatusCode::CREATED, Json(view)))
}

// GET /api/bookings/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, BookingError> {
    let session = state.sessions.acquire(id).await?;
    Ok(Json(session.view()))
}

// DELETE /api/bookings/sessions/{id}
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, BookingError> {
    let mut session = state.sessions.remove(id).await?;
    state.flow.reset(&mut session).await;
    Ok(StatusCode::NO_CONTENT)
}

/* ---------- EVENTS ---------- */

#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub session: SessionView,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

// POST /api/bookings/sessions/{id}/events
pub async fn apply_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(event): Json<WizardEvent>,
) -> Result<Json<StepResponse>, BookingError> {
    let mut session = state.sessions.acquire(id).await?;
    let outcome = state.flow.apply(&mut session, event).await?;
    Ok(Json(StepResponse {
        session: session.view(),
        outcome,
    }))
}

/* ---------- PAYMENT CALLBACK ---------- */

#[derive(Debug, Deserialize)]
pub struct PaymentCallback {
    pub reference: String,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub success: bool,
    pub status: &'static str,
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Ticket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_text: Option<String>,
    pub session: SessionView,
}

// POST /api/bookings/sessions/{id}/payment
pub async fn complete_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(callback): Json<PaymentCallback>,
) -> Result<Json<PaymentResponse>, BookingError> {
    let mut session = state.sessions.acquire(id).await?;
    let result = state
        .flow
        .complete_payment(&mut session, &callback.reference, callback.outcome)
        .await?;

    let response = match result {
        PaymentResult::Confirmed { booking, ticket } => PaymentResponse {
            success: true,
            status: "confirmed",
            booking,
            ticket_text: Some(ticket.render_text()),
            ticket: Some(ticket),
            session: session.view(),
        },
        PaymentResult::Cancelled { booking } => PaymentResponse {
            success: true,
            status: "cancelled",
            booking,
            ticket: None,
            ticket_text: None,
            session: session.view(),
        },
    };
    Ok(Json(response))
}
