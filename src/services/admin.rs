//! Admin session surface.
//!
//! Вход по Basic-учётке (bcrypt-хэш в `admin_users`), на выходе JWT и флаг
//! `admin:session:{username}` в Redis с коротким TTL. Администратор
//! авторизован, пока токен валиден и флаг жив.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::{AdminBootstrap, AdminConfig, JwtConfig};
use crate::error::ApiError;
use crate::models::{Booking, BookingStatus, Movie};
use crate::redis_client::RedisClient;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("admin session expired, please log in again")]
    SessionExpired,
    #[error("{0}")]
    Validation(String),
    #[error("invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminError::InvalidCredentials | AdminError::SessionExpired | AdminError::Token(_) => {
                StatusCode::UNAUTHORIZED
            }
            AdminError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AdminError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AdminError::Store(StoreError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AdminError::Store(_) | AdminError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            AdminError::Hash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Admin request failed: {}", self);
        }
        (status, Json(ApiError::new(self.to_string()))).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Выпуск и проверка JWT.
#[derive(Clone)]
pub struct AdminTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_hours: i64,
}

impl AdminTokens {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl_hours: config.expires_in_hours,
        }
    }

    pub fn issue(&self, username: &str) -> Result<String, AdminError> {
        let now = Utc::now().timestamp();
        let claims = AdminClaims {
            sub: username.to_string(),
            iat: now,
            exp: now + self.ttl_hours * 3600,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<AdminClaims, AdminError> {
        let data = decode::<AdminClaims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    /// Seconds until the session flag expires.
    pub expires_in: u64,
}

#[derive(sqlx::FromRow)]
struct AdminRow {
    username: String,
    password_hash: String,
}

fn session_key(username: &str) -> String {
    format!("admin:session:{}", username)
}

#[derive(Clone)]
pub struct AdminService {
    pool: PgPool,
    redis: RedisClient,
    tokens: AdminTokens,
    session_timeout_secs: u64,
}

impl AdminService {
    pub fn new(pool: PgPool, redis: RedisClient, jwt: &JwtConfig, admin: &AdminConfig) -> Self {
        Self {
            pool,
            redis,
            tokens: AdminTokens::new(jwt),
            session_timeout_secs: admin.session_timeout_secs.max(1),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AdminError> {
        let row: Option<AdminRow> =
            sqlx::query_as("SELECT username, password_hash FROM admin_users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        let admin = row.ok_or(AdminError::InvalidCredentials)?;
        if !bcrypt::verify(password, &admin.password_hash)? {
            warn!(username = %username, "Admin login rejected");
            return Err(AdminError::InvalidCredentials);
        }

        let token = self.tokens.issue(&admin.username)?;
        let mut conn = self.redis.conn.clone();
        let _: () = conn
            .set_ex(session_key(&admin.username), Utc::now().timestamp(), self.session_timeout_secs)
            .await
            .map_err(StoreError::from)?;

        info!(username = %admin.username, "Admin logged in");
        Ok(LoginResponse {
            token,
            username: admin.username,
            expires_in: self.session_timeout_secs,
        })
    }

    pub async fn logout(&self, username: &str) -> Result<(), AdminError> {
        let mut conn = self.redis.conn.clone();
        let _: i64 = conn.del(session_key(username)).await.map_err(StoreError::from)?;
        info!(username = %username, "Admin logged out");
        Ok(())
    }

    /// "Is an admin currently authorized" for this username.
    pub async fn is_authorized(&self, username: &str) -> Result<bool, AdminError> {
        let mut conn = self.redis.conn.clone();
        let alive: bool = conn.exists(session_key(username)).await.map_err(StoreError::from)?;
        Ok(alive)
    }

    /// Проверяет токен и живость сессии, возвращает имя администратора.
    pub async fn authorize(&self, token: &str) -> Result<String, AdminError> {
        let claims = self.tokens.verify(token)?;
        if !self.is_authorized(&claims.sub).await? {
            return Err(AdminError::SessionExpired);
        }
        Ok(claims.sub)
    }

    pub async fn ensure_admin(&self, account: &AdminBootstrap) -> Result<bool, AdminError> {
        let hash = bcrypt::hash(&account.password, bcrypt::DEFAULT_COST)?;
        let created = sqlx::query(
            "INSERT INTO admin_users (username, email, password_hash)
             VALUES ($1, $2, $3)
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&hash)
        .execute(&self.pool)
        .await?
        .rows_affected()
            > 0;

        if created {
            info!(username = %account.username, "Bootstrap admin account created");
        }
        Ok(created)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_movies: usize,
    pub total_bookings: usize,
    /// Сумма по всем неотменённым броням.
    pub revenue: i64,
    pub bookings_today: usize,
}

impl DashboardStats {
    pub fn compute(movies: &[Movie], bookings: &[Booking], today: NaiveDate) -> Self {
        Self {
            total_movies: movies.len(),
            total_bookings: bookings.len(),
            revenue: bookings
                .iter()
                .filter(|b| b.status != BookingStatus::Cancelled)
                .map(|b| b.total_amount)
                .sum(),
            bookings_today: bookings.iter().filter(|b| b.date == today).count(),
        }
    }
}
