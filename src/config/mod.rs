use ::config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::reconciler::TakenSeatPolicy;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub admin: AdminConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub notification: NotificationConfig,
    pub booking: BookingConfig,
}

// Настройки приложения
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: String,
    pub cinema_name: String,
}

// Настройки базы данных
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки Redis
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

// Настройки JWT
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Сколько живёт флаг сессии администратора в Redis.
    pub session_timeout_secs: u64,
    pub bootstrap: Option<AdminBootstrap>,
}

/// Учётка администратора, создаваемая при старте, если её ещё нет.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub email: String,
    pub password: String,
}

// Настройки платежного шлюза
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub gateway_url: String,
    pub currency: String,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub template_id: i64,
    pub sender_name: String,
    pub sender_email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatHoldBackend {
    None,
    Memory,
    Redis,
}

#[derive(Debug, Clone)]
pub struct BookingConfig {
    pub store_timeout_ms: u64,
    pub seat_hold_backend: SeatHoldBackend,
    pub seat_hold_ttl_secs: u64,
    pub count_cancelled_seats_as_taken: bool,
    pub session_idle_secs: u64,
    pub session_sweep_interval_secs: u64,
}

impl BookingConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn seat_hold_ttl(&self) -> Duration {
        Duration::from_secs(self.seat_hold_ttl_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs.max(1))
    }

    pub fn taken_seat_policy(&self) -> TakenSeatPolicy {
        TakenSeatPolicy::from_flag(self.count_cancelled_seats_as_taken)
    }
}

// Плоские ключи, как в переменных окружения (DATABASE_URL -> database_url)
#[derive(Debug, Deserialize)]
struct RawSettings {
    host: String,
    port: u16,
    environment: String,
    rust_log: String,
    log_format: String,
    cinema_name: String,

    database_url: String,
    db_pool_size: u32,

    redis_url: String,

    jwt_secret: String,
    jwt_expires_in_hours: i64,

    admin_session_timeout_secs: u64,
    admin_username: Option<String>,
    admin_email: Option<String>,
    admin_password: Option<String>,

    paystack_public_key: Option<String>,
    paystack_secret_key: Option<String>,
    payment_gateway_url: String,
    payment_currency: String,

    circuit_breaker_failure_threshold: u32,
    circuit_breaker_timeout_seconds: u64,

    brevo_api_key: Option<String>,
    brevo_api_url: String,
    brevo_template_id: i64,
    notify_sender_name: String,
    notify_sender_email: String,

    store_timeout_ms: u64,
    seat_hold_backend: SeatHoldBackend,
    seat_hold_ttl_secs: u64,
    count_cancelled_seats_as_taken: bool,
    session_idle_secs: u64,
    session_sweep_interval_secs: u64,
}

impl Config {
    /// Defaults, then `cinema.toml` if present, then environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Self::defaults()?
            .add_source(File::with_name("cinema").required(false))
            .add_source(Environment::default().try_parsing(true));
        Self::from_builder(builder)
    }

    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        ::config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("environment", "development")?
            .set_default("rust_log", "cinema_booking=debug,tower_http=debug")?
            .set_default("log_format", "text")?
            .set_default("cinema_name", "SQI Cinemas")?
            .set_default("db_pool_size", 20)?
            .set_default("jwt_expires_in_hours", 24)?
            .set_default("admin_session_timeout_secs", 30)?
            .set_default("payment_gateway_url", "https://api.paystack.co")?
            .set_default("payment_currency", "NGN")?
            .set_default("circuit_breaker_failure_threshold", 5)?
            .set_default("circuit_breaker_timeout_seconds", 60)?
            .set_default("brevo_api_url", "https://api.brevo.com/v3/smtp/email")?
            .set_default("brevo_template_id", 1)?
            .set_default("notify_sender_name", "SQI Cinemas")?
            .set_default("notify_sender_email", "tickets@sqicinemas.com")?
            .set_default("store_timeout_ms", 5000)?
            .set_default("seat_hold_backend", "none")?
            .set_default("seat_hold_ttl_secs", 300)?
            .set_default("count_cancelled_seats_as_taken", true)?
            .set_default("session_idle_secs", 1800)?
            .set_default("session_sweep_interval_secs", 60)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let raw: RawSettings = builder.build()?.try_deserialize()?;

        let bootstrap = match (raw.admin_username, raw.admin_email, raw.admin_password) {
            (Some(username), Some(email), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(AdminBootstrap {
                    username,
                    email,
                    password,
                })
            }
            _ => None,
        };

        Ok(Config {
            app: AppConfig {
                host: raw.host,
                port: raw.port,
                environment: raw.environment,
                rust_log: raw.rust_log,
                log_format: raw.log_format,
                cinema_name: raw.cinema_name,
            },
            database: DatabaseConfig {
                url: raw.database_url,
                pool_size: raw.db_pool_size,
            },
            redis: RedisConfig { url: raw.redis_url },
            jwt: JwtConfig {
                secret: raw.jwt_secret,
                expires_in_hours: raw.jwt_expires_in_hours,
            },
            admin: AdminConfig {
                session_timeout_secs: raw.admin_session_timeout_secs,
                bootstrap,
            },
            payment: PaymentConfig {
                public_key: raw.paystack_public_key,
                secret_key: raw.paystack_secret_key,
                gateway_url: raw.payment_gateway_url,
                currency: raw.payment_currency,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: raw.circuit_breaker_failure_threshold,
                timeout_seconds: raw.circuit_breaker_timeout_seconds,
            },
            notification: NotificationConfig {
                api_key: raw.brevo_api_key,
                api_url: raw.brevo_api_url,
                template_id: raw.brevo_template_id,
                sender_name: raw.notify_sender_name,
                sender_email: raw.notify_sender_email,
            },
            booking: BookingConfig {
                store_timeout_ms: raw.store_timeout_ms,
                seat_hold_backend: raw.seat_hold_backend,
                seat_hold_ttl_secs: raw.seat_hold_ttl_secs,
                count_cancelled_seats_as_taken: raw.count_cancelled_seats_as_taken,
                session_idle_secs: raw.session_idle_secs,
                session_sweep_interval_secs: raw.session_sweep_interval_secs,
            },
        })
    }
}
