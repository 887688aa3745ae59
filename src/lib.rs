pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pricing;
pub mod reconciler;
pub mod redis_client;
pub mod seat_hold;
pub mod services;
pub mod store;
pub mod wizard;

use std::sync::Arc;
use tracing::info;

use crate::config::{Config, SeatHoldBackend};
use crate::seat_hold::{MemorySeatHold, NoSeatHold, RedisSeatHold, SeatHoldService};
use crate::services::admin::AdminService;
use crate::services::notification::BrevoNotifier;
use crate::services::payment::PaystackClient;
use crate::store::{BookingStore, CatalogStore};
use crate::wizard::{flow::BookingFlow, registry::SessionRegistry};

// Shared state для всего приложения
pub struct AppState {
    pub config: Config,
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    pub cache: cache::CacheService,
    /// Каталог через кеш; записи сбрасывают кеш.
    pub catalog: Arc<dyn CatalogStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub flow: Arc<BookingFlow>,
    pub sessions: Arc<SessionRegistry>,
    pub admin: AdminService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database).await?;
        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        info!("Redis connected");

        let store = Arc::new(db.store());
        let cache = cache::CacheService::new(redis.clone(), store.clone());
        let catalog: Arc<dyn CatalogStore> = Arc::new(cache.clone());
        let bookings: Arc<dyn BookingStore> = store;

        let holds: Arc<dyn SeatHoldService> = match config.booking.seat_hold_backend {
            SeatHoldBackend::None => Arc::new(NoSeatHold),
            SeatHoldBackend::Memory => Arc::new(MemorySeatHold::new(config.booking.seat_hold_ttl())),
            SeatHoldBackend::Redis => Arc::new(RedisSeatHold::new(redis.clone(), config.booking.seat_hold_ttl())),
        };
        info!(backend = ?config.booking.seat_hold_backend, "Seat holds configured");

        let payments = Arc::new(PaystackClient::new(&config.payment, &config.circuit_breaker)?);
        let notifier = BrevoNotifier::from_config(&config.notification)?;

        let flow = BookingFlow::new(catalog.clone(), bookings.clone(), payments)
            .with_seat_holds(holds)
            .with_notifier(notifier)
            .with_store_timeout(config.booking.store_timeout())
            .with_taken_seat_policy(config.booking.taken_seat_policy())
            .with_cinema_name(config.app.cinema_name.clone())
            .with_currency(config.payment.currency.clone());

        let admin = AdminService::new(db.pool.clone(), redis.clone(), &config.jwt, &config.admin);

        Ok(Arc::new(Self {
            config,
            db,
            redis,
            cache,
            catalog,
            bookings,
            flow: Arc::new(flow),
            sessions: Arc::new(SessionRegistry::new()),
            admin,
        }))
    }
}
