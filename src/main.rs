use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_booking::{
    config::Config,
    controllers,
    services::cleanup::CleanupService,
    store::seed_default_movies,
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.app.rust_log)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.app.log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    init_tracing(&config);

    info!("Starting {} booking API ({})", config.app.cinema_name, config.app.environment);

    let app_state = AppState::new(config.clone()).await?;

    // Пустой каталог заполняем фильмами по умолчанию
    let today = chrono::Local::now().date_naive();
    match seed_default_movies(app_state.catalog.as_ref(), today).await {
        Ok(0) => {}
        Ok(count) => info!("Catalog seeded with {} movies", count),
        Err(e) => error!("Failed to seed default movies: {}", e),
    }

    if let Some(account) = &config.admin.bootstrap {
        if let Err(e) = app_state.admin.ensure_admin(account).await {
            error!("Failed to create bootstrap admin: {}", e);
        }
    }

    // --- Start background tasks ---

    let state_for_bg = app_state.clone();
    task::spawn(async move {
        state_for_bg.cache.warmup_cache().await;
    });

    let cleanup = CleanupService::new(
        app_state.sessions.clone(),
        app_state.flow.clone(),
        config.booking.session_idle(),
    );
    task::spawn(cleanup.run(config.booking.sweep_interval()));

    // --- Start the web server ---

    let app = Router::new()
        .route("/", get(|| async { "Cinema Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(Arc::clone(&app_state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
