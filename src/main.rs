//! Vela Softphone Backend Server
//!
//! Stores call records from softphone clients and serves call-history and
//! analytics queries. With `softphone.simulate` enabled it also runs one
//! scripted call through the lifecycle engine at startup, which smoke-tests
//! the full dial -> answer -> hang-up -> record path without a telephony
//! provider.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vela_api::configure_calls;
use vela_core::traits::{CallRecordStore, Clock, SystemClock};
use vela_core::VelaConfig;
use vela_db::{create_pool, run_migrations, PgCallRecordStore};
use vela_services::{CallAnalyticsService, CallController};
use vela_telephony::{CallEvent, SimulatedDevice, StaticTokenProvider};

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "vela-softphone",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Configure API routes
fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Health check
            .route("/health", web::get().to(health_check))
            // Call records and analytics
            .configure(configure_calls),
    );
}

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "vela_softphone={},vela_api={},vela_db={},vela_services={},vela_telephony={},actix_web=info,sqlx=warn",
            log_level, log_level, log_level, log_level, log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Drive one scripted call through the lifecycle engine and record it
async fn run_simulated_call(
    store: Arc<dyn CallRecordStore>,
    identity: String,
) -> anyhow::Result<()> {
    let device = Arc::new(SimulatedDevice::new());
    let tokens = Arc::new(StaticTokenProvider::new("simulated-token"));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let controller = CallController::new(device.clone(), tokens, store, clock);

    controller.init(&identity).await?;

    let mut state = controller.subscribe_connection();
    while !state.borrow().is_call_capable() {
        state.changed().await?;
    }

    controller.dial("+15105550123").await?;
    let handle = device
        .last_outgoing()
        .ok_or_else(|| anyhow::anyhow!("no outgoing call was placed"))?;

    device.emit_call(Some(handle.id()), CallEvent::Accepted);
    tokio::time::sleep(Duration::from_secs(2)).await;
    controller.end_call().await?;
    controller.reset().await;

    info!("simulated call completed and recorded for {}", identity);
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    init_tracing();

    info!(
        "Starting Vela softphone backend v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = VelaConfig::load().map_err(|e| anyhow::anyhow!("configuration error: {}", e))?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;

    let store: Arc<dyn CallRecordStore> = Arc::new(PgCallRecordStore::new(pool));
    let analytics = CallAnalyticsService::new(store.clone(), Arc::new(SystemClock));

    if config.softphone.simulate {
        let store = store.clone();
        let identity = config.softphone.simulate_identity.clone();
        tokio::spawn(async move {
            if let Err(e) = run_simulated_call(store, identity).await {
                error!("simulated call failed: {}", e);
            }
        });
    }

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    let cors_origins = config.server.cors_origins.clone();

    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    let store_data = web::Data::new(store);
    let analytics_data = web::Data::new(analytics);

    HttpServer::new(move || {
        // Configure CORS - clone origins for each worker
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .allowed_header("X-Identity")
            .max_age(3600);

        App::new()
            // Shared services
            .app_data(store_data.clone())
            .app_data(analytics_data.clone())
            // Middleware
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::trim())
            // Configure routes
            .configure(configure_routes)
            // Root redirect to health
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
