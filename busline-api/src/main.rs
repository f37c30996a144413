use std::net::SocketAddr;
use std::sync::Arc;

use busline_api::{app, state::AuthConfig, AppState};
use busline_catalog::PricingEngine;
use busline_core::{ExpirySweeper, HoldManager, ReservationManager};
use busline_store::{StoreAvailabilityLedger, StoreScheduleCatalog};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "busline_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = busline_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Busline API on port {}", config.server.port);

    let db = busline_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let ledger = Arc::new(StoreAvailabilityLedger::new(db.pool.clone()));
    let catalog = Arc::new(StoreScheduleCatalog::new(db.pool.clone()));

    let rules = config.business_rules.booking_rules();
    let pricing = PricingEngine::new(config.business_rules.pricing_config());

    let sweeper = Arc::new(ExpirySweeper::new(ledger.clone()));
    let app_state = AppState {
        hold_manager: Arc::new(HoldManager::new(
            ledger.clone(),
            catalog.clone(),
            rules.clone(),
        )),
        reservation_manager: Arc::new(ReservationManager::new(
            ledger.clone(),
            catalog.clone(),
            pricing,
            rules,
        )),
        sweeper: sweeper.clone(),
        auth: AuthConfig {
            admin_token: config.auth.admin_token.clone(),
        },
    };

    tokio::spawn(busline_api::worker::start_sweep_worker(
        sweeper,
        config.business_rules.sweep_interval_seconds,
    ));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
