use axum::{
    Router,
    routing::{any, get, post},
};
use clap::Parser;
use ledger::catalog::{GiftCatalog, PackageCatalog};
use ledger::ledger::Ledger;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod middleware;
mod models;
mod routes;
mod websocket;

use config::ServerConfig;
use models::InMemoryStorage;
use routes::coins::{get_balance, get_transactions, list_packages, purchase_coins};
use routes::gifts::{list_gifts, send_gift};
use routes::users::{get_profile, login};
use websocket::{NotificationManager, create_notification_manager, websocket_handler};

#[derive(Parser)]
#[command(name = "coin-server")]
#[command(about = "Coin ledger and gifting API")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub packages: Arc<PackageCatalog>,
    pub gifts: Arc<GiftCatalog>,
    pub storage: InMemoryStorage,
    pub notification_manager: NotificationManager,
    pub notification_buffer: usize,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        AppState {
            ledger: Arc::new(Ledger::with_creator_share(config.creator_share_percent)),
            packages: Arc::new(PackageCatalog::default()),
            gifts: Arc::new(GiftCatalog::default()),
            storage: InMemoryStorage::new(),
            notification_manager: create_notification_manager(),
            notification_buffer: config.notification_buffer,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/profile", get(get_profile))
        .route("/coins/packages", get(list_packages))
        .route("/coins/balance", get(get_balance))
        .route("/coins/purchase", post(purchase_coins))
        .route("/coins/transactions", get(get_transactions))
        .route("/gifts", get(list_gifts))
        .route("/gifts/send", post(send_gift))
        .route("/notifications", any(websocket_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref())?;

    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let state = AppState::new(&config);
    tracing::info!(
        "Ledger initialized with {} packages, {} gifts, creator share {}%",
        state.packages.packages().len(),
        state.gifts.gifts().len(),
        state.ledger.creator_share_percent()
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Server running on http://{}", config.bind_address);
    axum::serve(listener, app(state)).await?;

    Ok(())
}

// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

// Root endpoint
async fn root() -> &'static str {
    "Coin Ledger API - Use POST /login to authenticate, POST /coins/purchase to buy coins, POST /gifts/send to send gifts, WebSocket /notifications for real-time updates"
}
