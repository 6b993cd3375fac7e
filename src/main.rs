use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::Method, response::Json, routing::get, Router};
use mongodb::bson::doc;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod config;
mod database;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
mod store;

use axum::extract::State;
use config::AppConfig;
use database::connection::get_db_client;
use services::mpesa_service::MpesaService;
use state::AppState;
use store::{MongoTransactionStore, TransactionStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env();
    tracing::info!("M-Pesa environment: {}", config.mpesa_environment);
    tracing::info!("Business short code: {}", config.mpesa_short_code);

    let addr = SocketAddr::new(
        config.host.parse().unwrap_or([0, 0, 0, 0].into()),
        config.port,
    );

    let db = get_db_client(&config.database_url).await;
    let app_state = initialize_app_state(db, config).await;

    let app = build_router(app_state);
    start_server(app, addr).await;
}

async fn initialize_app_state(db: mongodb::Database, config: AppConfig) -> AppState {
    let store = MongoTransactionStore::new(&db);
    if let Err(e) = store.ensure_indexes().await {
        tracing::warn!("Failed to ensure transaction indexes: {}", e);
    }

    let mpesa = Arc::new(MpesaService::new(config.clone()));

    // Verify credentials up front so a bad key pair shows up in the
    // logs at startup rather than on the first payment.
    match mpesa.get_access_token().await {
        Ok(token) => {
            tracing::info!("M-Pesa access token obtained");
            tracing::debug!("Token (first 20 chars): {}", &token[0..20.min(token.len())]);
        }
        Err(e) => {
            tracing::warn!("Could not obtain M-Pesa access token at startup: {}", e);
        }
    }

    let store: Arc<dyn TransactionStore> = Arc::new(store);
    AppState::new(db, store, mpesa, Arc::new(config))
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .route("/debug/config", get(debug_config))
        .nest("/api/mpesa", routes::payments::payment_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router, addr: SocketAddr) {
    tracing::info!("Server starting on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            axum::serve(listener, app).await.unwrap();
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "M-Pesa Payments API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

// Debug endpoint to inspect the non-secret configuration
async fn debug_config(State(state): State<AppState>) -> Json<Value> {
    Json(state.config.get_config_info())
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match state.db.run_command(doc! {"ping": 1}).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "environment": state.config.mpesa_environment,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
