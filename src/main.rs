use std::process;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, validate_request::ValidateRequestHeaderLayer};
use tracing_subscriber::{fmt::{writer::BoxMakeWriter, Layer}, layer::SubscriberExt, EnvFilter, Registry};

use config::{Config, StoreBackend};
use db::store::{JsonFileStore, LedgerStore, PgStore, StoreError};
use ledger::{notify::BroadcastSink, Ledger};
use routes::{auth::AuthService, AppState};

mod config;
mod db;
mod ledger;
mod routes;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            process::exit(1);
        }
    };

    // add tracing layer
    let file_appender = tracing_appender::rolling::never(".", &config.log_file);
    let (file_writer, _file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, _stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    // json lines into the log file, plain text on stdout
    let file_layer = Layer::new().json().with_writer(BoxMakeWriter::new(move || file_writer.clone()));
    let stdout_layer = Layer::new().with_writer(BoxMakeWriter::new(move || stdout_writer.clone()));

    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(file_layer)
        .with(stdout_layer);

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to set global subscriber: {err}");
        process::exit(1);
    }

    let store = match process_store(&config.store).await {
        Ok(store) => {
            tracing::info!("Ledger store ready: {:?}", config.store);
            store
        }
        Err(err) => {
            tracing::error!("Failed to open ledger store: {}", err);
            process::exit(1);
        }
    };

    let events = BroadcastSink::new(256);
    let ledger = match Ledger::open(store, Arc::new(events.clone())).await {
        Ok(ledger) => ledger,
        Err(err) => {
            tracing::error!("Failed to load ledger: {}", err);
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => {
            tracing::info!("Listening on port: {}", config.port);
            listener
        }
        Err(err) => {
            tracing::error!("Failed to bind to port: {}", err);
            process::exit(1);
        }
    };

    let state = AppState {
        ledger: Arc::new(ledger),
        auth: Arc::new(AuthService::new(config.jwt_secret.clone())),
        events,
    };
    let router = process_begin(state);
    tracing::info!("Routes constructed successfully");

    //start the http service
    let http_service = axum::serve(listener, router);
    if let Err(err) = http_service.await {
        tracing::error!("Failed to start server: {}", err);
        process::exit(1);
    }
}

fn process_begin(state: AppState) -> Router {
    let head_route = Router::new();

    // the notification stream lives here, so no json accept check
    let user_routes = routes::user::user_routes(state.clone());
    let tx_routes = routes::tx::tx_routes(state.clone())
        .route_layer(ValidateRequestHeaderLayer::accept("application/json"))
        .route_layer(CompressionLayer::new().gzip(true));
    let admin_routes = routes::admin::admin_routes(state)
        .route_layer(ValidateRequestHeaderLayer::accept("application/json"))
        .route_layer(CompressionLayer::new().gzip(true));

    head_route
        .nest("/v1", user_routes)
        .nest("/v1", tx_routes)
        .nest("/v1", admin_routes)
        .route_layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1MB limit
}

async fn process_store(backend: &StoreBackend) -> Result<Arc<dyn LedgerStore>, StoreError> {
    match backend {
        StoreBackend::Json { path } => Ok(Arc::new(JsonFileStore::new(path))),
        StoreBackend::Postgres { url, max_connections } => {
            Ok(Arc::new(PgStore::connect(url, *max_connections).await?))
        }
    }
}
