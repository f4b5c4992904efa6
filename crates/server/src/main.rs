use std::sync::Arc;

use anyhow::Error as AnyhowError;
use db::{DBService, DbErr};
use server::{http, AppState};
use services::services::{
    config::CompanySettings,
    geocode::NominatimGeocoder,
    mailer::{HttpMailer, LogMailer, Mailer},
};
use thiserror::Error;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Error)]
pub enum FieldopsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), FieldopsError> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},utils={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).expect("Failed to create tracing filter");
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let db = DBService::new().await?;
    let settings = CompanySettings::from_env();

    let mailer: Arc<dyn Mailer> = match HttpMailer::from_env() {
        Some(mailer) => Arc::new(mailer),
        None => {
            tracing::warn!("FIELDOPS_MAIL_ENDPOINT not set; verification codes go to the log");
            Arc::new(LogMailer)
        }
    };
    let geocoder = Arc::new(NominatimGeocoder::from_env());

    let state = AppState::new(db, settings, mailer, geocoder);
    let app = http::router(state);

    let host = std::env::var("FIELDOPS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("FIELDOPS_PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        return;
    }
    tracing::info!("shutdown signal received");
}
