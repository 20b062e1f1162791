//! Back office for a studio website whose content lives in a Google
//! spreadsheet, with images stored in Drive.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod errors;
pub mod hydrate;
pub mod images;
pub mod links;
pub mod metrics_defs;
pub mod pipeline;
pub mod records;
pub mod rows;

#[cfg(test)]
mod testutils;

use api::AppState;
use config::Config;
use google::{Google, GoogleError};

#[derive(thiserror::Error, Debug)]
pub enum BackofficeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Google client error: {0}")]
    Google(#[from] GoogleError),
}

/// Builds the Google clients and serves the HTTP API until the server stops.
pub async fn run(config: Config) -> Result<(), BackofficeError> {
    let google = Google::new(&config.google)?;

    if config.admin.token.is_none() {
        tracing::warn!("No admin token configured, admin routes are open");
    }

    let state = AppState::new(&google, &config);
    api::serve(&config.listener, state).await?;
    Ok(())
}
