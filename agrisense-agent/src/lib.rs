use std::sync::Arc;

use crate::configs::Settings;
use crate::errors::AppError;

pub mod app;
pub mod configs;
pub mod errors;
pub mod models;
pub mod services;

pub async fn run(settings: &Arc<Settings>) -> Result<(), AppError> {
    tracing::info!(
        farm_id = %settings.agent.farm_id,
        "Starting agent in {:?} mode",
        settings.agent.mode
    );

    app::start(settings).await
}
