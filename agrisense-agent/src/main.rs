use std::process;
use std::sync::Arc;

use agrisense_agent::configs::{RotatingLog, Settings};
use agrisense_agent::run;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let mut settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {e}");
            process::exit(1);
        }
    };

    // the host offset can only be read while the process is single threaded
    settings.schedule.pin_utc_offset();
    let settings = Arc::new(settings);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
        let level = settings.logger.level.as_str();

        format!("{app_name}={level}").into()
    });

    let file_layer = settings.logger.file.as_ref().and_then(|file| {
        match RotatingLog::open(&file.path, file.max_lines, file.keep_lines) {
            Ok(log) => Some(fmt::layer().with_ansi(false).with_writer(log)),
            Err(e) => {
                eprintln!("Log file {} unavailable: {e}", file.path);
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(&settings)) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}
