use std::sync::Arc;
use std::time::Duration;

use agrisense_api::{Action, Status};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc::{self, Receiver};
use tokio::time::MissedTickBehavior;

use crate::configs::{Mode, Settings};
use crate::errors::AppError;
use crate::models::{CollectionResult, SchedulePolicy, SensorRole};
use crate::services::{
    connect_sensors, create_provider, create_resolver, Collector, Credentials, FrameParser, HttpUploader,
    NoopStatus, RemoteEvent, RemoteService, ScheduleController, ScheduleTick, SerialConnector, StatusReporter,
    SystemPorts,
};

pub async fn create_collector(settings: &Arc<Settings>, status: Arc<dyn StatusReporter>) -> Result<Collector, AppError> {
    let sensors = settings.sensors.clone();
    let links = tokio::task::spawn_blocking(move || {
        let resolver = create_resolver(&sensors, Box::new(SystemPorts), Arc::new(SerialConnector));
        connect_sensors(resolver.as_ref(), &SerialConnector, &sensors)
    })
    .await
    .unwrap_or_default();

    if links.is_empty() {
        return Err(AppError::NoChannels);
    }

    let credentials = match Credentials::from_settings(&settings.ingestion) {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            tracing::warn!("{}, uploads will fail until it is configured", e);
            None
        }
    };

    let collector = Collector::new(
        FrameParser::from_settings(&settings.sensors),
        Arc::from(create_provider(&settings.artifact)),
        Arc::new(HttpUploader::from_settings(&settings.ingestion)),
        credentials,
    )
    .with_status(status)
    .with_pause(Duration::from_millis(settings.agent.collect_all_pause_ms));

    Ok(links
        .into_iter()
        .fold(collector, |collector, (role, link)| collector.with_channel(role, link)))
}

pub async fn start(settings: &Arc<Settings>) -> Result<(), AppError> {
    let schedule = Arc::new(ScheduleController::new(
        SchedulePolicy::from_data(&settings.schedule.data())?,
        settings.schedule.utc_offset(),
    ));

    match settings.agent.mode {
        Mode::Interactive => {
            let collector = create_collector(settings, Arc::new(NoopStatus)).await?;
            let result = run_console(&collector).await;
            collector.shutdown();
            result
        }
        Mode::Autonomous => {
            let collector = Arc::new(create_collector(settings, Arc::new(NoopStatus)).await?);
            schedule.load_remote(&settings.ingestion).await;

            let poller = tokio::spawn(poll_schedule(
                collector.clone(),
                schedule.clone(),
                settings.schedule.poll_period(),
            ));

            wait_for_shutdown().await;
            poller.abort();
            collector.close().await;
            Ok(())
        }
        Mode::Remote => {
            let (remote, event_loop) = RemoteService::new(settings)?;
            let remote = Arc::new(remote);
            let (sender, receiver) = mpsc::channel(32);
            let listener = remote.spawn(event_loop, sender);

            let collector = Arc::new(create_collector(settings, remote.clone()).await?);
            schedule.load_remote(&settings.ingestion).await;

            remote.report(Status::Online, Some(status_details(&collector, &schedule)));

            let poller = tokio::spawn(poll_schedule(
                collector.clone(),
                schedule.clone(),
                settings.schedule.poll_period(),
            ));
            let dispatcher = tokio::spawn(dispatch_remote(
                receiver,
                collector.clone(),
                schedule.clone(),
                remote.clone(),
            ));

            wait_for_shutdown().await;
            poller.abort();
            dispatcher.abort();

            remote.report(Status::Offline, None);
            collector.close().await;
            if let Err(e) = remote.disconnect().await {
                tracing::warn!("{}", e);
            }
            // let the disconnect go out before the connection task stops
            tokio::time::sleep(Duration::from_millis(500)).await;
            listener.abort();

            Ok(())
        }
    }
}

async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}

async fn poll_schedule(collector: Arc<Collector>, schedule: Arc<ScheduleController>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut tick = ScheduleTick::new(&schedule.snapshot(), schedule.now());
    tracing::info!(
        in_window = tick.in_window,
        "Schedule poll every {}s",
        period.as_secs()
    );

    loop {
        interval.tick().await;

        let policy = schedule.snapshot();
        if tick.advance(&policy, schedule.now()) {
            tracing::info!("Scheduled collection");
            let result = collector.collect_all().await;
            if !result.success() {
                tracing::warn!("Scheduled collection produced no data");
            }
        }
    }
}

async fn dispatch_remote(
    mut receiver: Receiver<RemoteEvent>,
    collector: Arc<Collector>,
    schedule: Arc<ScheduleController>,
    remote: Arc<RemoteService>,
) {
    while let Some(event) = receiver.recv().await {
        match event {
            RemoteEvent::Command(command) => {
                let Some(action) = command.action() else {
                    tracing::warn!("Unknown action: {}", command.action);
                    continue;
                };

                tracing::info!(%action, request_id = ?command.request_id, "Remote command");

                let collector = collector.clone();
                let schedule = schedule.clone();
                let remote = remote.clone();
                tokio::spawn(async move {
                    match action {
                        Action::CollectSoil => {
                            collector.collect(SensorRole::Soil).await;
                        }
                        Action::CollectEnv => {
                            collector.collect(SensorRole::Environmental).await;
                        }
                        Action::CollectAll => {
                            collector.collect_all().await;
                        }
                        Action::Status => {
                            remote.report(Status::Online, Some(status_details(&collector, &schedule)));
                        }
                    }
                });
            }
            RemoteEvent::Schedule(data) => match schedule.apply(&data) {
                Ok((old, new)) => {
                    let mut details = Map::new();
                    details.insert("old_schedule".into(), json!(old));
                    details.insert("new_schedule".into(), json!(new));
                    remote.report(Status::ScheduleUpdated, Some(details));
                }
                Err(e) => tracing::warn!("Rejected schedule update: {}", e),
            },
        }
    }
}

fn status_details(collector: &Collector, schedule: &ScheduleController) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("soil_connected".into(), json!(collector.connected(SensorRole::Soil)));
    details.insert("env_connected".into(), json!(collector.connected(SensorRole::Environmental)));
    details.insert("schedule".into(), json!(schedule.snapshot().to_data()));
    details
}

async fn run_console(collector: &Collector) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Commands: A = soil, B = environmental, ALL = both, Q = quit");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match line.trim().to_ascii_uppercase().as_str() {
            "A" => print_result(&collector.collect(SensorRole::Soil).await),
            "B" => print_result(&collector.collect(SensorRole::Environmental).await),
            "ALL" => {
                let result = collector.collect_all().await;
                print_result(&result.soil);
                print_result(&result.environmental);
            }
            "Q" => break,
            "" => {}
            other => println!("Unknown command: {other}"),
        }
    }

    Ok(())
}

fn print_result(result: &CollectionResult) {
    match (&result.upload_response, &result.error) {
        (Some(response), _) => println!(
            "{}: uploaded, {} records created",
            result.role, response.records_created
        ),
        (None, Some(e)) => println!("{}: {} ({})", result.role, e, e.kind()),
        (None, None) => println!("{}: no result", result.role),
    }
    if let Some(line) = result.raw_line() {
        println!("  raw: {line}");
    }
}
