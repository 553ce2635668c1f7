use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use agrisense_api::{ScheduleData, ScheduleResponse};
use time::{OffsetDateTime, UtcOffset};

use crate::configs::Ingestion;
use crate::errors::ScheduleError;
use crate::models::SchedulePolicy;
use crate::services::API_KEY_HEADER;

/// Holds the active schedule policy.
///
/// Readers take a snapshot; an update swaps in a whole new policy, so a
/// reader never sees half of an update.
pub struct ScheduleController {
    policy: RwLock<Arc<SchedulePolicy>>,
    offset: UtcOffset,
}

impl ScheduleController {
    pub fn new(policy: SchedulePolicy, offset: UtcOffset) -> Self {
        Self {
            policy: RwLock::new(Arc::new(policy)),
            offset,
        }
    }

    pub fn snapshot(&self) -> Arc<SchedulePolicy> {
        self.policy.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Wall clock in the offset the window is expressed in.
    pub fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    /// Validates `data` and replaces the policy. Returns the previous and the
    /// new schedule; on error the current policy stays.
    pub fn apply(&self, data: &ScheduleData) -> Result<(ScheduleData, ScheduleData), ScheduleError> {
        let policy = SchedulePolicy::from_data(data)?;

        let old = {
            let mut current = self.policy.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, Arc::new(policy))
        };

        let (old, new) = (old.to_data(), policy.to_data());
        tracing::info!(
            "Schedule updated: {}-{} every {} min (was {}-{} every {} min)",
            new.start_time,
            new.end_time,
            new.interval_minutes,
            old.start_time,
            old.end_time,
            old.interval_minutes
        );

        Ok((old, new))
    }

    /// Asks the server for this farm's schedule. Absent fields keep their
    /// current value.
    pub async fn fetch(&self, url: &str, api_key: &str, timeout: Duration) -> Result<ScheduleData, ScheduleError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let response = http_client.get(url).header(API_KEY_HEADER, api_key).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScheduleError::Status(status.as_u16()));
        }

        let fetched: ScheduleResponse = response.json().await?;
        let data = fetched.merge_into(&self.snapshot().to_data());

        self.apply(&data)?;

        Ok(data)
    }

    /// Startup lookup. Any failure leaves the local defaults in force.
    pub async fn load_remote(&self, ingestion: &Ingestion) {
        let Some(url) = ingestion.schedule_url.as_deref().filter(|url| !url.trim().is_empty()) else {
            tracing::debug!("No schedule url configured, using local schedule");
            return;
        };

        let timeout = Duration::from_secs(ingestion.schedule_timeout_secs);
        match self.fetch(url, &ingestion.api_key, timeout).await {
            Ok(data) => tracing::info!(
                "Fetched schedule {}-{} every {} min",
                data.start_time,
                data.end_time,
                data.interval_minutes
            ),
            Err(e) => tracing::warn!("{}, keeping local schedule", e),
        }
    }
}

/// Poll loop bookkeeping between ticks.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleTick {
    pub last_collection: OffsetDateTime,
    pub in_window: bool,
}

impl ScheduleTick {
    pub fn new(policy: &SchedulePolicy, now: OffsetDateTime) -> Self {
        Self {
            last_collection: now,
            in_window: policy.within_window(now.time()),
        }
    }

    /// True when a collection is due at `now`. Entering the window restarts
    /// the interval rather than firing at once.
    pub fn advance(&mut self, policy: &SchedulePolicy, now: OffsetDateTime) -> bool {
        let in_window = policy.within_window(now.time());

        if in_window && !self.in_window {
            tracing::info!("Entered collection window at {}", now.time());
            self.last_collection = now;
        } else if !in_window && self.in_window {
            tracing::info!("Left collection window at {}", now.time());
        }
        self.in_window = in_window;

        if policy.should_collect_now(self.last_collection, now) {
            self.last_collection = now;
            return true;
        }

        false
    }
}
