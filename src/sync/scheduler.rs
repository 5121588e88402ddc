//! Daily trigger for the full-chain vault resync.

use crate::sync::service::VaultSyncService;
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Fires `run_daily_sync` once per day at a fixed UTC hour.
#[derive(Debug)]
pub struct Scheduler {
    service: Arc<VaultSyncService>,
    hour_utc: u32,
}

impl Scheduler {
    pub fn new(service: Arc<VaultSyncService>, hour_utc: u32) -> Self {
        Self {
            service,
            hour_utc: hour_utc % 24,
        }
    }

    /// Run forever, sleeping until each day's trigger hour.
    pub async fn run(&self) {
        loop {
            let wait = duration_until_hour(Utc::now(), self.hour_utc);
            info!(
                secs = wait.as_secs(),
                hour_utc = self.hour_utc,
                "next daily vault sync scheduled"
            );
            tokio::time::sleep(wait).await;

            let started = Instant::now();
            self.service.run_daily_sync().await;
            info!(
                elapsed_secs = started.elapsed().as_secs(),
                "daily vault sync cycle complete"
            );
        }
    }
}

/// Time until the next occurrence of `hour:00:00Z`, strictly in the
/// future so a cycle finishing within the trigger hour cannot re-fire.
fn duration_until_hour(now: DateTime<Utc>, hour: u32) -> Duration {
    let today_at_hour = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now);

    let next = if today_at_hour > now {
        today_at_hour
    } else {
        today_at_hour + ChronoDuration::days(1)
    };

    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_wait_until_later_today() {
        let now = at("2024-03-15T01:30:00Z");
        let wait = duration_until_hour(now, 2);
        assert_eq!(wait, Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_wait_rolls_over_to_tomorrow() {
        let now = at("2024-03-15T02:00:00Z");
        let wait = duration_until_hour(now, 2);
        assert_eq!(wait, Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn test_wait_just_past_trigger() {
        let now = at("2024-03-15T02:00:01Z");
        let wait = duration_until_hour(now, 2);
        assert_eq!(wait, Duration::from_secs(24 * 60 * 60 - 1));
    }

    #[test]
    fn test_scheduler_hour_is_wrapped() {
        // now.hour() is irrelevant; just confirm the modulo in new().
        let now = at("2024-03-15T00:00:00Z");
        assert!(now.hour() == 0);
        let wait = duration_until_hour(now, 25 % 24);
        assert_eq!(wait, Duration::from_secs(60 * 60));
    }
}
