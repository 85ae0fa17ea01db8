//! Calendar scheduling: weekly ingestion runs and hourly cache sweeps
//!
//! The weekly trigger is computed from the wall clock on every cycle
//! (calendar-based, not deadline-based), so process restarts never shift
//! the schedule.

use crate::orchestrator::Orchestrator;
use annotarium_core::{AnnotariumError, AnnotariumResult, Config};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Utc, Weekday};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};

pub struct Scheduler {
    config: Config,
    orchestrator: Arc<Orchestrator>,
}

impl Scheduler {
    pub fn new(config: Config, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Run the weekly ingestion trigger forever.
    pub async fn run_ingestion_trigger(&self) -> AnnotariumResult<()> {
        let weekday = parse_weekday(&self.config.schedule.ingest_weekday)?;
        let hour = self.config.schedule.ingest_hour.min(23);

        loop {
            let now = Utc::now();
            let fire_at = next_weekly_fire(now, weekday, hour);
            let wait = (fire_at - now)
                .to_std()
                .unwrap_or_else(|_| Duration::from_secs(0));
            info!(%fire_at, wait_secs = wait.as_secs(), "next ingestion run scheduled");
            tokio::time::sleep(wait).await;

            match self.orchestrator.run().await {
                Ok(report) => info!(?report, "scheduled ingestion finished"),
                Err(e) => error!(error = %e, "scheduled ingestion failed"),
            }
        }
    }

    /// Run the hourly downloads-cache sweep forever.
    pub async fn run_cache_sweeper(&self) -> AnnotariumResult<()> {
        let ttl = Duration::from_secs(self.config.storage.downloads_cache_ttl_secs);
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match sweep_downloads_cache(&self.config.storage.downloads_cache_dir, ttl) {
                Ok(removed) if removed > 0 => info!(removed, "downloads cache swept"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "downloads cache sweep failed"),
            }
        }
    }
}

/// Next occurrence of `weekday` at `hour:00` UTC strictly after `now`.
fn next_weekly_fire(now: DateTime<Utc>, weekday: Weekday, hour: u32) -> DateTime<Utc> {
    let today_fire = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), hour, 0, 0)
        .single()
        .unwrap_or(now);
    let days_ahead = (7 + weekday.num_days_from_monday() as i64
        - now.weekday().num_days_from_monday() as i64)
        % 7;
    let mut fire = today_fire + ChronoDuration::days(days_ahead);
    if fire <= now {
        fire += ChronoDuration::days(7);
    }
    fire
}

fn parse_weekday(raw: &str) -> AnnotariumResult<Weekday> {
    raw.parse::<Weekday>().map_err(|_| {
        AnnotariumError::Configuration(format!("invalid ingestion weekday: {raw}"))
    })
}

/// Remove files older than `ttl` from the downloads cache, pruning emptied
/// subdirectories.
pub fn sweep_downloads_cache(dir: &Path, ttl: Duration) -> AnnotariumResult<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let cutoff = SystemTime::now()
        .checked_sub(ttl)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0usize;
    sweep_dir(dir, cutoff, &mut removed)?;
    Ok(removed)
}

fn sweep_dir(dir: &Path, cutoff: SystemTime, removed: &mut usize) -> AnnotariumResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            sweep_dir(&path, cutoff, removed)?;
            if std::fs::read_dir(&path)?.next().is_none() {
                std::fs::remove_dir(&path)?;
            }
        } else if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            if modified < cutoff {
                std::fs::remove_file(&path)?;
                *removed += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_next_weekly_fire_same_week() {
        // Wednesday 2024-05-01 10:00 UTC; fire Sundays at 02:00
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let fire = next_weekly_fire(now, Weekday::Sun, 2);
        assert_eq!(fire, Utc.with_ymd_and_hms(2024, 5, 5, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_next_weekly_fire_rolls_over() {
        // Sunday after the firing hour rolls to next Sunday
        let now = Utc.with_ymd_and_hms(2024, 5, 5, 3, 0, 0).unwrap();
        let fire = next_weekly_fire(now, Weekday::Sun, 2);
        assert_eq!(fire, Utc.with_ymd_and_hms(2024, 5, 12, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_next_weekly_fire_same_day_before_hour() {
        let now = Utc.with_ymd_and_hms(2024, 5, 5, 1, 0, 0).unwrap();
        let fire = next_weekly_fire(now, Weekday::Sun, 2);
        assert_eq!(fire, Utc.with_ymd_and_hms(2024, 5, 5, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("sunday").unwrap(), Weekday::Sun);
        assert_eq!(parse_weekday("Mon").unwrap(), Weekday::Mon);
        assert!(parse_weekday("someday").is_err());
    }

    #[test]
    fn test_sweep_keeps_files_within_ttl() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("fresh.gff");
        std::fs::write(&file, b"y").unwrap();

        let removed = sweep_downloads_cache(dir.path(), Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 0);
        assert!(file.exists());
    }

    #[test]
    fn test_sweep_removes_expired_files_and_empty_dirs() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path().join("abc123");
        std::fs::create_dir_all(&workspace).unwrap();
        let stale = workspace.join("stale.gff");
        std::fs::write(&stale, b"x").unwrap();

        // zero TTL expires everything already on disk
        let removed = sweep_downloads_cache(dir.path(), Duration::from_secs(0)).unwrap();
        assert_eq!(removed, 1);
        assert!(!stale.exists());
        assert!(!workspace.exists());
    }

    #[test]
    fn test_sweep_missing_dir_is_noop() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(
            sweep_downloads_cache(&missing, Duration::from_secs(10)).unwrap(),
            0
        );
    }
}
