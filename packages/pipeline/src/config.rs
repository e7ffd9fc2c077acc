//! Scheduler tuning (`scheduler.json`) and the helpers that turn its
//! human-friendly settings into 6-field cron expressions.

use serde::{Deserialize, Serialize};

fn default_update_time() -> String {
    "02:30".to_string()
}

fn default_cleanup_day() -> String {
    "sunday".to_string()
}

fn default_cleanup_time() -> String {
    "03:30".to_string()
}

fn default_sync_time() -> String {
    "04:30".to_string()
}

fn default_cleanup_days_old() -> u32 {
    30
}

fn default_retention_days() -> u32 {
    90
}

fn default_check_interval_hours() -> u32 {
    6
}

fn default_refresh_hours_old() -> u32 {
    24
}

fn default_history_limit() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Daily full-crawl time, HH:MM.
    #[serde(default = "default_update_time")]
    pub update_time: String,

    /// Weekday of the cleanup run (english name, e.g. "sunday").
    #[serde(default = "default_cleanup_day")]
    pub cleanup_day: String,

    #[serde(default = "default_cleanup_time")]
    pub cleanup_time: String,

    /// NEW/FAILED links older than this become OBSOLETE.
    #[serde(default = "default_cleanup_days_old")]
    pub cleanup_days_old: u32,

    /// OBSOLETE links (and their history) older than this are deleted.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Refresh cadence in hours.
    #[serde(default = "default_check_interval_hours")]
    pub check_interval_hours: u32,

    /// Refresh re-crawls links whose last crawl is older than this.
    #[serde(default = "default_refresh_hours_old")]
    pub refresh_hours_old: u32,

    /// Daily reconciliation time, HH:MM.
    #[serde(default = "default_sync_time")]
    pub sync_time: String,

    /// Bounded job history (FIFO).
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("empty config uses defaults")
    }
}

/// `"02:30"` → `"0 30 2 * * *"`. Falls back to midnight on
/// unparsable input rather than refusing to start.
pub fn daily_cron(time: &str) -> String {
    let (hour, minute) = parse_time(time).unwrap_or((0, 0));
    format!("0 {minute} {hour} * * *")
}

/// `("sunday", "03:30")` → `"0 30 3 * * SUN"`.
pub fn weekly_cron(day: &str, time: &str) -> String {
    let (hour, minute) = parse_time(time).unwrap_or((0, 0));
    let dow = match day.to_ascii_lowercase().as_str() {
        "monday" => "MON",
        "tuesday" => "TUE",
        "wednesday" => "WED",
        "thursday" => "THU",
        "friday" => "FRI",
        "saturday" => "SAT",
        _ => "SUN",
    };
    format!("0 {minute} {hour} * * {dow}")
}

/// `6` → `"0 0 */6 * * *"`. Zero is clamped to hourly.
pub fn every_hours_cron(hours: u32) -> String {
    format!("0 0 */{} * * *", hours.max(1))
}

fn parse_time(time: &str) -> Option<(u32, u32)> {
    let (hour, minute) = time.split_once(':')?;
    let hour: u32 = hour.trim().parse().ok()?;
    let minute: u32 = minute.trim().parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_cron_from_update_time() {
        assert_eq!(daily_cron("02:30"), "0 30 2 * * *");
        assert_eq!(daily_cron("23:05"), "0 5 23 * * *");
    }

    #[test]
    fn invalid_times_fall_back_to_midnight() {
        assert_eq!(daily_cron("25:00"), "0 0 0 * * *");
        assert_eq!(daily_cron("not a time"), "0 0 0 * * *");
    }

    #[test]
    fn weekly_cron_names_the_day() {
        assert_eq!(weekly_cron("sunday", "03:30"), "0 30 3 * * SUN");
        assert_eq!(weekly_cron("Friday", "12:00"), "0 0 12 * * FRI");
        // Unknown weekday defaults to Sunday.
        assert_eq!(weekly_cron("someday", "03:30"), "0 30 3 * * SUN");
    }

    #[test]
    fn interval_cron_clamps_zero() {
        assert_eq!(every_hours_cron(6), "0 0 */6 * * *");
        assert_eq!(every_hours_cron(0), "0 0 */1 * * *");
    }

    #[test]
    fn defaults_are_sane() {
        let config = SchedulerConfig::default();
        assert_eq!(config.update_time, "02:30");
        assert_eq!(config.cleanup_days_old, 30);
        assert_eq!(config.history_limit, 50);
    }
}
