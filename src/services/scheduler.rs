// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Crontab-driven sync trigger.
//!
//! Schedules are classic five-field crontab expressions evaluated in UTC.
//! The `cron` crate wants a leading seconds field and numbers weekdays from
//! Sunday = 1, so expressions are translated before parsing.

use crate::models::SyncScope;
use crate::services::sync::{SyncOutcome, SyncService};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

/// Every day at 01:00 UTC.
pub const DEFAULT_CRON: &str = "0 1 * * *";

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("expected 5 fields (minute hour day month weekday), got {0}")]
    FieldCount(usize),

    #[error("invalid weekday '{0}'")]
    Weekday(String),

    #[error("invalid cron expression: {0}")]
    Invalid(#[from] cron::error::Error),
}

/// Parse a five-field crontab expression (`minute hour day month weekday`).
pub fn parse_crontab(expr: &str) -> Result<Schedule, ScheduleError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let &[minute, hour, day, month, weekday] = fields.as_slice() else {
        return Err(ScheduleError::FieldCount(fields.len()));
    };

    let weekday = translate_weekdays(weekday)?;
    let expr = format!("0 {} {} {} {} {}", minute, hour, day, month, weekday);
    Ok(Schedule::from_str(&expr)?)
}

/// Map crontab weekday numbers (0-7, Sunday = 0 or 7) to Sunday = 1.
/// Names, `*` and steps are kept as written.
fn translate_weekdays(field: &str) -> Result<String, ScheduleError> {
    let parts = field
        .split(',')
        .map(|part| -> Result<String, ScheduleError> {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (part, None),
            };
            let range = if range == "*" {
                range.to_string()
            } else {
                range
                    .split('-')
                    .map(shift_weekday)
                    .collect::<Result<Vec<_>, _>>()?
                    .join("-")
            };
            Ok(match step {
                Some(step) => format!("{}/{}", range, step),
                None => range,
            })
        })
        .collect::<Result<Vec<String>, ScheduleError>>()?;
    Ok(parts.join(","))
}

fn shift_weekday(day: &str) -> Result<String, ScheduleError> {
    if !day.is_empty() && day.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(day.to_string());
    }
    match day.parse::<u8>() {
        Ok(n) if n <= 7 => Ok((n % 7 + 1).to_string()),
        _ => Err(ScheduleError::Weekday(day.to_string())),
    }
}

/// Next firing strictly after `now`, if the schedule has one.
pub fn next_run(schedule: &Schedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&now).next()
}

/// Run a full refresh at every firing of `schedule` until `shutdown` fires.
pub async fn run_scheduled(sync: SyncService, schedule: Schedule, shutdown: CancellationToken) {
    loop {
        let now = Utc::now();
        let Some(next) = next_run(&schedule, now) else {
            tracing::warn!("Schedule has no upcoming run, scheduler stopped");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next_run = %next, "Next scheduled sync");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("Scheduler stopped");
                return;
            }
        }

        match sync.full_refresh(SyncScope::All).await {
            Ok(SyncOutcome::AlreadyRunning) => {
                tracing::warn!("Scheduled sync skipped, another sync is running")
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Scheduled sync failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        let schedule = parse_crontab(DEFAULT_CRON).unwrap();
        assert_eq!(
            next_run(&schedule, at(2024, 3, 15, 0, 30)),
            Some(at(2024, 3, 15, 1, 0))
        );
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        let schedule = parse_crontab(DEFAULT_CRON).unwrap();
        assert_eq!(
            next_run(&schedule, at(2024, 3, 15, 1, 0)),
            Some(at(2024, 3, 16, 1, 0))
        );
        assert_eq!(
            next_run(&schedule, at(2024, 12, 31, 23, 0)),
            Some(at(2025, 1, 1, 1, 0))
        );
    }

    #[test]
    fn test_every_six_hours() {
        let schedule = parse_crontab("0 */6 * * *").unwrap();
        assert_eq!(
            next_run(&schedule, at(2024, 3, 15, 7, 0)),
            Some(at(2024, 3, 15, 12, 0))
        );
    }

    #[test]
    fn test_weekdays_use_crontab_numbering() {
        // 2024-03-15 is a Friday.
        let monday = parse_crontab("0 1 * * 1").unwrap();
        assert_eq!(
            next_run(&monday, at(2024, 3, 15, 12, 0)),
            Some(at(2024, 3, 18, 1, 0))
        );

        let sunday = parse_crontab("30 8 * * 0").unwrap();
        assert_eq!(
            next_run(&sunday, at(2024, 3, 15, 12, 0)),
            Some(at(2024, 3, 17, 8, 30))
        );
        let sunday_alias = parse_crontab("30 8 * * 7").unwrap();
        assert_eq!(
            next_run(&sunday_alias, at(2024, 3, 15, 12, 0)),
            Some(at(2024, 3, 17, 8, 30))
        );
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(matches!(
            parse_crontab("0 1 * *"),
            Err(ScheduleError::FieldCount(4))
        ));
        assert!(matches!(
            parse_crontab("0 1 * * 9"),
            Err(ScheduleError::Weekday(_))
        ));
        assert!(matches!(
            parse_crontab("61 1 * * *"),
            Err(ScheduleError::Invalid(_))
        ));
    }
}
