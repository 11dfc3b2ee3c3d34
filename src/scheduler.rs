//! Long-running trigger loop for `serve`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, TimeZone};

use crate::app::App;
use crate::error::Result;

const CLEANUP_DAY: u32 = 1;

/// Run the fetch, report and cleanup jobs on their cadences until Ctrl-C.
/// Each firing is spawned, so a slow job never delays the next trigger.
pub async fn serve(app: Arc<App>) -> Result<()> {
    let config = app.config();
    let fetch_every = Duration::from_secs(u64::from(config.fetch_interval_minutes) * 60);
    let push_time = config.push_time()?;
    let cleanup_time = NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default();

    tracing::info!(
        fetch_every_minutes = config.fetch_interval_minutes,
        push_time = %push_time,
        feeds = config.feeds.len(),
        "Scheduler started"
    );

    let fetch_loop = {
        let app = app.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + fetch_every,
                fetch_every,
            );
            loop {
                ticker.tick().await;
                spawn_job("fetch", app.clone(), |app| async move {
                    app.fetch(None).await.map(|_| ())
                });
            }
        })
    };

    let report_loop = {
        let app = app.clone();
        tokio::spawn(async move {
            loop {
                let Some(next) = next_daily(&Local::now(), push_time) else {
                    tracing::error!("Cannot compute next report time, stopping report trigger");
                    break;
                };
                sleep_until(next).await;
                spawn_job("report", app.clone(), |app| async move {
                    app.report().await.map(|_| ())
                });
            }
        })
    };

    let cleanup_loop = {
        let app = app.clone();
        tokio::spawn(async move {
            loop {
                let Some(next) = next_monthly(&Local::now(), CLEANUP_DAY, cleanup_time) else {
                    tracing::error!("Cannot compute next cleanup time, stopping cleanup trigger");
                    break;
                };
                sleep_until(next).await;
                spawn_job("cleanup", app.clone(), |app| async move {
                    app.cleanup(None).await.map(|_| ())
                });
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down scheduler");

    fetch_loop.abort();
    report_loop.abort();
    cleanup_loop.abort();
    Ok(())
}

fn spawn_job<F, Fut>(name: &'static str, app: Arc<App>, job: F)
where
    F: FnOnce(Arc<App>) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let fut = job(app);
    tokio::spawn(async move {
        tracing::info!(job = name, "Job started");
        match fut.await {
            Ok(()) => tracing::info!(job = name, "Job completed"),
            Err(e) => tracing::error!(job = name, error = %e, "Job failed"),
        }
    });
}

async fn sleep_until(when: DateTime<Local>) {
    let wait = (when - Local::now()).to_std().unwrap_or_default();
    tracing::debug!(next = %when, "Sleeping until next trigger");
    tokio::time::sleep(wait).await;
}

/// The first instant strictly after `now` whose local time is `at`.
pub fn next_daily<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let mut date = now.date_naive();

    // A DST gap can swallow `at` on one day, never on consecutive ones
    for _ in 0..3 {
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(at)).earliest() {
            if candidate > *now {
                return Some(candidate);
            }
        }
        date = date.succ_opt()?;
    }
    None
}

/// The first instant strictly after `now` falling on `day` of a month at `at`.
pub fn next_monthly<Tz: TimeZone>(now: &DateTime<Tz>, day: u32, at: NaiveTime) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let (mut year, mut month) = (now.year(), now.month());

    for _ in 0..13 {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if let Some(candidate) = tz.from_local_datetime(&date.and_time(at)).earliest() {
                if candidate > *now {
                    return Some(candidate);
                }
            }
        }
        (year, month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn daily_trigger_is_today_or_tomorrow() {
        assert_eq!(
            next_daily(&utc(2024, 3, 10, 8, 0), hm(9, 0)),
            Some(utc(2024, 3, 10, 9, 0))
        );
        assert_eq!(
            next_daily(&utc(2024, 3, 10, 9, 0), hm(9, 0)),
            Some(utc(2024, 3, 11, 9, 0))
        );
        assert_eq!(
            next_daily(&utc(2024, 12, 31, 23, 30), hm(9, 0)),
            Some(utc(2025, 1, 1, 9, 0))
        );
    }

    #[test]
    fn monthly_trigger_rolls_over_the_year() {
        assert_eq!(
            next_monthly(&utc(2024, 5, 1, 2, 0), 1, hm(3, 0)),
            Some(utc(2024, 5, 1, 3, 0))
        );
        assert_eq!(
            next_monthly(&utc(2024, 5, 1, 3, 0), 1, hm(3, 0)),
            Some(utc(2024, 6, 1, 3, 0))
        );
        assert_eq!(
            next_monthly(&utc(2024, 12, 15, 0, 0), 1, hm(3, 0)),
            Some(utc(2025, 1, 1, 3, 0))
        );
    }

    #[test]
    fn monthly_trigger_skips_short_months() {
        assert_eq!(
            next_monthly(&utc(2024, 1, 31, 12, 0), 31, hm(3, 0)),
            Some(utc(2024, 3, 31, 3, 0))
        );
    }
}
