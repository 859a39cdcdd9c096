use std::time::Duration;

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::domain::errors::BroadcastError;

/// Format of human-supplied dispatch times, e.g. `01.01.2030 10:00`.
pub const SCHEDULE_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchedule {
    pub run_at: DateTime<Utc>,
    pub delay: Duration,
}

/// Interprets `raw` as a wall-clock time in `source_tz` and returns the delay from `now`.
///
/// The result only depends on absolute instants, so the executor's own timezone
/// never leaks in. Times before `now` are rejected.
pub fn resolve_schedule(
    raw: &str,
    source_tz: Tz,
    now: DateTime<Utc>,
) -> Result<ResolvedSchedule, BroadcastError> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), SCHEDULE_FORMAT).map_err(|err| {
        BroadcastError::InvalidSchedule {
            value: raw.to_string(),
            reason: format!("expected DD.MM.YYYY HH:mm ({err})"),
        }
    })?;

    let local = match source_tz.from_local_datetime(&naive) {
        LocalResult::Single(local) => local,
        // Ambiguous wall time during a fall-back transition: take the earlier instant.
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            return Err(BroadcastError::InvalidSchedule {
                value: raw.to_string(),
                reason: format!("time does not exist in {}", source_tz.name()),
            });
        }
    };

    let run_at = local.with_timezone(&Utc);
    if run_at < now {
        return Err(BroadcastError::ScheduledInPast(raw.to_string()));
    }

    let delay = (run_at - now).to_std().unwrap_or_default();
    Ok(ResolvedSchedule { run_at, delay })
}
