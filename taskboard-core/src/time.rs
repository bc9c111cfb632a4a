//! Due-date helpers: "today" in the user's timezone and card urgency.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

/// How close a due date is, relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    Overdue,
    DueToday,
    /// Due within the next two days.
    DueSoon,
    Later,
}

pub const SOON_DAYS: i64 = 2;

pub fn urgency(due: NaiveDate, today: NaiveDate) -> Urgency {
    let days = (due - today).num_days();
    match days {
        d if d < 0 => Urgency::Overdue,
        0 => Urgency::DueToday,
        d if d <= SOON_DAYS => Urgency::DueSoon,
        _ => Urgency::Later,
    }
}

/// Current calendar date in an IANA timezone like "America/Chicago".
pub fn today_in(tz: &str) -> Result<NaiveDate> {
    let tz: Tz = tz
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))?;
    Ok(Utc::now().with_timezone(&tz).date_naive())
}
