//! Local calendar windows.
//!
//! The dining hall works on local days: "today" is `[local midnight, next
//! local midnight)` at the configured UTC offset. Windows are expressed in
//! UTC so they can be compared against stored timestamps directly.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let shift = TimeDelta::seconds(offset.local_minus_utc().into());
    date.and_time(NaiveTime::MIN)
        .checked_sub_signed(shift)
        .map(|t| t.and_utc())
}

/// Window covering the local calendar day `date`. `None` when either bound
/// falls outside the representable range.
pub fn day_window_of(date: NaiveDate, offset: FixedOffset) -> Option<Window> {
    Some(Window {
        start: local_midnight(date, offset)?,
        end: local_midnight(date.succ_opt()?, offset)?,
    })
}

/// Window covering the local day that contains `now`, clamped to the
/// representable range at the ends of the calendar.
pub fn day_window(now: DateTime<Utc>, offset: FixedOffset) -> Window {
    let date = now.with_timezone(&offset).date_naive();
    Window {
        start: local_midnight(date, offset).unwrap_or(DateTime::<Utc>::MIN_UTC),
        end: date
            .succ_opt()
            .and_then(|next| local_midnight(next, offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}

/// Window covering a local calendar month. `None` for an invalid month.
pub fn month_window(year: i32, month: u32, offset: FixedOffset) -> Option<Window> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(Window {
        start: local_midnight(first, offset)?,
        end: local_midnight(next, offset)?,
    })
}
