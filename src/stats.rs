use crate::models::UsageLog;
use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Format of the `date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Derived totals shown on the overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub today: i64,
    pub this_week: i64,
    pub total: i64,
}

pub fn summarize(logs: &[UsageLog]) -> UsageSummary {
    summarize_at(Local::now().naive_local(), logs)
}

pub fn summarize_at(now: NaiveDateTime, logs: &[UsageLog]) -> UsageSummary {
    UsageSummary {
        today: today_usage_at(now.date(), logs),
        this_week: weekly_usage_at(now, logs),
        total: total_usage(logs),
    }
}

pub fn today_usage(logs: &[UsageLog]) -> i64 {
    today_usage_at(Local::now().date_naive(), logs)
}

pub fn today_usage_at(today: NaiveDate, logs: &[UsageLog]) -> i64 {
    usage_for_date(logs, today)
}

pub fn weekly_usage(logs: &[UsageLog]) -> i64 {
    weekly_usage_at(Local::now().naive_local(), logs)
}

/// Sum of counts whose date, read as midnight, is no older than seven days
/// before `now`.
///
/// This compares instants rather than calendar days: with `now` past
/// midnight the eighth day back is excluded, at exactly midnight it is not.
/// Rows whose date does not parse are skipped.
pub fn weekly_usage_at(now: NaiveDateTime, logs: &[UsageLog]) -> i64 {
    let cutoff = now - Duration::days(7);
    logs.iter()
        .filter(|log| {
            parse_log_date(&log.date)
                .map(|date| date.and_time(NaiveTime::MIN) >= cutoff)
                .unwrap_or(false)
        })
        .map(|log| log.count)
        .fold(0, i64::saturating_add)
}

/// Sum of every count. Saturates at the `i64` bounds.
pub fn total_usage(logs: &[UsageLog]) -> i64 {
    logs.iter().map(|log| log.count).fold(0, i64::saturating_add)
}

pub fn usage_for_date(logs: &[UsageLog], date: NaiveDate) -> i64 {
    let key = date_key(date);
    logs.iter()
        .find(|log| log.date == key)
        .map(|log| log.count)
        .unwrap_or(0)
}

/// Up to `limit` rows, newest date first.
pub fn recent_usage(logs: &[UsageLog], limit: usize) -> Vec<&UsageLog> {
    let mut recent: Vec<&UsageLog> = logs.iter().collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    recent.truncate(limit);
    recent
}

/// Every date of the month containing `month`, first to last.
///
/// The iterator is `Clone`, so a grid can walk it more than once.
pub fn calendar_days(month: NaiveDate) -> CalendarDays {
    CalendarDays {
        next: Some(first_of_month(month)),
        last: last_of_month(month),
    }
}

#[derive(Debug, Clone)]
pub struct CalendarDays {
    next: Option<NaiveDate>,
    last: NaiveDate,
}

impl Iterator for CalendarDays {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        if current > self.last {
            self.next = None;
            return None;
        }
        self.next = current.succ_opt();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next {
            Some(next) if next <= self.last => (self.last - next).num_days() as usize + 1,
            _ => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CalendarDays {}

/// Empty cells before the first of the month in a Sunday-first grid.
pub fn leading_blanks(month: NaiveDate) -> u32 {
    first_of_month(month).weekday().num_days_from_sunday()
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// First day of the month `delta` months away from `month`.
pub fn shift_month(month: NaiveDate, delta: i32) -> NaiveDate {
    let first = first_of_month(month);
    let shifted = if delta >= 0 {
        first.checked_add_months(Months::new(delta.unsigned_abs()))
    } else {
        first.checked_sub_months(Months::new(delta.unsigned_abs()))
    };
    shifted.unwrap_or(first)
}

/// Parse a `YYYY-MM` month selector into its first day.
pub fn parse_month(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), DATE_FORMAT).ok()
}

pub fn month_key(month: NaiveDate) -> String {
    month.format("%Y-%m").to_string()
}

pub fn parse_log_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
