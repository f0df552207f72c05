use crate::models::UsageLog;
use crate::stats::{
    UsageSummary, calendar_days, date_key, leading_blanks, month_key, parse_log_date,
    recent_usage, shift_month, usage_for_date,
};
use chrono::{Datelike, NaiveDate};

const RECENT_LIMIT: usize = 5;

/// Everything the overview page shows.
pub struct IndexPage<'a> {
    pub today: NaiveDate,
    pub month: NaiveDate,
    pub usage_count: i64,
    pub last_used: Option<&'a str>,
    pub summary: UsageSummary,
    pub logs: &'a [UsageLog],
}

pub fn render_index(page: &IndexPage<'_>) -> String {
    let last_used = page
        .last_used
        .map(|date| escape_html(&day_label(date, page.today)))
        .unwrap_or_else(|| "Never".to_string());

    INDEX_HTML
        .replace("{{USAGE_COUNT}}", &page.usage_count.to_string())
        .replace("{{LAST_USED}}", &last_used)
        .replace("{{TODAY}}", &page.summary.today.to_string())
        .replace("{{WEEK}}", &page.summary.this_week.to_string())
        .replace("{{TOTAL}}", &page.summary.total.to_string())
        .replace("{{RECENT}}", &render_recent(page.logs, page.today))
        .replace("{{MONTH_LABEL}}", &page.month.format("%B %Y").to_string())
        .replace("{{PREV_MONTH}}", &month_key(shift_month(page.month, -1)))
        .replace("{{NEXT_MONTH}}", &month_key(shift_month(page.month, 1)))
        .replace("{{CALENDAR}}", &render_calendar(page.month, page.today, page.logs))
}

fn render_recent(logs: &[UsageLog], today: NaiveDate) -> String {
    let recent = recent_usage(logs, RECENT_LIMIT);
    if recent.is_empty() {
        return r#"<p class="empty">No usage logged yet.</p>"#.to_string();
    }

    let mut html = String::from(r#"<ul class="recent">"#);
    for log in recent {
        html.push_str(&format!(
            r#"<li><span>{}</span><strong>{} uses</strong></li>"#,
            escape_html(&day_label(&log.date, today)),
            log.count
        ));
    }
    html.push_str("</ul>");
    html
}

fn render_calendar(month: NaiveDate, today: NaiveDate, logs: &[UsageLog]) -> String {
    let mut html = String::new();
    for _ in 0..leading_blanks(month) {
        html.push_str(r#"<div class="day blank"></div>"#);
    }

    for day in calendar_days(month) {
        let usage = usage_for_date(logs, day);
        let mut classes = String::from("day");
        if day == today {
            classes.push_str(" today");
        }
        if usage > 0 {
            classes.push_str(" used");
        }
        let badge = if usage > 0 {
            format!(r#"<span class="badge">{usage}</span>"#)
        } else {
            String::new()
        };
        html.push_str(&format!(
            r#"<div class="{classes}" title="{}"><span class="num">{}</span>{badge}</div>"#,
            date_key(day),
            day.day()
        ));
    }
    html
}

/// "Today" for the current date, "Mar 02" style otherwise, raw text when the
/// date does not parse.
fn day_label(value: &str, today: NaiveDate) -> String {
    match parse_log_date(value) {
        Some(date) if date == today => "Today".to_string(),
        Some(date) => date.format("%b %d").to_string(),
        None => value.to_string(),
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Contact Lens Tracker</title>
  <style>
    :root {
      --bg-1: #eef4ff;
      --bg-2: #dfe6fb;
      --ink: #1f2937;
      --muted: #6b7280;
      --accent: #3b82f6;
      --danger: #ef4444;
      --card: rgba(255, 255, 255, 0.92);
      --shadow: 0 18px 48px rgba(59, 130, 246, 0.16);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: linear-gradient(135deg, var(--bg-1), var(--bg-2));
      color: var(--ink);
      font-family: "Segoe UI", "Helvetica Neue", sans-serif;
      display: grid;
      place-items: start center;
      padding: 32px 16px 48px;
    }

    .app {
      width: min(460px, 100%);
      display: grid;
      gap: 20px;
    }

    header {
      text-align: center;
    }

    h1 {
      margin: 0 0 6px;
      font-size: 1.9rem;
    }

    .subtitle {
      margin: 0;
      color: var(--muted);
    }

    .card {
      background: var(--card);
      border-radius: 18px;
      box-shadow: var(--shadow);
      padding: 20px;
    }

    .counter {
      text-align: center;
      display: grid;
      gap: 10px;
    }

    .counter .value {
      font-size: 3.2rem;
      font-weight: 700;
      color: var(--accent);
    }

    .label {
      font-size: 0.8rem;
      text-transform: uppercase;
      letter-spacing: 0.1em;
      color: var(--muted);
    }

    .actions {
      display: grid;
      grid-template-columns: 2fr 1fr 1fr;
      gap: 10px;
    }

    button {
      width: 100%;
      border: none;
      border-radius: 12px;
      padding: 12px;
      font-size: 0.95rem;
      font-weight: 600;
      cursor: pointer;
      background: #e5e7eb;
      color: var(--ink);
    }

    .btn-log {
      background: var(--accent);
      color: white;
    }

    .btn-clear {
      background: #fee2e2;
      color: var(--danger);
    }

    .stats {
      display: grid;
      grid-template-columns: repeat(3, 1fr);
      gap: 12px;
      text-align: center;
    }

    .stats .value {
      display: block;
      font-size: 1.6rem;
      font-weight: 600;
    }

    .recent {
      list-style: none;
      margin: 0;
      padding: 0;
    }

    .recent li {
      display: flex;
      justify-content: space-between;
      padding: 8px 0;
      border-bottom: 1px solid #f3f4f6;
    }

    .empty {
      color: var(--muted);
      margin: 0;
    }

    .calendar-head {
      display: flex;
      align-items: center;
      justify-content: space-between;
      margin-bottom: 12px;
    }

    .calendar-head a {
      text-decoration: none;
      color: var(--accent);
      font-size: 1.3rem;
      padding: 0 8px;
    }

    .grid {
      display: grid;
      grid-template-columns: repeat(7, 1fr);
      gap: 4px;
      text-align: center;
    }

    .weekday {
      font-size: 0.75rem;
      color: var(--muted);
      padding-bottom: 4px;
    }

    .day {
      min-height: 44px;
      border-radius: 10px;
      padding: 4px;
      display: flex;
      flex-direction: column;
      align-items: center;
      gap: 2px;
    }

    .day.today {
      background: #dbeafe;
    }

    .day.used .num {
      font-weight: 700;
    }

    .badge {
      background: var(--accent);
      color: white;
      border-radius: 999px;
      font-size: 0.7rem;
      min-width: 18px;
      padding: 0 5px;
    }
  </style>
</head>
<body>
  <main class="app">
    <header>
      <h1>Contact Lens Tracker</h1>
      <p class="subtitle">Track your daily lens usage</p>
    </header>

    <section class="card counter">
      <span class="label">Usage count</span>
      <span id="usage-count" class="value">{{USAGE_COUNT}}</span>
      <span class="subtitle">Last used: <span id="last-used">{{LAST_USED}}</span></span>
      <div class="actions">
        <form method="post" action="/actions/log"><button class="btn-log" type="submit">Log use</button></form>
        <form method="post" action="/actions/reset"><button type="submit">Reset</button></form>
        <form method="post" action="/actions/clear"><button class="btn-clear" type="submit">Clear</button></form>
      </div>
    </section>

    <section class="card stats">
      <div><span class="label">Today</span><span id="today" class="value">{{TODAY}}</span></div>
      <div><span class="label">This week</span><span id="week" class="value">{{WEEK}}</span></div>
      <div><span class="label">All time</span><span id="total" class="value">{{TOTAL}}</span></div>
    </section>

    <section class="card">
      <div class="calendar-head">
        <a href="/?month={{PREV_MONTH}}" aria-label="Previous month">&lsaquo;</a>
        <strong id="month">{{MONTH_LABEL}}</strong>
        <a href="/?month={{NEXT_MONTH}}" aria-label="Next month">&rsaquo;</a>
      </div>
      <div class="grid">
        <div class="weekday">Sun</div>
        <div class="weekday">Mon</div>
        <div class="weekday">Tue</div>
        <div class="weekday">Wed</div>
        <div class="weekday">Thu</div>
        <div class="weekday">Fri</div>
        <div class="weekday">Sat</div>
        {{CALENDAR}}
      </div>
    </section>

    <section class="card">
      <h3>Recent usage</h3>
      {{RECENT}}
    </section>
  </main>
</body>
</html>
"#;
