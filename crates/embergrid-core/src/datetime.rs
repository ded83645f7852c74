use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use regex::Regex;

/// Calendar-date form used in records, config, and on the CLI. All dates are
/// bucketed in UTC; there is no time component anywhere in the data model.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[must_use]
pub fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn parse_date(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .with_context(|| format!("invalid date (expected YYYY-MM-DD): {raw}"))
}

/// Resolves a CLI date expression against an injected reference date.
///
/// Accepts `today`, `yesterday`, a literal `YYYY-MM-DD`, or a backward
/// offset such as `3d`, `2w`, `1m` (days, weeks, 30-day months).
pub fn parse_date_expr(raw: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    let token = raw.trim().to_ascii_lowercase();
    match token.as_str() {
        "today" | "now" => return Ok(today),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    if let Some(caps) = offset_regex().captures(&token) {
        let amount: i64 = caps[1]
            .parse()
            .with_context(|| format!("offset amount out of range: {token}"))?;
        let days = match &caps[2] {
            "d" => amount,
            "w" => amount * 7,
            "m" => amount * 30,
            unit => return Err(anyhow!("unknown offset unit: {unit}")),
        };
        return Ok(today - Duration::days(days));
    }

    parse_date(&token)
}

fn offset_regex() -> &'static Regex {
    static OFFSET: OnceLock<Regex> = OnceLock::new();
    OFFSET.get_or_init(|| Regex::new(r"^(\d{1,4})([dwm])$").expect("valid offset regex"))
}

/// Sunday on or before `date`. Week columns run Sunday through Saturday.
#[must_use]
pub fn sunday_on_or_before(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Slot of `date` within its week column: 0 = Sunday .. 6 = Saturday.
#[must_use]
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

#[must_use]
pub fn short_month_name(month: u32) -> &'static str {
    match month {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        12 => "Dec",
        _ => "",
    }
}
