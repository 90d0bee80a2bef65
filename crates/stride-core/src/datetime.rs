use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use regex::Regex;

/// Day-granularity "now": the wall clock is read once per command invocation
/// and truncated in the configured timezone before any goal logic runs.
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Parses the date expressions accepted on the command line. Everything is
/// day-granular; relative offsets move whole days from `today`.
#[tracing::instrument(fields(input = input))]
pub fn parse_date_arg(input: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return Ok(today + Duration::days(1)),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)d$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    if let Some(caps) = rel_re.captures(token) {
        let num: i64 = caps["num"].parse().context("invalid relative day count")?;
        let delta = Duration::days(num);
        return Ok(if &caps["sign"] == "-" {
            today - delta
        } else {
            today + delta
        });
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Ok(date);
    }

    Err(anyhow!("unrecognized date expression: {input}")).with_context(|| {
        "supported formats: today/tomorrow/yesterday, +Nd/-Nd, YYYY-MM-DD"
    })
}

/// Parses a `YYYY-MM` month argument for the calendar view.
pub fn parse_month_arg(input: &str) -> anyhow::Result<(i32, u32)> {
    let re = Regex::new(r"^(?P<year>\d{4})-(?P<month>\d{1,2})$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    let caps = re
        .captures(input.trim())
        .ok_or_else(|| anyhow!("expected YYYY-MM, got: {input}"))?;

    let year: i32 = caps["year"].parse().context("invalid year")?;
    let month: u32 = caps["month"].parse().context("invalid month")?;
    if !(1..=12).contains(&month) {
        return Err(anyhow!("month out of range: {input}"));
    }

    Ok((year, month))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::{parse_date_arg, parse_month_arg, today_in};
    use crate::model::test_support::date;

    #[test]
    fn today_truncates_in_timezone() {
        // 03:00 UTC on the 18th is still the 17th in Mexico City.
        let now = Utc
            .with_ymd_and_hms(2026, 2, 18, 3, 0, 0)
            .single()
            .expect("valid now");
        assert_eq!(
            today_in(chrono_tz::America::Mexico_City, now),
            date(2026, 2, 17)
        );
        assert_eq!(today_in(chrono_tz::UTC, now), date(2026, 2, 18));
    }

    #[test]
    fn parses_named_days() {
        let today = date(2024, 6, 15);
        assert_eq!(parse_date_arg("today", today).expect("today"), today);
        assert_eq!(
            parse_date_arg("tomorrow", today).expect("tomorrow"),
            date(2024, 6, 16)
        );
        assert_eq!(
            parse_date_arg("yesterday", today).expect("yesterday"),
            date(2024, 6, 14)
        );
    }

    #[test]
    fn parses_relative_days() {
        let today = date(2024, 6, 15);
        assert_eq!(
            parse_date_arg("+30d", today).expect("+30d"),
            date(2024, 7, 15)
        );
        assert_eq!(
            parse_date_arg("-15d", today).expect("-15d"),
            date(2024, 5, 31)
        );
    }

    #[test]
    fn parses_plain_iso_dates() {
        let today = date(2024, 6, 15);
        assert_eq!(
            parse_date_arg("2024-01-15", today).expect("iso"),
            date(2024, 1, 15)
        );
        assert!(parse_date_arg("01/15/2024", today).is_err());
        assert!(parse_date_arg("2024-02-30", today).is_err());
    }

    #[test]
    fn parses_month_argument() {
        assert_eq!(parse_month_arg("2024-06").expect("month"), (2024, 6));
        assert_eq!(parse_month_arg("2025-1").expect("month"), (2025, 1));
        assert!(parse_month_arg("2024-13").is_err());
        assert!(parse_month_arg("june").is_err());
    }
}
