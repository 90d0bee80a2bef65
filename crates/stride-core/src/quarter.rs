use std::collections::BTreeMap;

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use tracing::trace;

use crate::model::Goal;

/// A derived 3-month span. Never persisted; always recomputed from a date or
/// a quarter key. Month indices are zero-based (Jan = 0) to match the
/// `month0 / 3` bucketing contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarterInfo {
    pub quarter: u32,
    pub year: i32,
    pub label: String,
    pub months: String,
    pub start_month: u32,
    pub end_month: u32,
}

impl QuarterInfo {
    pub fn key(&self) -> String {
        format!("{}-Q{}", self.year, self.quarter)
    }
}

/// Quarter (1-4) containing the given date.
pub fn quarter_of(date: NaiveDate) -> u32 {
    date.month0() / 3 + 1
}

pub fn quarter_info(date: NaiveDate) -> QuarterInfo {
    quarter_info_for(date.year(), quarter_of(date))
}

fn quarter_info_for(year: i32, quarter: u32) -> QuarterInfo {
    // Callers guarantee 1..=4: quarter_of is total over valid dates and
    // parse_quarter_key range-checks before calling.
    let (months, start_month, end_month) = match quarter {
        1 => ("Jan - Mar", 0, 2),
        2 => ("Apr - Jun", 3, 5),
        3 => ("Jul - Sep", 6, 8),
        _ => ("Oct - Dec", 9, 11),
    };

    QuarterInfo {
        quarter,
        year,
        label: format!("Q{quarter} {year}"),
        months: months.to_string(),
        start_month,
        end_month,
    }
}

/// Buckets goals by the quarter of their start date, keyed `"<year>-Q<n>"`.
/// Every goal lands in exactly one bucket; buckets are sorted ascending by
/// start date.
#[tracing::instrument(skip(goals), fields(count = goals.len()))]
pub fn group_by_quarter(goals: &[Goal]) -> BTreeMap<String, Vec<&Goal>> {
    let mut grouped: BTreeMap<String, Vec<&Goal>> = BTreeMap::new();

    for goal in goals {
        let info = quarter_info(goal.start_date);
        let key = info.key();
        trace!(goal = %goal.id, key = %key, "bucketed goal");
        grouped.entry(key).or_default().push(goal);
    }

    for bucket in grouped.values_mut() {
        bucket.sort_by_key(|g| g.start_date);
    }

    grouped
}

/// The 8 quarters covering today's year and the next, in order. Recomputed
/// fresh on every call; nothing is cached across a year boundary.
pub fn all_quarters(today: NaiveDate) -> Vec<QuarterInfo> {
    let current_year = today.year();
    let mut quarters = Vec::with_capacity(8);

    for year in [current_year, current_year + 1] {
        for q in 1..=4 {
            quarters.push(quarter_info_for(year, q));
        }
    }

    quarters
}

pub fn is_current_quarter(info: &QuarterInfo, today: NaiveDate) -> bool {
    let current = quarter_info(today);
    info.quarter == current.quarter && info.year == current.year
}

pub fn is_past_quarter(info: &QuarterInfo, today: NaiveDate) -> bool {
    let current = quarter_info(today);
    if info.year < current.year {
        return true;
    }
    info.year == current.year && info.quarter < current.quarter
}

/// Inverse of [`QuarterInfo::key`]. Errors on anything that is not
/// `<digits>-Q<digits>` with a quarter in 1-4; the error is surfaced to the
/// caller rather than recovered here.
pub fn parse_quarter_key(key: &str) -> anyhow::Result<QuarterInfo> {
    let re = Regex::new(r"^(\d+)-Q(\d+)$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    let caps = re
        .captures(key)
        .ok_or_else(|| anyhow!("invalid quarter key: {key}"))?;

    let year: i32 = caps[1]
        .parse()
        .with_context(|| format!("invalid year in quarter key: {key}"))?;
    let quarter: u32 = caps[2]
        .parse()
        .with_context(|| format!("invalid quarter in quarter key: {key}"))?;

    if !(1..=4).contains(&quarter) {
        return Err(anyhow!("quarter out of range in key: {key}"));
    }

    Ok(quarter_info_for(year, quarter))
}
