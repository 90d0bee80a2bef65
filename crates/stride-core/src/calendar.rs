use chrono::{Datelike, Months, NaiveDate};
use tracing::debug;

use crate::model::Goal;

/// How a calendar day relates to one goal, at day granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayRelation {
    Start,
    Due,
    Both,
    None,
}

pub fn relation_for_date(goal: &Goal, date: NaiveDate) -> DayRelation {
    let starts = goal.start_date == date;
    let dues = goal.due_date == date;
    match (starts, dues) {
        (true, true) => DayRelation::Both,
        (true, false) => DayRelation::Start,
        (false, true) => DayRelation::Due,
        (false, false) => DayRelation::None,
    }
}

/// Goals whose start or due date falls on this day, boundaries inclusive.
pub fn goals_for_date(date: NaiveDate, goals: &[Goal]) -> Vec<&Goal> {
    goals
        .iter()
        .filter(|g| relation_for_date(g, date) != DayRelation::None)
        .collect()
}

/// Goals spanning this day, boundaries exclusive: the start and due days
/// themselves are reported by [`goals_for_date`] instead.
pub fn in_progress_goals_for_date(date: NaiveDate, goals: &[Goal]) -> Vec<&Goal> {
    goals
        .iter()
        .filter(|g| g.start_date < date && date < g.due_date)
        .collect()
}

/// A past day is not selectable.
pub fn is_past_date(date: NaiveDate, today: NaiveDate) -> bool {
    date < today
}

/// One month of calendar days plus the number of blank leading cells needed
/// to align day 1 under its weekday column (Sunday-first grid).
#[derive(Debug, Clone)]
pub struct MonthGrid {
    pub leading_blanks: usize,
    pub days: Vec<NaiveDate>,
}

/// Which month the calendar view is showing. Always holds the first day of
/// a valid month; navigation moves whole months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    first: NaiveDate,
}

impl MonthCursor {
    pub fn at(today: NaiveDate) -> Self {
        Self {
            first: today.with_day(1).unwrap_or(today),
        }
    }

    pub fn from_ym(year: i32, month: u32) -> anyhow::Result<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| anyhow::anyhow!("invalid month: {year}-{month:02}"))?;
        Ok(Self { first })
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn label(&self) -> String {
        self.first.format("%B %Y").to_string()
    }

    /// Forward navigation is unbounded.
    pub fn next_month(&self) -> Self {
        Self {
            first: self
                .first
                .checked_add_months(Months::new(1))
                .unwrap_or(self.first),
        }
    }

    /// Backward navigation is clamped: the view never goes earlier than the
    /// month containing today.
    pub fn prev_month(&self, today: NaiveDate) -> Self {
        let floor = MonthCursor::at(today);
        let candidate = Self {
            first: self
                .first
                .checked_sub_months(Months::new(1))
                .unwrap_or(self.first),
        };

        if candidate.first < floor.first {
            debug!(month = %self.label(), "backward navigation clamped at current month");
            return *self;
        }
        candidate
    }

    pub fn grid(&self) -> MonthGrid {
        let days: Vec<NaiveDate> = self
            .first
            .iter_days()
            .take_while(|d| d.month() == self.first.month())
            .collect();

        MonthGrid {
            leading_blanks: self.first.weekday().num_days_from_sunday() as usize,
            days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DayRelation, MonthCursor, goals_for_date, in_progress_goals_for_date, is_past_date,
        relation_for_date,
    };
    use crate::model::GoalStatus;
    use crate::model::test_support::{date, goal};

    #[test]
    fn relation_matches_boundaries_only() {
        let g = goal(
            "marathon",
            date(2024, 1, 15),
            date(2024, 3, 20),
            GoalStatus::Active,
        );
        assert_eq!(relation_for_date(&g, date(2024, 1, 15)), DayRelation::Start);
        assert_eq!(relation_for_date(&g, date(2024, 3, 20)), DayRelation::Due);
        assert_eq!(relation_for_date(&g, date(2024, 2, 10)), DayRelation::None);

        let same_day = goal(
            "sprint",
            date(2024, 1, 15),
            date(2024, 1, 15),
            GoalStatus::Active,
        );
        assert_eq!(
            relation_for_date(&same_day, date(2024, 1, 15)),
            DayRelation::Both
        );
    }

    #[test]
    fn day_lookup_includes_both_boundaries() {
        let goals = vec![
            goal("a", date(2024, 1, 15), date(2024, 3, 20), GoalStatus::Active),
            goal("b", date(2024, 3, 20), date(2024, 5, 1), GoalStatus::Active),
            goal("c", date(2024, 6, 1), date(2024, 7, 1), GoalStatus::Active),
        ];

        let hits = goals_for_date(date(2024, 3, 20), &goals);
        let titles: Vec<&str> = hits.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[test]
    fn in_progress_excludes_boundary_days() {
        let goals = vec![goal(
            "span",
            date(2024, 1, 15),
            date(2024, 3, 20),
            GoalStatus::Active,
        )];

        assert_eq!(in_progress_goals_for_date(date(2024, 2, 10), &goals).len(), 1);
        assert!(in_progress_goals_for_date(date(2024, 1, 15), &goals).is_empty());
        assert!(in_progress_goals_for_date(date(2024, 3, 20), &goals).is_empty());
        assert!(in_progress_goals_for_date(date(2024, 1, 14), &goals).is_empty());
    }

    #[test]
    fn past_date_is_strictly_before_today() {
        let today = date(2024, 6, 15);
        assert!(!is_past_date(today, today));
        assert!(is_past_date(date(2024, 6, 14), today));
        assert!(!is_past_date(date(2024, 6, 16), today));
    }

    #[test]
    fn grid_pads_to_the_first_weekday() {
        // 2024-01-01 was a Monday: one blank cell under Sunday.
        let cursor = MonthCursor::from_ym(2024, 1).expect("valid month");
        let grid = cursor.grid();
        assert_eq!(grid.leading_blanks, 1);
        assert_eq!(grid.days.len(), 31);
        assert_eq!(grid.days[0], date(2024, 1, 1));
        assert_eq!(grid.days[30], date(2024, 1, 31));
    }

    #[test]
    fn grid_handles_leap_february() {
        let grid = MonthCursor::from_ym(2024, 2).expect("valid month").grid();
        assert_eq!(grid.days.len(), 29);
    }

    #[test]
    fn backward_navigation_clamps_at_current_month() {
        let today = date(2024, 6, 15);
        let cursor = MonthCursor::at(today);
        assert_eq!(cursor.prev_month(today), cursor);

        let ahead = cursor.next_month().next_month();
        let back = ahead.prev_month(today).prev_month(today);
        assert_eq!(back, cursor);
        assert_eq!(back.prev_month(today), cursor);
    }

    #[test]
    fn forward_navigation_crosses_year_boundary() {
        let cursor = MonthCursor::from_ym(2024, 12).expect("valid month");
        let next = cursor.next_month();
        assert_eq!(next.first_day(), date(2025, 1, 1));
        assert_eq!(next.label(), "January 2025");
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert!(MonthCursor::from_ym(2024, 13).is_err());
        assert!(MonthCursor::from_ym(2024, 0).is_err());
    }
}
