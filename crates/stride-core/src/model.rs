use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Completed,
    Done,
}

impl GoalStatus {
    /// `completed` and `done` both exist on the wire and mean the same
    /// terminal state; external rows may carry either.
    pub fn is_finished(self) -> bool {
        matches!(self, GoalStatus::Completed | GoalStatus::Done)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,

    pub user_id: Uuid,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    pub status: GoalStatus,

    pub start_date: NaiveDate,

    pub due_date: NaiveDate,

    #[serde(default)]
    pub accountability_partner: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<Milestone>,
}

impl Goal {
    pub fn days_until_due(&self, today: NaiveDate) -> i64 {
        (self.due_date - today).num_days()
    }

    /// Share of completed milestones, 0..=100. A goal without milestones
    /// reports zero rather than dividing by zero.
    pub fn progress_percent(&self) -> f64 {
        if self.milestones.is_empty() {
            return 0.0;
        }
        let completed = self.milestones.iter().filter(|m| m.completed).count();
        completed as f64 / self.milestones.len() as f64 * 100.0
    }

    /// Milestones in display order. `order_index` defines the order but is
    /// not guaranteed contiguous.
    pub fn ordered_milestones(&self) -> Vec<&Milestone> {
        let mut out: Vec<&Milestone> = self.milestones.iter().collect();
        out.sort_by_key(|m| m.order_index);
        out
    }
}

/// Insert payload for a goal row. The server assigns id and timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct NewGoal {
    pub user_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: GoalStatus,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accountability_partner: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMilestone {
    pub goal_id: Uuid,
    pub title: String,
    pub completed: bool,
    pub order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub title: String,
    pub completed: bool,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionBoardImage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub initials: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalCounts {
    pub total: usize,
    pub active: usize,
    pub finished: usize,
}

impl GoalCounts {
    pub fn tally(goals: &[Goal]) -> Self {
        let total = goals.len();
        let active = goals
            .iter()
            .filter(|g| g.status == GoalStatus::Active)
            .count();
        let finished = goals.iter().filter(|g| g.status.is_finished()).count();
        Self {
            total,
            active,
            finished,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{date, goal, milestone};
    use super::{GoalCounts, GoalStatus};

    #[test]
    fn completed_and_done_are_both_finished() {
        assert!(GoalStatus::Completed.is_finished());
        assert!(GoalStatus::Done.is_finished());
        assert!(!GoalStatus::Active.is_finished());
    }

    #[test]
    fn status_round_trips_lowercase() {
        let parsed: GoalStatus = serde_json::from_str("\"done\"").expect("parse status");
        assert_eq!(parsed, GoalStatus::Done);
        assert_eq!(
            serde_json::to_string(&GoalStatus::Active).expect("serialize status"),
            "\"active\""
        );
    }

    #[test]
    fn goal_dates_parse_as_plain_iso_days() {
        let raw = r#"{
            "id": "5f0e87a4-9f4e-4a44-93d5-4f0a4f9b61f0",
            "user_id": "f0b9e2ee-07cf-4f0e-9a3f-b2a5e8f21d11",
            "title": "Run a marathon",
            "description": null,
            "status": "active",
            "start_date": "2024-01-15",
            "due_date": "2024-03-20",
            "accountability_partner": "Sam",
            "created_at": "2024-01-10T08:30:00Z",
            "updated_at": "2024-01-10T08:30:00Z"
        }"#;
        let parsed: super::Goal = serde_json::from_str(raw).expect("parse goal row");
        assert_eq!(parsed.start_date, date(2024, 1, 15));
        assert_eq!(parsed.due_date, date(2024, 3, 20));
        assert!(parsed.milestones.is_empty());
    }

    #[test]
    fn progress_is_zero_without_milestones() {
        let g = goal(
            "empty",
            date(2024, 1, 1),
            date(2024, 2, 1),
            GoalStatus::Active,
        );
        assert_eq!(g.progress_percent(), 0.0);
    }

    #[test]
    fn progress_counts_completed_share() {
        let mut g = goal(
            "steps",
            date(2024, 1, 1),
            date(2024, 2, 1),
            GoalStatus::Active,
        );
        g.milestones = vec![
            milestone(&g, "one", true, 0),
            milestone(&g, "two", false, 1),
            milestone(&g, "three", true, 2),
            milestone(&g, "four", false, 3),
        ];
        assert_eq!(g.progress_percent(), 50.0);
    }

    #[test]
    fn milestones_order_by_index_even_when_sparse() {
        let mut g = goal(
            "sparse",
            date(2024, 1, 1),
            date(2024, 2, 1),
            GoalStatus::Active,
        );
        g.milestones = vec![
            milestone(&g, "last", false, 10),
            milestone(&g, "first", false, 0),
            milestone(&g, "middle", false, 3),
        ];
        let titles: Vec<&str> = g
            .ordered_milestones()
            .into_iter()
            .map(|m| m.title.as_str())
            .collect();
        assert_eq!(titles, vec!["first", "middle", "last"]);
    }

    #[test]
    fn counts_tally_active_and_finished() {
        let goals = vec![
            goal("a", date(2024, 1, 1), date(2024, 2, 1), GoalStatus::Active),
            goal(
                "b",
                date(2024, 1, 1),
                date(2024, 2, 1),
                GoalStatus::Completed,
            ),
            goal("c", date(2024, 1, 1), date(2024, 2, 1), GoalStatus::Done),
        ];
        let counts = GoalCounts::tally(&goals);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.active, 1);
        assert_eq!(counts.finished, 2);
    }
}
