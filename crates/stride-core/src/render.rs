use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::calendar::{self, MonthCursor};
use crate::config::Config;
use crate::model::{Goal, GoalCounts, VisionBoardImage};
use crate::quarter::{self, QuarterInfo};

/// Short display form of a row id; commands accept these as unambiguous
/// prefixes.
pub fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self { color: cfg.color() }
    }

    #[tracing::instrument(skip(self, goals, today))]
    pub fn print_goal_table(&mut self, goals: &[Goal], today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Title".to_string(),
            "Status".to_string(),
            "Start".to_string(),
            "Due".to_string(),
            "Progress".to_string(),
            "Partner".to_string(),
        ];

        let mut rows = Vec::with_capacity(goals.len());
        for goal in goals {
            let id = self.paint(&short_id(goal.id), "33");

            let due = goal.due_date.format("%Y-%m-%d").to_string();
            let due = if goal.due_date < today && !goal.status.is_finished() {
                self.paint(&due, "31")
            } else {
                due
            };

            let status = format!("{:?}", goal.status).to_lowercase();
            let progress = if goal.milestones.is_empty() {
                "-".to_string()
            } else {
                format!("{:.0}%", goal.progress_percent())
            };

            rows.push(vec![
                id,
                goal.title.clone(),
                status,
                goal.start_date.format("%Y-%m-%d").to_string(),
                due,
                progress,
                goal.accountability_partner.clone().unwrap_or_default(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, goal, today))]
    pub fn print_goal_info(&mut self, goal: &Goal, today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", goal.id)?;
        writeln!(out, "title       {}", goal.title)?;
        writeln!(
            out,
            "status      {}",
            format!("{:?}", goal.status).to_lowercase()
        )?;
        if let Some(description) = &goal.description {
            writeln!(out, "description {description}")?;
        }
        writeln!(out, "start       {}", goal.start_date.format("%Y-%m-%d"))?;
        writeln!(out, "due         {}", goal.due_date.format("%Y-%m-%d"))?;
        writeln!(out, "days left   {}", goal.days_until_due(today))?;
        writeln!(
            out,
            "quarter     {}",
            quarter::quarter_info(goal.start_date).label
        )?;
        if let Some(partner) = &goal.accountability_partner {
            writeln!(out, "partner     {partner}")?;
        }
        writeln!(out, "created     {}", goal.created_at.format("%Y-%m-%d"))?;

        if !goal.milestones.is_empty() {
            writeln!(out, "progress    {:.0}%", goal.progress_percent())?;
            writeln!(out)?;
            writeln!(out, "milestones")?;
            for milestone in goal.ordered_milestones() {
                let mark = if milestone.completed { "x" } else { " " };
                writeln!(
                    out,
                    "  [{mark}] {}  {}",
                    self.paint(&short_id(milestone.id), "33"),
                    milestone.title
                )?;
            }
        }

        Ok(())
    }

    /// The quarter view: all eight quarters in order, each with its bucketed
    /// goals, current and past quarters marked.
    #[tracing::instrument(skip(self, goals, today))]
    pub fn print_quarters(&mut self, goals: &[Goal], today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let grouped = quarter::group_by_quarter(goals);

        for info in quarter::all_quarters(today) {
            let header = self.quarter_header(&info, today);
            writeln!(out, "{header}")?;

            match grouped.get(&info.key()) {
                Some(bucket) => {
                    for goal in bucket {
                        writeln!(
                            out,
                            "  {}  {}  ({} -> {})",
                            self.paint(&short_id(goal.id), "33"),
                            goal.title,
                            goal.start_date.format("%b %-d"),
                            goal.due_date.format("%b %-d"),
                        )?;
                    }
                }
                None => writeln!(out, "  (no goals)")?,
            }
            writeln!(out)?;
        }

        Ok(())
    }

    fn quarter_header(&self, info: &QuarterInfo, today: NaiveDate) -> String {
        let header = format!("{}  {}", info.label, info.months);
        if quarter::is_current_quarter(info, today) {
            format!("{} <- current", self.paint(&header, "1;35"))
        } else if quarter::is_past_quarter(info, today) {
            self.paint(&header, "2")
        } else {
            header
        }
    }

    /// Month grid, Sunday-first. Start/due days are marked `*`, in-progress
    /// days `.`, and today is shown in reverse video.
    #[tracing::instrument(skip(self, cursor, goals, today))]
    pub fn print_calendar(
        &mut self,
        cursor: &MonthCursor,
        goals: &[Goal],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let grid = cursor.grid();

        writeln!(out, "{:^28}", cursor.label())?;
        writeln!(out, " Sun Mon Tue Wed Thu Fri Sat")?;

        let mut column = grid.leading_blanks;
        write!(out, "{}", "    ".repeat(grid.leading_blanks))?;

        for day in &grid.days {
            let boundary = !calendar::goals_for_date(*day, goals).is_empty();
            let in_progress = !calendar::in_progress_goals_for_date(*day, goals).is_empty();

            let marker = if boundary {
                "*"
            } else if in_progress {
                "."
            } else {
                " "
            };

            let mut cell = format!("{:>3}", day.format("%-d"));
            if *day == today {
                cell = self.paint(&cell, "7");
            } else if calendar::is_past_date(*day, today) {
                cell = self.paint(&cell, "2");
            }
            write!(out, "{cell}{marker}")?;

            column += 1;
            if column % 7 == 0 {
                writeln!(out)?;
            }
        }
        if column % 7 != 0 {
            writeln!(out)?;
        }

        Ok(())
    }

    /// The selected-day panel: boundary goals with their due countdown, then
    /// goals merely in progress on that day.
    #[tracing::instrument(skip(self, goals, today))]
    pub fn print_day(
        &mut self,
        date: NaiveDate,
        goals: &[Goal],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", date.format("%b %-d, %Y"))?;
        if calendar::is_past_date(date, today) {
            writeln!(out, "{}", self.paint("(past date)", "2"))?;
        }

        let boundary = calendar::goals_for_date(date, goals);
        let in_progress = calendar::in_progress_goals_for_date(date, goals);

        if boundary.is_empty() && in_progress.is_empty() {
            writeln!(out, "No goals scheduled for this date.")?;
            return Ok(());
        }

        for goal in &boundary {
            let relation = match calendar::relation_for_date(goal, date) {
                calendar::DayRelation::Start => "starts",
                calendar::DayRelation::Due => "due",
                calendar::DayRelation::Both => "starts & due",
                calendar::DayRelation::None => continue,
            };
            writeln!(
                out,
                "  {}  {}  [{relation}]",
                self.paint(&short_id(goal.id), "33"),
                goal.title
            )?;
            writeln!(out, "      {} days until due", goal.days_until_due(today))?;
            if let Some(partner) = &goal.accountability_partner {
                writeln!(out, "      accountability partner: {partner}")?;
            }
        }

        for goal in &in_progress {
            writeln!(
                out,
                "  {}  {}  [in progress]",
                self.paint(&short_id(goal.id), "33"),
                goal.title
            )?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, counts))]
    pub fn print_stats(&mut self, counts: GoalCounts) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "total   {}", counts.total)?;
        writeln!(out, "active  {}", counts.active)?;
        writeln!(out, "done    {}", counts.finished)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, images))]
    pub fn print_vision_images(&mut self, images: &[VisionBoardImage]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Added".to_string(),
            "URL".to_string(),
        ];
        let rows = images
            .iter()
            .map(|image| {
                vec![
                    self.paint(&short_id(image.id), "33"),
                    image.created_at.format("%Y-%m-%d").to_string(),
                    image.image_url.clone(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{strip_ansi, write_table};

    #[test]
    fn table_columns_align_past_ansi_codes() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["A".to_string(), "B".to_string()],
            vec![
                vec!["\x1b[33mshort\x1b[0m".to_string(), "x".to_string()],
                vec!["longer-cell".to_string(), "y".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(strip_ansi(lines[2]), "short       x ");
        assert_eq!(lines[3], "longer-cell y ");
    }

    #[test]
    fn ansi_stripping_leaves_plain_text_alone() {
        assert_eq!(strip_ansi("plain"), "plain");
        assert_eq!(strip_ansi("\x1b[1;35mbold\x1b[0m"), "bold");
    }
}
