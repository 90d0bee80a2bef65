use anyhow::anyhow;
use tracing::instrument;

use crate::calendar::MonthCursor;
use crate::commands::{Ctx, resolve_goal};
use crate::datetime::{parse_date_arg, parse_month_arg};
use crate::model::{Goal, GoalCounts, GoalStatus};

#[instrument(skip(ctx))]
pub fn list(ctx: &mut Ctx, all: bool, status: Option<&str>) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let session = ctx.require_session(&backend)?;
    let goals = backend.list_goals(&session)?;

    let filtered: Vec<Goal> = match (all, status) {
        (true, _) => goals,
        (false, None) => goals
            .into_iter()
            .filter(|g| g.status == GoalStatus::Active)
            .collect(),
        (false, Some(raw)) => {
            let wanted = parse_status(raw)?;
            goals.into_iter().filter(|g| g.status == wanted).collect()
        }
    };

    ctx.renderer.print_goal_table(&filtered, ctx.today)?;
    Ok(())
}

#[instrument(skip(ctx))]
pub fn info(ctx: &mut Ctx, id: &str) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let session = ctx.require_session(&backend)?;

    let goals = backend.list_goals(&session)?;
    let goal = resolve_goal(&goals, id)?;
    let full = backend.fetch_goal(&session, goal.id)?;

    ctx.renderer.print_goal_info(&full, ctx.today)?;
    Ok(())
}

#[instrument(skip(ctx))]
pub fn quarters(ctx: &mut Ctx) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let session = ctx.require_session(&backend)?;
    let goals = backend.list_goals(&session)?;

    ctx.renderer.print_quarters(&goals, ctx.today)?;
    Ok(())
}

#[instrument(skip(ctx))]
pub fn calendar(
    ctx: &mut Ctx,
    month: Option<&str>,
    next: u32,
    prev: u32,
) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let session = ctx.require_session(&backend)?;
    let goals = backend.list_goals(&session)?;

    let mut cursor = match month {
        Some(raw) => {
            let (year, month) = parse_month_arg(raw)?;
            MonthCursor::from_ym(year, month)?
        }
        None => MonthCursor::at(ctx.today),
    };

    for _ in 0..next {
        cursor = cursor.next_month();
    }
    for _ in 0..prev {
        cursor = cursor.prev_month(ctx.today);
    }

    ctx.renderer.print_calendar(&cursor, &goals, ctx.today)?;
    Ok(())
}

#[instrument(skip(ctx))]
pub fn day(ctx: &mut Ctx, date: &str) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let session = ctx.require_session(&backend)?;
    let goals = backend.list_goals(&session)?;

    let date = parse_date_arg(date, ctx.today)?;
    ctx.renderer.print_day(date, &goals, ctx.today)?;
    Ok(())
}

#[instrument(skip(ctx))]
pub fn stats(ctx: &mut Ctx) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let session = ctx.require_session(&backend)?;
    let goals = backend.list_goals(&session)?;

    ctx.renderer.print_stats(GoalCounts::tally(&goals))?;
    Ok(())
}

fn parse_status(raw: &str) -> anyhow::Result<GoalStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "active" => Ok(GoalStatus::Active),
        "completed" => Ok(GoalStatus::Completed),
        "done" => Ok(GoalStatus::Done),
        other => Err(anyhow!(
            "unknown status: {other} (expected active, completed, or done)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_status;
    use crate::model::GoalStatus;

    #[test]
    fn status_names_parse_case_insensitively() {
        assert_eq!(parse_status("Active").expect("active"), GoalStatus::Active);
        assert_eq!(parse_status("done").expect("done"), GoalStatus::Done);
        assert_eq!(
            parse_status(" completed ").expect("completed"),
            GoalStatus::Completed
        );
        assert!(parse_status("finished").is_err());
    }
}
