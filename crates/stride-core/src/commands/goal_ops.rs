use anyhow::anyhow;
use tracing::{info, instrument};

use crate::cli::MilestoneCommand;
use crate::commands::{Ctx, resolve_goal, resolve_milestone};
use crate::datetime::parse_date_arg;
use crate::model::{Goal, GoalStatus, NewGoal, NewMilestone};
use crate::remote::Backend;
use crate::render::short_id;
use crate::session::Session;

#[instrument(skip(ctx, description, partner))]
pub fn add(
    ctx: &mut Ctx,
    title: &str,
    start: Option<&str>,
    due: &str,
    description: Option<String>,
    partner: Option<String>,
) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let session = ctx.require_session(&backend)?;

    let start_date = match start {
        Some(raw) => parse_date_arg(raw, ctx.today)?,
        None => ctx.today,
    };
    let due_date = parse_date_arg(due, ctx.today)?;
    if due_date < start_date {
        return Err(anyhow!(
            "due date {due_date} is before start date {start_date}"
        ));
    }

    let new_goal = NewGoal {
        user_id: session.user_id,
        title: title.to_string(),
        description: description.clone(),
        status: GoalStatus::Active,
        start_date,
        due_date,
        accountability_partner: partner,
    };
    let goal = backend.create_goal(&session, &new_goal)?;

    // Description lines written as `- step` seed the goal's milestones.
    let seeded = seed_milestones(&backend, &session, &goal, description.as_deref())?;

    println!("created goal {} ({})", short_id(goal.id), goal.title);
    if seeded > 0 {
        println!("added {seeded} milestone(s) from description");
    }
    Ok(())
}

fn seed_milestones(
    backend: &Backend,
    session: &Session,
    goal: &Goal,
    description: Option<&str>,
) -> anyhow::Result<usize> {
    let Some(text) = description else {
        return Ok(0);
    };

    let titles: Vec<String> = text
        .lines()
        .filter(|line| line.trim().starts_with('-'))
        .map(|line| line.trim().trim_start_matches('-').trim().to_string())
        .filter(|title| !title.is_empty())
        .collect();

    for (index, title) in titles.iter().enumerate() {
        backend.create_milestone(
            session,
            &NewMilestone {
                goal_id: goal.id,
                title: title.clone(),
                completed: false,
                order_index: index as i32,
            },
        )?;
    }

    Ok(titles.len())
}

#[instrument(skip(ctx))]
pub fn done(ctx: &mut Ctx, id: &str) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let session = ctx.require_session(&backend)?;

    let goals = backend.list_goals(&session)?;
    let goal = resolve_goal(&goals, id)?;

    backend.set_goal_status(&session, goal.id, GoalStatus::Completed)?;
    println!("completed goal {} ({})", short_id(goal.id), goal.title);
    Ok(())
}

#[instrument(skip(ctx))]
pub fn delete(ctx: &mut Ctx, id: &str) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let session = ctx.require_session(&backend)?;

    let goals = backend.list_goals(&session)?;
    let goal = resolve_goal(&goals, id)?;

    backend.delete_goal(&session, goal.id)?;
    println!("deleted goal {} ({})", short_id(goal.id), goal.title);
    Ok(())
}

#[instrument(skip(ctx, action))]
pub fn milestone(ctx: &mut Ctx, action: MilestoneCommand) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let session = ctx.require_session(&backend)?;

    match action {
        MilestoneCommand::Add { goal_id, title } => {
            let goals = backend.list_goals(&session)?;
            let goal = resolve_goal(&goals, &goal_id)?;
            let existing = backend.list_milestones(&session, goal.id)?;

            let milestone = backend.create_milestone(
                &session,
                &NewMilestone {
                    goal_id: goal.id,
                    title,
                    completed: false,
                    order_index: existing.len() as i32,
                },
            )?;
            println!(
                "added milestone {} to {}",
                short_id(milestone.id),
                goal.title
            );
        }
        MilestoneCommand::List { goal_id } => {
            let goals = backend.list_goals(&session)?;
            let goal = resolve_goal(&goals, &goal_id)?;
            let full = backend.fetch_goal(&session, goal.id)?;
            ctx.renderer.print_goal_info(&full, ctx.today)?;
        }
        MilestoneCommand::Done { goal_id, id } => {
            set_completed(&backend, &session, &goal_id, &id, true)?;
        }
        MilestoneCommand::Undo { goal_id, id } => {
            set_completed(&backend, &session, &goal_id, &id, false)?;
        }
        MilestoneCommand::Rm { goal_id, id } => {
            let goals = backend.list_goals(&session)?;
            let goal = resolve_goal(&goals, &goal_id)?;
            let milestones = backend.list_milestones(&session, goal.id)?;
            let milestone = resolve_milestone(&milestones, &id)?;

            backend.delete_milestone(&session, milestone.id)?;
            println!("removed milestone {}", short_id(milestone.id));
        }
    }

    Ok(())
}

fn set_completed(
    backend: &Backend,
    session: &Session,
    goal_id: &str,
    id: &str,
    completed: bool,
) -> anyhow::Result<()> {
    let goals = backend.list_goals(session)?;
    let goal = resolve_goal(&goals, goal_id)?;
    let milestones = backend.list_milestones(session, goal.id)?;
    let milestone = resolve_milestone(&milestones, id)?;

    backend.set_milestone_completed(session, milestone.id, completed)?;
    println!(
        "{} milestone {}",
        if completed { "completed" } else { "reopened" },
        short_id(milestone.id)
    );

    // Finishing the last open milestone finishes the goal.
    if completed {
        let refreshed = backend.list_milestones(session, goal.id)?;
        if !refreshed.is_empty() && refreshed.iter().all(|m| m.completed) {
            backend.set_goal_status(session, goal.id, GoalStatus::Completed)?;
            info!(goal_id = %goal.id, "all milestones complete; goal marked completed");
            println!("all milestones complete; goal {} marked completed", goal.title);
        }
    }

    Ok(())
}
