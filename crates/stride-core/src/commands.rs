use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, instrument, warn};

use crate::cli::Command;
use crate::config::Config;
use crate::datetime;
use crate::model::{Goal, Milestone};
use crate::remote::Backend;
use crate::render::Renderer;
use crate::session::{Session, SessionStore};

pub mod account;
pub mod goal_ops;
pub mod views;
pub mod vision;

/// Everything a command needs: config, the cached session, a renderer, and a
/// single day-granular "now" read once per invocation so every date decision
/// in the run agrees on what today is.
pub struct Ctx {
    pub cfg: Config,
    pub sessions: SessionStore,
    pub renderer: Renderer,
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
}

impl Ctx {
    pub fn new(cfg: Config, data_dir: &Path) -> Self {
        let now = Utc::now();
        let today = datetime::today_in(cfg.timezone(), now);
        let renderer = Renderer::new(&cfg);
        let sessions = SessionStore::open(data_dir);

        Self {
            cfg,
            sessions,
            renderer,
            now,
            today,
        }
    }

    pub fn backend(&self) -> anyhow::Result<Backend> {
        Backend::new(&self.cfg)
    }

    /// The cached session, refreshed when it is close to expiring. An
    /// expired session that cannot be refreshed means signing in again.
    #[instrument(skip(self, backend))]
    pub fn require_session(&self, backend: &Backend) -> anyhow::Result<Session> {
        let session = self
            .sessions
            .load()?
            .ok_or_else(|| anyhow!("not signed in; run `stride login <email>`"))?;

        if !session.needs_refresh(self.now) {
            return Ok(session);
        }

        debug!("session close to expiry; refreshing");
        match backend.refresh(&session.refresh_token) {
            Ok(refreshed) => {
                self.sessions.save(&refreshed)?;
                Ok(refreshed)
            }
            Err(err) if session.is_expired(self.now) => Err(err)
                .context("session expired and refresh failed; run `stride login <email>`"),
            Err(err) => {
                warn!(error = %err, "session refresh failed; continuing with current token");
                Ok(session)
            }
        }
    }
}

#[instrument(skip(ctx, command))]
pub fn dispatch(ctx: &mut Ctx, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Signup { email, password } => account::signup(ctx, &email, password),
        Command::Login { email, password } => account::login(ctx, &email, password),
        Command::Logout => account::logout(ctx),
        Command::Whoami => account::whoami(ctx),

        Command::Add {
            title,
            start,
            due,
            description,
            partner,
        } => goal_ops::add(ctx, &title, start.as_deref(), &due, description, partner),
        Command::List { all, status } => views::list(ctx, all, status.as_deref()),
        Command::Info { id } => views::info(ctx, &id),
        Command::Done { id } => goal_ops::done(ctx, &id),
        Command::Delete { id } => goal_ops::delete(ctx, &id),

        Command::Milestone(action) => goal_ops::milestone(ctx, action),

        Command::Quarters => views::quarters(ctx),
        Command::Calendar { month, next, prev } => {
            views::calendar(ctx, month.as_deref(), next, prev)
        }
        Command::Day { date } => views::day(ctx, &date),
        Command::Stats => views::stats(ctx),

        Command::Vision(action) => vision::dispatch(ctx, action),
    }
}

/// Resolves a goal from a full id or an unambiguous id prefix.
pub(crate) fn resolve_goal<'a>(goals: &'a [Goal], token: &str) -> anyhow::Result<&'a Goal> {
    resolve_by_id(goals, token, |g| g.id, "goal")
}

pub(crate) fn resolve_milestone<'a>(
    milestones: &'a [Milestone],
    token: &str,
) -> anyhow::Result<&'a Milestone> {
    resolve_by_id(milestones, token, |m| m.id, "milestone")
}

pub(crate) fn resolve_by_id<'a, T, F>(
    items: &'a [T],
    token: &str,
    id_of: F,
    kind: &str,
) -> anyhow::Result<&'a T>
where
    F: Fn(&T) -> uuid::Uuid,
{
    let needle = token.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(anyhow!("empty {kind} id"));
    }

    let mut matches = items
        .iter()
        .filter(|item| id_of(item).to_string().starts_with(&needle));

    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no {kind} matching id: {token}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("ambiguous {kind} id: {token}"));
    }

    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::resolve_goal;
    use crate::model::GoalStatus;
    use crate::model::test_support::{date, goal};

    #[test]
    fn goal_ids_resolve_by_unique_prefix() {
        let goals = vec![
            goal("a", date(2024, 1, 1), date(2024, 2, 1), GoalStatus::Active),
            goal("b", date(2024, 1, 1), date(2024, 2, 1), GoalStatus::Active),
        ];

        let full = goals[0].id.to_string();
        assert_eq!(
            resolve_goal(&goals, &full).expect("full id resolves").id,
            goals[0].id
        );
        assert_eq!(
            resolve_goal(&goals, &full[..8]).expect("prefix resolves").id,
            goals[0].id
        );

        assert!(resolve_goal(&goals, "").is_err());
        assert!(resolve_goal(&goals, "zzzz").is_err());
    }
}
