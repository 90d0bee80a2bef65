use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::commands::Ctx;

#[instrument(skip(ctx, password))]
pub fn signup(ctx: &mut Ctx, email: &str, password: Option<String>) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let password = password_or_prompt(password)?;

    let session = backend.sign_up(email, &password)?;
    ctx.sessions.save(&session)?;

    println!("signed up as {email}");
    Ok(())
}

#[instrument(skip(ctx, password))]
pub fn login(ctx: &mut Ctx, email: &str, password: Option<String>) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let password = password_or_prompt(password)?;

    let session = backend.sign_in(email, &password)?;
    ctx.sessions.save(&session)?;

    println!("signed in as {email}");
    Ok(())
}

/// Sign-out is local: the backend session simply stops being used.
#[instrument(skip(ctx))]
pub fn logout(ctx: &mut Ctx) -> anyhow::Result<()> {
    ctx.sessions.clear()?;
    info!("signed out");
    println!("signed out");
    Ok(())
}

#[instrument(skip(ctx))]
pub fn whoami(ctx: &mut Ctx) -> anyhow::Result<()> {
    let Some(session) = ctx.sessions.load()? else {
        println!("not signed in");
        return Ok(());
    };

    println!(
        "{} ({})",
        session.email.as_deref().unwrap_or("<no email>"),
        session.user_id
    );

    match ctx.backend()?.fetch_profile(&session) {
        Ok(Some(profile)) => {
            if let Some(name) = profile.full_name {
                println!("name: {name}");
            }
        }
        Ok(None) => {}
        Err(err) => warn!(error = %err, "profile fetch failed"),
    }

    let expires = DateTime::<Utc>::from_timestamp(session.expires_at, 0)
        .ok_or_else(|| anyhow!("invalid session expiry timestamp"))?;
    if session.is_expired(ctx.now) {
        println!("session expired {}", expires.format("%Y-%m-%d %H:%M UTC"));
    } else {
        println!("session valid until {}", expires.format("%Y-%m-%d %H:%M UTC"));
    }

    Ok(())
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(given) = password {
        return Ok(given);
    }

    eprint!("password: ");
    io::stderr().flush().ok();

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;

    let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
    if trimmed.is_empty() {
        return Err(anyhow!("empty password"));
    }
    Ok(trimmed)
}
