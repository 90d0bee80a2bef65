use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "stride",
    version,
    about = "Stride: goal tracking with quarters, calendar, and a vision board",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create an account on the backend and sign in.
    Signup {
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in and cache the session locally.
    Login {
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Drop the cached session.
    Logout,
    /// Show who is signed in.
    Whoami,

    /// Create a goal. Description lines starting with `-` become initial
    /// milestones.
    Add {
        title: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        due: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        partner: Option<String>,
    },
    /// List goals (active by default).
    List {
        #[arg(long)]
        all: bool,
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one goal with its milestones.
    Info { id: String },
    /// Mark a goal done.
    Done { id: String },
    /// Delete a goal.
    Delete { id: String },

    /// Milestone operations on a goal.
    #[command(subcommand)]
    Milestone(MilestoneCommand),

    /// Goals grouped into the eight quarters of this year and next.
    Quarters,
    /// Month calendar with goal markers.
    Calendar {
        /// Month to show, YYYY-MM. Defaults to the current month.
        month: Option<String>,
        /// Months to page forward from the starting month.
        #[arg(long, default_value_t = 0)]
        next: u32,
        /// Months to page backward; never goes earlier than the current
        /// month.
        #[arg(long, default_value_t = 0)]
        prev: u32,
    },
    /// Goals touching a specific day.
    Day { date: String },
    /// Goal counts: total, active, done.
    Stats,

    /// Vision board operations.
    #[command(subcommand)]
    Vision(VisionCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum MilestoneCommand {
    /// Add a milestone to a goal.
    Add { goal_id: String, title: String },
    /// List a goal's milestones.
    List { goal_id: String },
    /// Mark a milestone complete.
    Done { goal_id: String, id: String },
    /// Mark a milestone incomplete again.
    Undo { goal_id: String, id: String },
    /// Remove a milestone.
    Rm { goal_id: String, id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum VisionCommand {
    /// List vision board images.
    List,
    /// Upload an image file to the vision board.
    Add { file: PathBuf },
    /// Remove an image and its stored object.
    Rm { id: String },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
