use clap::{Args, Parser, Subcommand, ValueEnum};
use freeview_core::{SessionStatus, Viewport};
use std::path::PathBuf;

/// Free-viewing attention experiment.
#[derive(Parser, Debug)]
#[command(name = "freeview", about = "Free-viewing attention experiment")]
pub struct Cli {
    /// Directory holding session records and uploaded files.
    #[arg(long, default_value = "freeview-data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one session end to end. While waiting for input, a line of two
    /// numbers (`x,y`) is recorded as a pointer position.
    Run(RunArgs),
    /// Inspect and manage stored sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory with `data/stimuli-config.json` and `images/`.
    #[arg(long, default_value = ".")]
    pub stimuli: PathBuf,

    /// Participant id (prompted for when missing).
    #[arg(long)]
    pub participant: Option<String>,

    /// Participant email (prompted for when missing).
    #[arg(long)]
    pub email: Option<String>,

    /// Session number, `001` when blank.
    #[arg(long, default_value = "")]
    pub session: String,

    /// Where files go when the upload fails.
    #[arg(long, default_value = "exports")]
    pub export_dir: PathBuf,

    #[arg(long, default_value = "1920x1080", value_parser = parse_viewport)]
    pub viewport: Viewport,

    /// Seed for the trial order and quadrant shuffles.
    #[arg(long)]
    pub seed: Option<u64>,

    /// JSON file with `ExperimentConfig` overrides.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Notification recipients.
    #[arg(long = "notify")]
    pub notify: Vec<String>,

    /// Advance through every prompt without waiting for input.
    #[arg(long)]
    pub auto: bool,

    /// Replace an existing session with the same id.
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// List sessions, newest first.
    List {
        /// Substring of participant id or session id.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Count completed and partial sessions.
    Summary,
    /// Remove a session record and all of its files.
    Delete { session_id: String },
    /// Pack a session's files into one zip.
    Bundle {
        session_id: String,
        /// Output path, `<session_id>_data.zip` by default.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum StatusArg {
    Completed,
    Partial,
}

impl From<StatusArg> for SessionStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Completed => SessionStatus::Completed,
            StatusArg::Partial => SessionStatus::Partial,
        }
    }
}

fn parse_viewport(s: &str) -> Result<Viewport, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s}"))?;
    let width = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let height = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    Ok(Viewport::new(width, height))
}
