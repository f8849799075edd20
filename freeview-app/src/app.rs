use crate::cli::{Cli, Command, RunArgs};
use crate::sessions;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use freeview_core::{Screen, Viewport};
use freeview_data::{
    CollisionPolicy, DirectoryExporter, FsObjectStore, FsRecordStore, LogNotifier, Subscriber,
    UploadPipeline,
};
use freeview_experiment::{
    AutoGate, BufferedCapture, ChannelGate, Collaborators, DirectoryAssets, ExperimentConfig,
    ExperimentError, GateHandle, Key, NullDisplay, ProgressGate, Prompt, RunOutcome,
    TrialSequencer, UserInput,
};
use freeview_timing::{Clock, TokioClock};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type InputLines = Lines<BufReader<Stdin>>;

pub struct App {
    cli: Cli,
}

impl App {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    pub async fn run(self) -> Result<()> {
        println!("=== FREE-VIEWING EXPERIMENT ===");
        println!("Platform: {}", std::env::consts::OS);

        match self.cli.command {
            Command::Run(args) => run_session(&self.cli.data_dir, args).await,
            Command::Sessions { action } => sessions::manage(&self.cli.data_dir, action).await,
        }
    }
}

pub(crate) fn records_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("sessions")
}

pub(crate) fn objects_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("storage")
}

async fn load_config(path: Option<&Path>) -> Result<ExperimentConfig> {
    let Some(path) = path else {
        return Ok(ExperimentConfig::default());
    };
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid config: {}", path.display()))
}

async fn run_session(data_dir: &Path, args: RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref()).await?;
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let policy = if args.overwrite {
        CollisionPolicy::Overwrite
    } else {
        CollisionPolicy::Reject
    };
    let subscribers = args
        .notify
        .iter()
        .map(|address| Subscriber {
            address: address.clone(),
            name: None,
        })
        .collect();
    let pipeline = UploadPipeline::new(
        Arc::new(FsRecordStore::new(records_dir(data_dir), policy)),
        Arc::new(FsObjectStore::new(objects_dir(data_dir))),
        Arc::new(LogNotifier::new(subscribers)),
    )
    .with_upsert(args.overwrite);

    let (channel_gate, handle) = ChannelGate::new();
    let gate: Arc<dyn ProgressGate> = if args.auto {
        Arc::new(AutoGate)
    } else {
        Arc::new(TerminalGate(channel_gate))
    };

    let clock = Arc::new(TokioClock::new());
    let capture = Arc::new(BufferedCapture::new());
    let mut seq = TrialSequencer::new(
        config,
        rng,
        Collaborators {
            clock: clock.clone(),
            capture: capture.clone(),
            display: Arc::new(NullDisplay::new(args.viewport)),
            gate,
            assets: Arc::new(DirectoryAssets::new(&args.stimuli)),
            pipeline: Arc::new(pipeline),
            exporter: Arc::new(DirectoryExporter::new(&args.export_dir)),
        },
    );

    let cancel = seq.cancel_token();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing the current trial");
                cancel.cancel();
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    seq.begin()?;
    intake(&mut seq, &args, &mut lines).await?;

    if let Err(e) = seq.load().await {
        error!("experiment could not start: {e}");
        return Err(e.into());
    }
    if args.auto {
        info!("auto mode reads no input, pointer data will hold milestones only");
    } else {
        spawn_input(lines, handle, cancel, StdinPointer { clock, capture });
    }

    print_viewport(args.viewport);
    let outcome = seq.run().await?;
    report(seq.screen(), &outcome);
    Ok(())
}

async fn intake(
    seq: &mut TrialSequencer<StdRng>,
    args: &RunArgs,
    lines: &mut InputLines,
) -> Result<()> {
    let mut participant = args.participant.clone();
    let mut email = args.email.clone();
    loop {
        let id = match participant.take() {
            Some(id) => id,
            None => prompt(lines, "Participant ID: ").await?,
        };
        let address = match email.take() {
            Some(address) => address,
            None => prompt(lines, "Email: ").await?,
        };
        match seq.submit_participant(&id, &address, &args.session) {
            Ok(()) => return Ok(()),
            Err(ExperimentError::Validation(e)) => println!("{e}"),
            Err(e) => return Err(e.into()),
        }
    }
}

async fn prompt(lines: &mut InputLines, label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow!("input closed during participant intake"))
}

#[derive(Debug, PartialEq)]
enum LineInput {
    Press(UserInput),
    /// Viewport coordinates, `x,y` or `x y`
    Pointer { x: f32, y: f32 },
    Exit,
}

fn input_for_line(line: &str) -> LineInput {
    if let Some((x, y)) = parse_position(line) {
        return LineInput::Pointer { x, y };
    }
    match line.trim() {
        "" => LineInput::Press(UserInput::Key(Key::Enter)),
        "q" | "quit" | "exit" => LineInput::Exit,
        text => LineInput::Press(UserInput::Key(
            text.chars().next().map_or(Key::Space, Key::Other),
        )),
    }
}

fn parse_position(line: &str) -> Option<(f32, f32)> {
    let mut parts = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty());
    let x: f32 = parts.next()?.parse().ok()?;
    let y: f32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some((x, y))
}

/// Headless pointer source: positions typed on stdin, stamped with the
/// session clock. The capture drops them outside viewing windows.
struct StdinPointer {
    clock: Arc<TokioClock>,
    capture: Arc<BufferedCapture>,
}

impl StdinPointer {
    fn record(&self, x: f32, y: f32) {
        if !self.capture.push(self.clock.now_ms(), x, y) {
            debug!("pointer position ({x}, {y}) outside a viewing window");
        }
    }
}

/// Feeds stdin lines to the gate and the pointer capture. Closing stdin
/// closes the gate, which ends the run like an exit request.
fn spawn_input(
    mut lines: InputLines,
    handle: GateHandle,
    cancel: CancellationToken,
    pointer: StdinPointer,
) {
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            match input_for_line(&line) {
                LineInput::Press(input) => {
                    if !handle.press(input) {
                        break;
                    }
                }
                LineInput::Pointer { x, y } => pointer.record(x, y),
                LineInput::Exit => {
                    info!("exit requested");
                    cancel.cancel();
                }
            }
        }
    });
}

/// Prints each prompt before waiting on the channel
struct TerminalGate(ChannelGate);

#[async_trait]
impl ProgressGate for TerminalGate {
    async fn wait(&self, prompt: Prompt) -> Option<UserInput> {
        match prompt {
            Prompt::Start => println!("Press ENTER to start, q to exit."),
            Prompt::NextTrial { next, total } => {
                println!("Trial {next} of {total}. Press ENTER to continue.")
            }
        }
        self.0.wait(prompt).await
    }
}

fn print_viewport(viewport: Viewport) {
    println!("Display Configuration:");
    println!("  Viewport: {viewport}");
}

fn report(screen: Screen, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Uploaded(receipt) => {
            let session = &receipt.session;
            info!(
                "session {} {}: {}/{} trials, {} files uploaded",
                session.session_id,
                session.status.as_str(),
                session.trials_completed,
                session.trials_expected,
                receipt.uploaded.len()
            );
            match &receipt.notifications {
                Some(n) => info!("{} of {} notifications delivered", n.delivered, n.total()),
                None => warn!("notifications were not sent"),
            }
        }
        RunOutcome::ExportedLocally { failure, report } => {
            warn!("upload failed ({failure})");
            println!("Your data was saved to {}:", report.location);
            for file in &report.files {
                println!("  {file}");
            }
            println!("Please send these files to the research team.");
        }
        RunOutcome::Cancelled => info!("session cancelled before any trial was recorded"),
    }
    info!("finished on screen {}", screen.name());
}
