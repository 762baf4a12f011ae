use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use g4dash::model::{LogEvent, RunParams, RunRecord, RunStatus};
use g4dash::scene::{self, GeometryDescription};
use g4dash::storage::RunStore;
use g4dash::{DashboardPaths, Supervisor};
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "g4dash",
    version,
    about = "Run Geant4 batch simulations and mesh their detector geometry"
)]
pub struct Cli {
    /// Project directory holding config/, runs/ and build/G4sim
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Directory of geometry descriptions (default: <project-dir>/config)
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Directory for per-run artifacts (default: <project-dir>/runs)
    #[arg(long)]
    pub runs_dir: Option<PathBuf>,

    /// Simulation engine executable (default: <project-dir>/build/G4sim)
    #[arg(long)]
    pub engine: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CliCommand {
    /// Start a run and follow its log until it finishes (Ctrl-C stops the engine)
    Run(RunArgs),
    /// List past runs, newest first
    Runs,
    /// List result files of a run
    Files { run_id: String },
    /// Print the stored log of a finished run
    Log { run_id: String },
    /// Mesh a geometry description (a path, or a file name inside the config directory)
    Scene { geometry: PathBuf },
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// JSON file with run parameters (camelCase keys, as stored in meta.json)
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Geometry file name inside the config directory
    #[arg(long)]
    pub geometry: Option<String>,

    /// Primary particle
    #[arg(long)]
    pub particle: Option<String>,

    /// Primary energy value
    #[arg(long)]
    pub energy: Option<String>,

    /// Unit of --energy
    #[arg(long)]
    pub energy_unit: Option<String>,

    /// Number of events to simulate
    #[arg(long)]
    pub events: Option<u64>,

    /// Output file name inside the run directory
    #[arg(long)]
    pub output_file: Option<String>,
}

pub async fn run(args: Cli) -> Result<()> {
    let paths = build_paths(&args);
    paths.ensure_dirs()?;
    let store = RunStore::new(&paths.runs_dir);

    match args.command.clone() {
        CliCommand::Run(run_args) => run_simulation(&args, paths, run_args).await,
        CliCommand::Runs => {
            let runs = store.list_runs()?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&runs)?);
            } else {
                print_lines(crate::text_summary::build_history(&runs).lines);
            }
            Ok(())
        }
        CliCommand::Files { run_id } => {
            let files = store.result_files(&run_id)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                print_lines(files);
            }
            Ok(())
        }
        CliCommand::Log { run_id } => {
            let log = store.read_log(&run_id)?;
            if args.json {
                println!("{}", serde_json::json!({ "log": log }));
            } else {
                println!("{log}");
            }
            Ok(())
        }
        CliCommand::Scene { geometry } => {
            let path = if geometry.exists() {
                geometry
            } else {
                paths.config_dir.join(&geometry)
            };
            let desc = GeometryDescription::load(&path)
                .with_context(|| format!("failed to load geometry {}", path.display()))?;
            let surfaces = scene::build(&desc);
            if args.json {
                println!("{}", serde_json::to_string(&surfaces)?);
            } else {
                print_lines(crate::text_summary::build_scene_summary(&surfaces).lines);
            }
            Ok(())
        }
    }
}

/// Build the filesystem layout from CLI arguments.
pub fn build_paths(args: &Cli) -> DashboardPaths {
    DashboardPaths::from_project(&args.project_dir)
        .with_config_dir(args.config_dir.clone())
        .with_runs_dir(args.runs_dir.clone())
        .with_engine(args.engine.clone())
}

/// Build run parameters: defaults, then the --params file, then individual flags.
pub fn build_params(args: &RunArgs) -> Result<RunParams> {
    let mut params = match args.params.as_deref() {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read {}", p.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid run parameters in {}", p.display()))?
        }
        None => RunParams::default(),
    };
    if let Some(v) = &args.geometry {
        params.geometry = v.clone();
    }
    if let Some(v) = &args.particle {
        params.particle = v.clone();
    }
    if let Some(v) = &args.energy {
        params.energy = v.clone();
    }
    if let Some(v) = &args.energy_unit {
        params.energy_unit = v.clone();
    }
    if let Some(v) = args.events {
        params.n_events = v;
    }
    if let Some(v) = &args.output_file {
        params.output_file = v.clone();
    }
    Ok(params)
}

/// Start one run, mirror its log to stdout and report the final record.
async fn run_simulation(args: &Cli, paths: DashboardPaths, run_args: RunArgs) -> Result<()> {
    let params = build_params(&run_args)?;
    let store = RunStore::new(&paths.runs_dir);
    let supervisor = Supervisor::spawn(paths);
    let (out_tx, out_handle) = spawn_output_writer();

    let mut follow = supervisor.subscribe().await?;
    let run_id = supervisor
        .start(params)
        .await
        .context("failed to start simulation")?;
    let _ = out_tx.send(OutputLine::Stderr(format!("Started run {run_id}")));

    let mut stopping = false;
    loop {
        tokio::select! {
            event = follow.next_event() => {
                let Some(event) = event else { break };
                if !args.json {
                    let _ = out_tx.send(OutputLine::Stdout(event.as_wire().to_string()));
                }
                if event == LogEvent::Done {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c(), if !stopping => {
                stopping = true;
                let outcome = supervisor.stop().await?;
                let msg = format!("Stop: {}", outcome.as_str());
                let _ = out_tx.send(OutputLine::Stderr(msg));
            }
        }
    }

    let record: RunRecord = store.read_record(&run_id)?;
    if args.json {
        let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(&record)?));
    } else {
        for line in crate::text_summary::build_run_summary(&record).lines {
            let _ = out_tx.send(OutputLine::Stderr(line));
        }
    }
    drop(out_tx);
    let _ = out_handle.await;

    match record.status {
        RunStatus::Completed => Ok(()),
        status => Err(anyhow::anyhow!("run {run_id} finished with status {status}")),
    }
}

fn print_lines(lines: impl IntoIterator<Item = String>) {
    for line in lines {
        println!("{line}");
    }
}
