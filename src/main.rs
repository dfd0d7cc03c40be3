//! Script-to-Scene pipeline CLI.
//!
//! `scenepipe --project CODE [--mode basic|full]` runs a single project
//! to completion; `scenepipe --loop` scans `inbox_dir` for new projects
//! and runs them one at a time, forever, matching spec.md §6's
//! continuous-mode contract.

use clap::Parser;
use scenepipe_core::{PipelineConfig, SrtDocument, VideoMode};
use scenepipe_llm::{LlmClient, ReqwestTransport};
use scenepipe_workbook::WorkbookStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "scenepipe", about = "SRT-to-scene-workbook pipeline")]
struct Args {
    /// Enter continuous pick-up-next-project mode instead of a single run.
    #[arg(long)]
    r#loop: bool,

    /// Run a single project by its inbox/project code.
    #[arg(long, value_name = "CODE")]
    project: Option<String>,

    /// Video-note emission mode for this run.
    #[arg(long, value_enum)]
    mode: Option<CliVideoMode>,

    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliVideoMode {
    Basic,
    Full,
}

impl From<CliVideoMode> for VideoMode {
    fn from(m: CliVideoMode) -> Self {
        match m {
            CliVideoMode::Basic => VideoMode::Basic,
            CliVideoMode::Full => VideoMode::Full,
        }
    }
}

/// Sets up the structured log stream spec.md §6 implies an external
/// observer can tail: JSON events on stdout, plus a line-delimited JSON
/// file under `logs/` via a non-blocking appender.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let file_appender = tracing_appender::rolling::daily("logs", "scenepipe.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json())
        .with(fmt::layer().json().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

#[tokio::main]
async fn main() {
    let _tracing_guard = init_tracing();
    let args = Args::parse();

    let mut config = match PipelineConfig::load(&args.config) {
        Ok(c) => c,
        Err(err) => {
            error!(%err, "failed to load config");
            std::process::exit(2);
        }
    };
    if let Some(mode) = args.mode {
        config.video_mode = mode.into();
    }

    let exit_code = if args.r#loop {
        run_loop(config).await
    } else if let Some(code) = args.project.clone() {
        run_single(&config, &code).await
    } else {
        error!("either --loop or --project <CODE> is required");
        2
    };

    std::process::exit(exit_code);
}

/// Continuous mode: scan `inbox_dir` every `scan_interval_seconds` for
/// `{CODE}/{CODE}.srt`, import into `projects_dir`, and run. Duplicate
/// imports are guarded by the presence of `PROJECTS/{CODE}`.
async fn run_loop(config: PipelineConfig) -> i32 {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(config.scan_interval_seconds));
    info!(interval = config.scan_interval_seconds, "entering continuous mode");

    loop {
        interval.tick().await;

        let inbox = Path::new(&config.inbox_dir);
        let entries = match std::fs::read_dir(inbox) {
            Ok(e) => e,
            Err(err) => {
                error!(%err, inbox = %inbox.display(), "could not scan inbox");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(code) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };

            let srt_src = path.join(format!("{code}.srt"));
            if !srt_src.exists() {
                continue;
            }

            let project_dir = Path::new(&config.projects_dir).join(&code);
            if project_dir.exists() {
                continue;
            }

            if let Err(err) = import_project(&srt_src, &project_dir, &code) {
                error!(%err, project = %code, "failed to import project");
                continue;
            }

            let status = run_single(&config, &code).await;
            if status == 0 {
                let _ = std::fs::remove_file(&srt_src);
                info!(project = %code, "removed inbox copy after successful run");
            } else {
                error!(project = %code, exit_code = status, "project run did not complete successfully");
            }
        }
    }
}

fn import_project(srt_src: &Path, project_dir: &Path, code: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(project_dir)?;
    std::fs::copy(srt_src, project_dir.join(format!("{code}.srt")))?;
    Ok(())
}

/// Runs one project's pipeline to completion, mapping the resulting
/// `PipelineError` (if any) to the CLI's exit-code contract.
async fn run_single(config: &PipelineConfig, code: &str) -> i32 {
    info!(project = code, "starting project run");

    let project_dir = Path::new(&config.projects_dir).join(code);
    let srt_path = project_dir.join(format!("{code}.srt"));
    let workbook_path = project_dir.join(format!("{code}_prompts.xlsx"));

    let raw = match std::fs::read_to_string(&srt_path) {
        Ok(raw) => raw,
        Err(err) => {
            error!(%err, path = %srt_path.display(), "could not read SRT file");
            return 2;
        }
    };

    let srt = match SrtDocument::parse(&raw) {
        Ok(srt) => srt,
        Err(err) => {
            error!(%err, project = code, "SRT input invalid");
            return err.exit_code();
        }
    };

    let mut store = match WorkbookStore::load_or_create(&workbook_path) {
        Ok(store) => store,
        Err(err) => {
            error!(%err, project = code, "could not open workbook");
            return err.exit_code();
        }
    };

    let transport = Arc::new(ReqwestTransport::new());
    let client = Arc::new(LlmClient::new(transport, config.clone()));

    match scenepipe_pipeline::run_pipeline(&mut store, client, config, &srt).await {
        Ok(()) => {
            info!(project = code, "run completed");
            0
        }
        Err(err) => {
            error!(%err, project = code, "run failed");
            err.exit_code()
        }
    }
}
