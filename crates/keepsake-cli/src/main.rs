use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod input;
mod render;
mod resolver;

use input::{command_for, Input};
use keepsake_bus::{EventBus, Topic};
use keepsake_core::{load_config, sample_config, FlowConfig, ScreenFlowController};
use keepsake_runtime::FlowDriver;
use render::TerminalRenderer;
use resolver::DirectoryResolver;

const EVENT_BUFFER: usize = 64;

#[derive(Parser)]
#[command(name = "keepsake", version, about = "keepsake birthday surprise flow")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate a flow config file")]
    Validate {
        #[arg(long, default_value = "config/flow.yaml", help = "Flow config file")]
        config: PathBuf,
    },
    #[command(about = "Print the bundled sample flow config")]
    Sample,
    #[command(about = "Play the flow in the terminal")]
    Run {
        #[arg(long, default_value = "config/flow.yaml", help = "Flow config file")]
        config: PathBuf,
        #[arg(long, default_value = "media", help = "Directory holding <group>/<n>.jpg")]
        media_root: PathBuf,
        #[arg(long, help = "Also write daily-rolling logs into this directory")]
        log_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = match &cli.command {
        Some(Commands::Run { log_dir, .. }) => log_dir.clone(),
        _ => None,
    };
    let _guard = init_tracing(log_dir.as_deref())?;

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Validate { config } => {
            println!("{}", validate(&config)?);
        }
        Commands::Sample => {
            print!("{}", sample_config());
        }
        Commands::Run {
            config, media_root, ..
        } => {
            let config = load_config(&config)?;
            run_flow(config, media_root).await?;
        }
    }

    Ok(())
}

fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log dir: {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "keepsake.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn validate(path: &Path) -> Result<String> {
    let config = load_config(path)?;
    let groups = config
        .gallery
        .as_ref()
        .map(|gallery| gallery.groups.len())
        .unwrap_or(0);
    Ok(format!(
        "Config valid. {} questions, {} routes, {} memory groups.",
        config.questions.len(),
        config.routes.len(),
        groups
    ))
}

async fn run_flow(config: FlowConfig, media_root: PathBuf) -> Result<()> {
    let controller = ScreenFlowController::new(config)?;
    let bus = EventBus::new(EVENT_BUFFER);
    let mut events = bus.subscribe_many(&Topic::ALL).await;
    let (driver, handle) = FlowDriver::new(controller, bus.publisher());
    let driver_task = tokio::spawn(driver.run());

    let mut renderer = TerminalRenderer::new(Box::new(DirectoryResolver::new(media_root)));
    let mut snapshots = handle.watch();
    handle.start().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => {
                tracing::debug!(?event, "flow event");
                for line in renderer.render_event(&event) {
                    println!("{line}");
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                for line in renderer.render_snapshot(&snapshot) {
                    println!("{line}");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let input = Input::parse(&line);
                if input == Input::Quit {
                    break;
                }
                let snapshot = handle.snapshot();
                let Some(command) = command_for(input, &snapshot) else {
                    tracing::debug!(?input, screen = %snapshot.screen, "input ignored");
                    continue;
                };
                if let Err(err) = handle.send(command).await {
                    println!("  ! {err}");
                }
            }
        }
    }

    drop(handle);
    driver_task.await.context("flow driver panicked")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_validate_with_default_config() {
        let cli = Cli::try_parse_from(["keepsake", "validate"]).unwrap();
        match cli.command.unwrap() {
            Commands::Validate { config } => assert_eq!(config, PathBuf::from("config/flow.yaml")),
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn parses_sample_subcommand() {
        let cli = Cli::try_parse_from(["keepsake", "sample"]).unwrap();
        assert!(matches!(cli.command.unwrap(), Commands::Sample));
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "keepsake",
            "run",
            "--config",
            "flow.yaml",
            "--media-root",
            "/images/mom-photos",
            "--log-dir",
            "logs",
        ])
        .unwrap();
        match cli.command.unwrap() {
            Commands::Run {
                config,
                media_root,
                log_dir,
            } => {
                assert_eq!(config, PathBuf::from("flow.yaml"));
                assert_eq!(media_root, PathBuf::from("/images/mom-photos"));
                assert_eq!(log_dir, Some(PathBuf::from("logs")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn run_defaults_have_no_log_dir() {
        let cli = Cli::try_parse_from(["keepsake", "run"]).unwrap();
        assert!(matches!(
            cli.command.unwrap(),
            Commands::Run { log_dir: None, .. }
        ));
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["keepsake"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn validate_summarizes_sample() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("flow.yaml");
        std::fs::write(&path, sample_config()).unwrap();

        let summary = validate(&path).unwrap();
        assert_eq!(summary, "Config valid. 2 questions, 10 routes, 5 memory groups.");
    }

    #[test]
    fn validate_reports_invalid_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("flow.yaml");
        std::fs::write(&path, "questions: []\nroutes: []\n").unwrap();

        let err = validate(&path).unwrap_err();
        assert!(format!("{err:#}").contains("at least one question is required"));
    }
}
