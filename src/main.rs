//! chanwatch — directory-as-channel plugin runtime.
//!
//! Thin binary entry point. All logic lives in the `chanwatch-core` and
//! `chanwatch-plugin` crates.

use chanwatch_core::watcher::ObserverKind;
use chanwatch_core::RunReport;
use chanwatch_plugin::{run_plugin, FolderRoots, PluginError, PluginOptions, RuntimeOverrides};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Runs the sample plugin until the stop file appears.
#[derive(Debug, Parser)]
#[command(name = "chanwatch", version, about)]
struct Cli {
    /// Plugin request file written by the host.
    #[arg(long)]
    request_file: PathBuf,

    /// The runtime stops once this file exists.
    #[arg(long)]
    stop_file: PathBuf,

    /// Root of the input channel folders.
    #[arg(long)]
    input_channel_folder: PathBuf,

    /// Root of the output channel folders.
    #[arg(long)]
    output_channel_folder: PathBuf,

    /// Root of the telemetry stream folders.
    #[arg(long)]
    telemetry_stream_folder: PathBuf,

    /// Accepted for host compatibility; unused.
    #[arg(long, hide = true)]
    result_folder: Option<PathBuf>,

    /// Accepted for host compatibility; unused.
    #[arg(long, hide = true)]
    result_file: Option<PathBuf>,

    /// Delay between two scans of an inbound folder.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// How long a file must stop growing before it is dispatched.
    #[arg(long)]
    quiescence_ms: Option<u64>,

    /// Files kept in each rendered-image folder.
    #[arg(long)]
    retention_capacity: Option<usize>,

    /// `poll` or `native`.
    #[arg(long)]
    observer: Option<ObserverKind>,
}

impl Cli {
    fn into_options(self) -> PluginOptions {
        PluginOptions {
            request_file: self.request_file,
            stop_file: self.stop_file,
            roots: FolderRoots {
                telemetry: self.telemetry_stream_folder,
                input: self.input_channel_folder,
                output: self.output_channel_folder,
            },
            overrides: RuntimeOverrides {
                poll_interval_ms: self.poll_interval_ms,
                quiescence_ms: self.quiescence_ms,
                retention_capacity: self.retention_capacity,
                observer: self.observer,
            },
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<RunReport> {
    let options = cli.into_options();
    Ok(run_plugin(&options)?)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(request = %cli.request_file.display(), "chanwatch starting");

    match run(cli) {
        Ok(report) => {
            for w in &report.watchers {
                tracing::info!(
                    channel = w.channel,
                    label = %w.label,
                    dispatched = w.dispatched,
                    failed = w.failed,
                    exit = %w.exit,
                    "channel summary"
                );
            }
            tracing::info!(
                state = %report.final_state,
                evicted = report.retention.evicted,
                "chanwatch stopped"
            );
            ExitCode::from(report.exit_code())
        }
        Err(e) => {
            let code = e.downcast_ref::<PluginError>().map_or(1, PluginError::exit_code);
            tracing::error!(error = %format!("{e:#}"), code, "startup failed");
            ExitCode::from(code)
        }
    }
}
