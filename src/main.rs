use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::GlobalArgs;

#[derive(Debug, Clone, Copy)]
enum ResponseMode {
    Json,
    Raw(RawOutputMode),
}

#[derive(Debug, Clone, Copy)]
enum RawOutputMode {
    /// Tool output streams straight through; the outcome is logged.
    Passthrough,
    Text,
}

mod commands;
mod output;

use commands::{config, run, version};

pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "portage")]
#[command(version = VERSION)]
#[command(about = "A portable, opinionated security pipeline")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline
    Run(run::RunArgs),
    /// Inspect pipeline configuration
    Config(config::ConfigArgs),
    /// Print version information
    Version(version::VersionArgs),
}

fn response_mode(command: &Commands) -> ResponseMode {
    match command {
        Commands::Run(_) => ResponseMode::Raw(RawOutputMode::Passthrough),
        Commands::Config(_) => ResponseMode::Raw(RawOutputMode::Text),
        Commands::Version(_) => ResponseMode::Json,
    }
}

fn init_tracing(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(global.log_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    let mode = response_mode(&cli.command);

    match mode {
        ResponseMode::Raw(RawOutputMode::Passthrough) => {
            let Commands::Run(args) = cli.command else {
                return std::process::ExitCode::FAILURE;
            };
            let start = Instant::now();
            let result = run::run(args, &cli.global);
            eprintln!("------------");
            let exit_code = match result {
                Ok((outcome, exit_code)) => {
                    tracing::info!(
                        elapsed = ?start.elapsed(),
                        stages = outcome.summary.total_stages,
                        skipped = outcome.summary.skipped,
                        "done"
                    );
                    exit_code
                }
                Err(err) => {
                    tracing::error!(elapsed = ?start.elapsed(), code = err.code.as_str(), "{}", err);
                    output::exit_code_for_error(&err)
                }
            };
            std::process::ExitCode::from(exit_code_to_u8(exit_code))
        }
        ResponseMode::Raw(RawOutputMode::Text) => {
            match commands::run_text(cli.command, &cli.global) {
                Ok((content, exit_code)) => {
                    print!("{}", content);
                    std::process::ExitCode::from(exit_code_to_u8(exit_code))
                }
                Err(err) => {
                    let exit_code = output::exit_code_for_error(&err);
                    let _ = output::print_result::<serde_json::Value>(Err(err));
                    std::process::ExitCode::from(exit_code_to_u8(exit_code))
                }
            }
        }
        ResponseMode::Json => {
            let (json_result, exit_code) = commands::run_json(cli.command, &cli.global);
            let _ = output::print_json_result(json_result);
            std::process::ExitCode::from(exit_code_to_u8(exit_code))
        }
    }
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
