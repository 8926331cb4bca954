use clap::Args;

pub type CmdResult<T> = portage::Result<(T, i32)>;

/// Logging flags shared by every subcommand.
#[derive(Args, Debug, Default)]
pub(crate) struct GlobalArgs {
    /// Verbose logging output; tool stderr is streamed live
    #[arg(short, long, global = true, conflicts_with = "silent")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long, global = true)]
    pub silent: bool,
}

impl GlobalArgs {
    /// Default filter directive when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.silent {
            "error"
        } else {
            "info"
        }
    }
}

/// Lookup used for `PORTAGE_*` variables and webhook authorization.
pub(crate) fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

pub(crate) fn working_dir() -> portage::Result<std::path::PathBuf> {
    std::env::current_dir().map_err(|e| {
        portage::Error::internal_io(e.to_string(), Some("read current directory".to_string()))
    })
}

pub mod config;
pub mod run;
pub mod version;

pub(crate) fn run_text(command: crate::Commands, global: &GlobalArgs) -> portage::Result<(String, i32)> {
    match command {
        crate::Commands::Config(args) => config::run_text(args, global),
        _ => Err(portage::Error::validation_invalid_argument(
            "output_mode",
            "Command does not support text output",
            None,
            None,
        )),
    }
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (portage::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Version(args) => dispatch!(args, global, version),

        // Special cases: these use raw output modes
        crate::Commands::Run(_) | crate::Commands::Config(_) => {
            let err = portage::Error::validation_invalid_argument(
                "output_mode",
                "Command uses raw output mode",
                None,
                None,
            );
            crate::output::map_cmd_result_to_json::<serde_json::Value>(Err(err))
        }
    }
}
