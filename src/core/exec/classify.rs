//! Maps raw execution outcomes to typed command errors.

use std::io;
use std::process::ExitStatus;

use crate::error::{Error, ErrorCode};

/// Exit code reported when a tool never produced a real exit status.
pub const EXIT_CODE_OTHER: i32 = 300;

/// What happened to one invocation, before classification.
#[derive(Debug)]
pub(crate) enum Outcome {
    Exited(ExitStatus),
    NotStarted(Error),
    SpawnFailed(io::Error),
    WaitFailed(io::Error),
    Interrupted,
    InterruptFailed(io::Error),
}

/// `None` means the invocation succeeded.
pub(crate) fn classify(command: &str, outcome: Outcome) -> Option<Error> {
    match outcome {
        Outcome::Exited(status) if status.success() => None,
        Outcome::Exited(status) => Some(match status.code() {
            Some(code) => Error::command_failed(command, code),
            None => Error::command(
                ErrorCode::CommandFailed,
                command,
                EXIT_CODE_OTHER,
                describe_abnormal_exit(status),
            ),
        }),
        Outcome::NotStarted(cause) => Some(Error::command(
            ErrorCode::CommandNotStarted,
            command,
            EXIT_CODE_OTHER,
            format!("command canceled before run: {}", cause.message),
        )),
        Outcome::SpawnFailed(err) => Some(
            Error::command(ErrorCode::CommandExecFailed, command, EXIT_CODE_OTHER, spawn_cause(&err))
                .with_hint(format!("Check that '{}' is installed and on PATH", command)),
        ),
        Outcome::WaitFailed(err) => Some(Error::command(
            ErrorCode::CommandExecFailed,
            command,
            EXIT_CODE_OTHER,
            format!("failed waiting for command: {}", err),
        )),
        Outcome::Interrupted => Some(Error::command(
            ErrorCode::CommandInterrupted,
            command,
            EXIT_CODE_OTHER,
            "command interrupted",
        )),
        Outcome::InterruptFailed(err) => Some(Error::command(
            ErrorCode::CommandInterruptFailed,
            command,
            EXIT_CODE_OTHER,
            format!("command interrupt requested but failed: {}", err),
        )),
    }
}

fn spawn_cause(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => format!("executable not found: {}", err),
        io::ErrorKind::PermissionDenied => format!("executable not permitted: {}", err),
        _ => format!("failed to start command: {}", err),
    }
}

#[cfg(unix)]
fn describe_abnormal_exit(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => format!("terminated by signal {}", signal),
        None => format!("abnormal exit: {}", status),
    }
}

#[cfg(not(unix))]
fn describe_abnormal_exit(status: ExitStatus) -> String {
    format!("abnormal exit: {}", status)
}
