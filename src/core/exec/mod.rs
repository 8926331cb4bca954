//! Subprocess execution for external tools.
//!
//! One [`Executor::run`] call spawns at most one process and blocks until it
//! finishes or the invocation's [`CancelToken`] fires, whichever comes first.
//! A single helper thread observes process completion; the calling thread
//! waits on a channel fed by that helper and by the cancel token.
//!
//! The child handle is shared between the two under a mutex. It is only ever
//! reaped or killed while that lock is held, so a kill can never reach a pid
//! that has already been released to the system.
//!
//! Every outcome is classified into a `command.*` error carrying the command
//! name and exit code (see [`classify`]).

mod cancel;
mod classify;
mod options;

pub use cancel::{CancelGuard, CancelToken};
pub use classify::EXIT_CODE_OTHER;
pub use options::{ExecOptions, FailTrigger, Input, Output, SharedBuffer, ToolCommand, WaitFn};

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use classify::{classify, Outcome};
use options::Stream;

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs tool commands. Stages depend on this trait so tests can script tool
/// outcomes without installing the tools.
pub trait Runner: Send + Sync {
    fn run(&self, cmd: &ToolCommand, opts: ExecOptions) -> Result<()>;
}

/// Real subprocess runner.
#[derive(Debug, Clone)]
pub struct Executor {
    reap_timeout: Duration,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            reap_timeout: Duration::from_secs(5),
        }
    }
}

enum Event {
    Exited(io::Result<ExitStatus>),
    Cancelled,
}

/// Piped output streams, each read to EOF on its own thread.
struct Pipes {
    stdout: Option<mpsc::Receiver<Vec<u8>>>,
    stderr: Option<mpsc::Receiver<Vec<u8>>>,
}

impl Pipes {
    fn take(child: &mut Child) -> Self {
        Self {
            stdout: child.stdout.take().map(drain),
            stderr: child.stderr.take().map(drain),
        }
    }

    /// Waits for both readers; `timeout` bounds each wait when a killed
    /// process may have left the pipe open in a grandchild.
    fn collect(self, timeout: Option<Duration>) -> (Vec<u8>, Vec<u8>) {
        let read = |rx: Option<mpsc::Receiver<Vec<u8>>>| match (rx, timeout) {
            (None, _) => Vec::new(),
            (Some(rx), None) => rx.recv().unwrap_or_default(),
            (Some(rx), Some(timeout)) => rx.recv_timeout(timeout).unwrap_or_default(),
        };
        (read(self.stdout), read(self.stderr))
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(err) = pipe.read_to_end(&mut buf) {
            tracing::debug!(error = %err, "failed to read command output");
        }
        let _ = tx.send(buf);
    });
    rx
}

fn lock(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(|p| p.into_inner())
}

/// Polls for exit, reaping the child under the lock.
fn watch(child: &Mutex<Child>) -> io::Result<ExitStatus> {
    loop {
        if let Some(status) = lock(child).try_wait()? {
            return Ok(status);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kills the child unless it has already exited, in which case its status is
/// returned instead.
fn terminate(child: &Mutex<Child>) -> io::Result<Option<ExitStatus>> {
    let mut child = lock(child);
    if let Some(status) = child.try_wait()? {
        return Ok(Some(status));
    }
    child.kill()?;
    Ok(None)
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long to wait for a killed process to be reaped before giving up on its output.
    pub fn with_reap_timeout(mut self, timeout: Duration) -> Self {
        self.reap_timeout = timeout;
        self
    }

    fn spawn_and_wait(
        &self,
        cmd: &ToolCommand,
        opts: &ExecOptions,
        stderr_buf: Option<&SharedBuffer>,
    ) -> Outcome {
        if let Err(err) = opts.run_wait() {
            return Outcome::NotStarted(err);
        }
        if opts.cancel_token().is_some_and(CancelToken::is_cancelled) {
            return Outcome::Interrupted;
        }

        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);

        let stdio = (|| -> io::Result<(Stdio, Stdio, Stdio)> {
            let stdin = opts.stdin().stdio()?;
            let stdout = opts.stdout().stdio()?;
            let stderr = match stderr_buf {
                Some(_) => Stdio::piped(),
                None => opts.stderr().stdio()?,
            };
            Ok((stdin, stdout, stderr))
        })();
        let (stdin, stdout, stderr) = match stdio {
            Ok(streams) => streams,
            Err(err) => return Outcome::SpawnFailed(err),
        };
        command.stdin(stdin).stdout(stdout).stderr(stderr);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => return Outcome::SpawnFailed(err),
        };
        let pid = child.id();
        let pipes = Pipes::take(&mut child);
        let child = Arc::new(Mutex::new(child));

        let (tx, rx) = mpsc::channel::<Event>();
        let watcher = Arc::clone(&child);
        let done_tx = tx.clone();
        thread::spawn(move || {
            let _ = done_tx.send(Event::Exited(watch(&watcher)));
        });

        let _cancel_guard = opts.cancel_token().map(|token| {
            let tx = tx.clone();
            token.on_cancel(move || {
                let _ = tx.send(Event::Cancelled);
            })
        });
        drop(tx);

        match rx.recv() {
            Ok(Event::Exited(result)) => completed(result, pipes, opts, stderr_buf),
            Ok(Event::Cancelled) => match terminate(&child) {
                Ok(Some(status)) => {
                    tracing::debug!(command = %cmd, pid, "command finished before cancellation");
                    completed(Ok(status), pipes, opts, stderr_buf)
                }
                Ok(None) => {
                    tracing::warn!(command = %cmd, pid, "command canceled");
                    match rx.recv_timeout(self.reap_timeout) {
                        Ok(Event::Exited(Ok(_))) => {
                            let (stdout, stderr) = pipes.collect(Some(self.reap_timeout));
                            deliver_streams(&stdout, &stderr, opts, stderr_buf);
                        }
                        _ => tracing::debug!(command = %cmd, pid, "killed command not reaped in time"),
                    }
                    Outcome::Interrupted
                }
                Err(err) => Outcome::InterruptFailed(err),
            },
            Err(_) => Outcome::WaitFailed(io::Error::other("completion watcher exited")),
        }
    }
}

fn completed(
    result: io::Result<ExitStatus>,
    pipes: Pipes,
    opts: &ExecOptions,
    stderr_buf: Option<&SharedBuffer>,
) -> Outcome {
    let (stdout, stderr) = pipes.collect(None);
    match result {
        Ok(status) => {
            deliver_streams(&stdout, &stderr, opts, stderr_buf);
            Outcome::Exited(status)
        }
        Err(err) => Outcome::WaitFailed(err),
    }
}

impl Runner for Executor {
    fn run(&self, cmd: &ToolCommand, opts: ExecOptions) -> Result<()> {
        tracing::info!(
            dry_run = opts.dry_run(),
            command = %cmd,
            errors_only = opts.error_only().is_some(),
            "shell exec"
        );

        if opts.dry_run() {
            return Ok(());
        }

        let stderr_buf = opts.error_only().map(|_| SharedBuffer::new());
        let outcome = self.spawn_and_wait(cmd, &opts, stderr_buf.as_ref());
        graceful_exit(cmd, &opts, outcome, stderr_buf)
    }
}

/// Classifies the outcome, fires the fail trigger and flushes buffered stderr on failure.
fn graceful_exit(
    cmd: &ToolCommand,
    opts: &ExecOptions,
    outcome: Outcome,
    stderr_buf: Option<SharedBuffer>,
) -> Result<()> {
    let Some(mut err) = classify(cmd.name(), outcome) else {
        return Ok(());
    };

    opts.trigger_failure();

    if let (Some(sink), Some(buf)) = (opts.error_only(), stderr_buf) {
        tracing::warn!(command = %cmd, "an error occurred while running a command, dumping logs to stderr");
        if let Err(io_err) = sink.deliver(&buf.take(), Stream::Stderr) {
            let dump = Error::internal_io(io_err.to_string(), Some("dump command logs".to_string()));
            err = Error::joined(vec![err, dump]).unwrap_or_else(|| Error::internal_unexpected("empty join"));
        }
    }

    tracing::error!(
        command = cmd.name(),
        exit_code = err.exit_code().unwrap_or(EXIT_CODE_OTHER),
        code = err.code.as_str(),
        "{}",
        err.message
    );
    Err(err)
}


fn deliver_streams(stdout: &[u8], stderr: &[u8], opts: &ExecOptions, stderr_buf: Option<&SharedBuffer>) {
    if let Err(err) = opts.stdout().deliver(stdout, Stream::Stdout) {
        tracing::warn!(error = %err, "failed to deliver captured stdout");
    }

    let delivered = match stderr_buf {
        Some(buf) => buf.clone().write_all(stderr),
        None => opts.stderr().deliver(stderr, Stream::Stderr),
    };
    if let Err(err) = delivered {
        tracing::warn!(error = %err, "failed to deliver captured stderr");
    }
}
