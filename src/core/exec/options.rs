//! Per-invocation parameters for the executor.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use super::cancel::CancelToken;
use crate::error::Result;
use crate::utils::shell;

/// Program and argument vector for one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Command name used in error classification.
    pub fn name(&self) -> &str {
        &self.program
    }

    pub fn display(&self) -> String {
        shell::command_line(&self.program, &self.args)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// In-memory sink that can be handed to several owners and read back later.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// Removes and returns everything written so far.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.lock().len())
            .finish()
    }
}

/// Where a subprocess reads its standard input from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Input {
    Inherit,
    #[default]
    Null,
    File(PathBuf),
}

impl Input {
    pub(crate) fn stdio(&self) -> io::Result<Stdio> {
        Ok(match self {
            Input::Inherit => Stdio::inherit(),
            Input::Null => Stdio::null(),
            Input::File(path) => Stdio::from(File::open(path)?),
        })
    }
}

/// Where a subprocess output stream goes.
///
/// `File` truncates the target when the process starts. `Capture` collects the
/// stream in memory and delivers it to the buffer once the process exits.
#[derive(Debug, Clone, Default)]
pub enum Output {
    Inherit,
    #[default]
    Null,
    File(PathBuf),
    Capture(SharedBuffer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stream {
    Stdout,
    Stderr,
}

impl Output {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Output::File(path.as_ref().to_path_buf())
    }

    pub(crate) fn stdio(&self) -> io::Result<Stdio> {
        Ok(match self {
            Output::Inherit => Stdio::inherit(),
            Output::Null => Stdio::null(),
            Output::File(path) => Stdio::from(File::create(path)?),
            Output::Capture(_) => Stdio::piped(),
        })
    }

    /// Writes bytes as if the process had printed them to stdout.
    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        self.deliver(bytes, Stream::Stdout)
    }

    /// Appends bytes produced outside the subprocess (captured or buffered output).
    pub(crate) fn deliver(&self, bytes: &[u8], stream: Stream) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        match self {
            Output::Inherit => match stream {
                Stream::Stdout => io::stdout().lock().write_all(bytes),
                Stream::Stderr => io::stderr().lock().write_all(bytes),
            },
            Output::Null => Ok(()),
            Output::File(path) => OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?
                .write_all(bytes),
            Output::Capture(buffer) => buffer.clone().write_all(bytes),
        }
    }
}

pub type FailTrigger = Arc<dyn Fn() + Send + Sync>;
pub type WaitFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Immutable per-invocation settings. Everything is optional; the command
/// itself is passed separately as a [`ToolCommand`].
#[derive(Clone, Default)]
pub struct ExecOptions {
    stdin: Input,
    stdout: Output,
    stderr: Output,
    dry_run: bool,
    error_only: Option<Output>,
    cancel: Option<CancelToken>,
    fail_trigger: Option<FailTrigger>,
    wait: Option<WaitFn>,
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the command that would run and succeed without spawning it.
    pub fn with_dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn with_io(mut self, stdin: Input, stdout: Output, stderr: Output) -> Self {
        self.stdin = stdin;
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn with_stdin(mut self, stdin: Input) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn with_stdout(mut self, stdout: Output) -> Self {
        self.stdout = stdout;
        self
    }

    pub fn with_stderr(mut self, stderr: Output) -> Self {
        self.stderr = stderr;
        self
    }

    /// Buffer stderr and write it to `sink` only if the invocation fails.
    pub fn with_error_only(mut self, sink: Output) -> Self {
        self.error_only = Some(sink);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Called once when the invocation fails.
    pub fn with_fail_trigger<F>(mut self, trigger: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.fail_trigger = Some(Arc::new(trigger));
        self
    }

    /// Called before spawning; an error means the process is never started.
    pub fn with_wait<F>(mut self, wait: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.wait = Some(Arc::new(wait));
        self
    }

    pub fn stdin(&self) -> &Input {
        &self.stdin
    }

    pub fn stdout(&self) -> &Output {
        &self.stdout
    }

    pub fn stderr(&self) -> &Output {
        &self.stderr
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn error_only(&self) -> Option<&Output> {
        self.error_only.as_ref()
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    pub(crate) fn run_wait(&self) -> Result<()> {
        match &self.wait {
            Some(wait) => wait(),
            None => Ok(()),
        }
    }

    pub(crate) fn trigger_failure(&self) {
        if let Some(trigger) = &self.fail_trigger {
            trigger();
        }
    }
}

impl fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOptions")
            .field("stdin", &self.stdin)
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .field("dry_run", &self.dry_run)
            .field("error_only", &self.error_only)
            .field("cancel", &self.cancel)
            .field("fail_trigger", &self.fail_trigger.is_some())
            .field("wait", &self.wait.is_some())
            .finish()
    }
}
