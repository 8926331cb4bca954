//! Explicit dependencies handed to every stage and task.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::exec::{CancelToken, ExecOptions, Executor, Output, Runner, ToolCommand};
use crate::tools::ContainerCli;

/// Run-wide settings and collaborators. Cheap to clone; clones share the
/// runner, the output sinks and the cancellation signal.
#[derive(Clone)]
pub struct Context {
    pub dry_run: bool,
    /// Stream tool stderr live instead of only on failure.
    pub verbose: bool,
    pub container_cli: ContainerCli,
    pub stdout: Output,
    pub stderr: Output,
    pub runner: Arc<dyn Runner>,
    pub cancel: CancelToken,
}

impl Context {
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self {
            dry_run: false,
            verbose: false,
            container_cli: ContainerCli::default(),
            stdout: Output::Inherit,
            stderr: Output::Inherit,
            runner,
            cancel: CancelToken::new(),
        }
    }

    /// Context backed by real subprocesses.
    pub fn local() -> Self {
        Self::new(Arc::new(Executor::new()))
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_container_cli(mut self, cli: ContainerCli) -> Self {
        self.container_cli = cli;
        self
    }

    pub fn with_output(mut self, stdout: Output, stderr: Output) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Options wired to the caller-visible streams.
    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions::new()
            .with_dry_run(self.dry_run)
            .with_cancel(self.cancel.clone())
            .with_stdout(self.stdout.clone())
            .with_stderr(self.stderr.clone())
    }

    /// Like [`Self::exec_options`], but stderr only surfaces on failure unless verbose.
    pub fn quiet_options(&self) -> ExecOptions {
        let opts = self.exec_options();
        if self.verbose {
            opts
        } else {
            opts.with_error_only(self.stderr.clone())
        }
    }

    pub fn run(&self, cmd: &ToolCommand, opts: ExecOptions) -> Result<()> {
        self.runner.run(cmd, opts)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("dry_run", &self.dry_run)
            .field("verbose", &self.verbose)
            .field("container_cli", &self.container_cli)
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .field("cancel", &self.cancel)
            .finish()
    }
}
