//! Scriptable in-process runner for unit tests.

use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::exec::{ExecOptions, Output, Runner, ToolCommand};

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub command: ToolCommand,
    pub dry_run: bool,
    pub error_only: bool,
}

#[derive(Default)]
pub(crate) struct FakeRunner {
    calls: Mutex<Vec<Call>>,
    failures: Vec<(String, i32)>,
    outputs: Vec<(String, String)>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands whose display line starts with `prefix` exit with `code`.
    pub fn failing(mut self, prefix: &str, code: i32) -> Self {
        self.failures.push((prefix.to_string(), code));
        self
    }

    /// Commands whose display line starts with `prefix` print `stdout`.
    pub fn printing(mut self, prefix: &str, stdout: &str) -> Self {
        self.outputs.push((prefix.to_string(), stdout.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.command.display()).collect()
    }
}

impl Runner for FakeRunner {
    fn run(&self, cmd: &ToolCommand, opts: ExecOptions) -> Result<()> {
        let line = cmd.display();
        self.calls.lock().unwrap().push(Call {
            command: cmd.clone(),
            dry_run: opts.dry_run(),
            error_only: opts.error_only().is_some(),
        });

        if opts.dry_run() {
            return Ok(());
        }

        if let Some((_, code)) = self.failures.iter().find(|(p, _)| line.starts_with(p.as_str())) {
            opts.trigger_failure();
            return Err(Error::command_failed(cmd.name(), *code));
        }

        let stdout = self
            .outputs
            .iter()
            .find(|(p, _)| line.starts_with(p.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        match opts.stdout() {
            Output::File(path) => std::fs::write(path, &stdout).unwrap(),
            other => other.write(stdout.as_bytes()).unwrap(),
        }
        Ok(())
    }
}
