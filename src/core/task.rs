//! Task aggregation and the combined code-scan task.
//!
//! Two failure policies exist side by side:
//! - [`Aggregation::BestEffort`]: every item runs; failures are joined.
//! - [`Aggregation::FailFast`]: the first failure stops the run.
//!
//! [`CombinedTask`] runs its scanners best-effort so one broken engine never
//! suppresses the reports of the others. Stage sequences run fail-fast.

use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::exec::{Output, SharedBuffer};
use crate::tools;
use crate::utils::io;

/// How a task runner treats a failing item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Keep going; return every failure joined into one error.
    BestEffort,
    /// Stop at the first failure and return it.
    FailFast,
}

/// Runs `f` over `items` in order under the given policy.
pub fn run_all<I, T, F>(items: I, policy: Aggregation, mut f: F) -> Result<()>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Result<()>,
{
    let mut errors = Vec::new();

    for item in items {
        if let Err(err) = f(item) {
            match policy {
                Aggregation::FailFast => return Err(err),
                Aggregation::BestEffort => errors.push(err),
            }
        }
    }

    match Error::joined(errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// One scanning engine inside a [`CombinedTask`].
pub trait CodeScanTask: Send + Sync {
    fn name(&self) -> &'static str;

    /// Report file this task produces.
    fn report(&self) -> &Path;

    /// Produce the report, then write its summary table into `display`.
    fn run(&self, ctx: &Context, display: &SharedBuffer) -> Result<()>;
}

/// Summary table of `report` into `display`.
fn summarize(ctx: &Context, report: &Path, display: &SharedBuffer) -> Result<()> {
    let opts = ctx
        .quiet_options()
        .with_stdout(Output::Capture(display.clone()));
    ctx.run(&tools::gatecheck_list(report), opts)
}

pub struct GitleaksTask {
    pub src_dir: String,
    pub report: PathBuf,
}

impl CodeScanTask for GitleaksTask {
    fn name(&self) -> &'static str {
        "gitleaks"
    }

    fn report(&self) -> &Path {
        &self.report
    }

    fn run(&self, ctx: &Context, display: &SharedBuffer) -> Result<()> {
        ctx.run(
            &tools::gitleaks_detect(&self.src_dir, &self.report),
            ctx.exec_options().with_stdout(Output::Null),
        )?;
        summarize(ctx, &self.report, display)
    }
}

pub struct SemgrepTask {
    pub rules: String,
    pub experimental: bool,
    pub src_dir: String,
    pub report: PathBuf,
}

impl CodeScanTask for SemgrepTask {
    fn name(&self) -> &'static str {
        "semgrep"
    }

    fn report(&self) -> &Path {
        &self.report
    }

    fn run(&self, ctx: &Context, display: &SharedBuffer) -> Result<()> {
        if self.rules.trim().is_empty() {
            return Err(Error::validation_missing_argument(vec![
                "codeScan.semgrepRules".to_string(),
            ]));
        }

        let cmd = tools::semgrep_scan(&self.rules, self.experimental, &self.src_dir);
        let opts = ctx.exec_options().with_stdout(Output::file(&self.report));
        if let Err(err) = ctx.run(&cmd, opts) {
            // A partial JSON document would poison the bundle.
            let cleanup = io::remove_file_if_exists(&self.report, "remove semgrep report");
            return Err(match cleanup {
                Ok(()) => err,
                Err(cleanup_err) => Error::joined(vec![err, cleanup_err])
                    .unwrap_or_else(|| Error::internal_unexpected("empty join")),
            });
        }

        summarize(ctx, &self.report, display)
    }
}

pub struct SnykTask {
    pub src_dir: String,
    pub report: PathBuf,
}

impl CodeScanTask for SnykTask {
    fn name(&self) -> &'static str {
        "snyk"
    }

    fn report(&self) -> &Path {
        &self.report
    }

    fn run(&self, ctx: &Context, display: &SharedBuffer) -> Result<()> {
        let mut missing = Vec::new();
        if self.report.as_os_str().is_empty() {
            missing.push("codeScan.snykFilename".to_string());
        }
        if self.src_dir.trim().is_empty() {
            missing.push("codeScan.snykSrcDir".to_string());
        }
        if !missing.is_empty() {
            return Err(Error::validation_missing_argument(missing));
        }

        ctx.run(
            &tools::snyk_code_test(&self.report, &self.src_dir),
            ctx.exec_options(),
        )?;
        summarize(ctx, &self.report, display)
    }
}

/// Ordered, homogeneous sub-tasks run sequentially with best-effort aggregation.
///
/// Each sub-task writes its summary into a private buffer; the buffers are
/// flushed to the display sink in task order once every sub-task has finished.
pub struct CombinedTask {
    tasks: Vec<Box<dyn CodeScanTask>>,
    display: Output,
}

impl CombinedTask {
    pub fn new(display: Output) -> Self {
        Self {
            tasks: Vec::new(),
            display,
        }
    }

    pub fn with_task(mut self, task: impl CodeScanTask + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    /// Configured code scanners in their fixed order: gitleaks, semgrep, then
    /// snyk when a snyk report filename is set.
    pub fn code_scan(config: &PipelineConfig, display: Output) -> Self {
        let scan = &config.code_scan;
        let mut combined = Self::new(display)
            .with_task(GitleaksTask {
                src_dir: scan.gitleaks_src_dir.clone(),
                report: config.artifact_path(&scan.gitleaks_filename),
            })
            .with_task(SemgrepTask {
                rules: scan.semgrep_rules.clone(),
                experimental: scan.semgrep_experimental,
                src_dir: scan.semgrep_src_dir.clone(),
                report: config.artifact_path(&scan.semgrep_filename),
            });

        if !scan.snyk_filename.is_empty() {
            combined = combined.with_task(SnykTask {
                src_dir: scan.snyk_src_dir.clone(),
                report: config.artifact_path(&scan.snyk_filename),
            });
        }
        combined
    }

    pub fn tasks(&self) -> impl Iterator<Item = &dyn CodeScanTask> {
        self.tasks.iter().map(|t| t.as_ref())
    }

    pub fn run(&self, ctx: &Context) -> Result<()> {
        let buffers: Vec<SharedBuffer> = self.tasks.iter().map(|_| SharedBuffer::new()).collect();

        let result = run_all(
            self.tasks.iter().zip(&buffers),
            Aggregation::BestEffort,
            |(task, buffer)| {
                tracing::debug!(task = task.name(), report = %task.report().display(), "run code scan task");
                task.run(ctx, buffer).inspect_err(|err| {
                    tracing::error!(task = task.name(), code = err.code.as_str(), "code scan task failed");
                })
            },
        );

        let mut flushed = Ok(());
        for buffer in &buffers {
            if let Err(err) = self.display.write(&buffer.take()) {
                flushed = Err(Error::internal_io(
                    err.to_string(),
                    Some("write code scan summary".to_string()),
                ));
                break;
            }
        }

        match (result, flushed) {
            (Ok(()), flushed) => flushed,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(flush_err)) => Err(Error::joined(vec![err, flush_err])
                .unwrap_or_else(|| Error::internal_unexpected("empty join"))),
        }
    }
}
