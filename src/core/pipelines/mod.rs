//! Pipeline stages and the fixed-order sequences that compose them.
//!
//! Every stage is gated by its own `enabled` flag. A disabled stage returns
//! success without touching the filesystem or spawning anything, so composite
//! sequences can include it unconditionally.

mod code_scan;
mod deploy;
mod image_build;
mod image_publish;
mod image_scan;

pub use code_scan::CodeScan;
pub use deploy::Deploy;
pub use image_build::ImageBuild;
pub use image_publish::ImagePublish;
pub use image_scan::ImageScan;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::task::{run_all, Aggregation};
use crate::tools;

pub trait Stage {
    /// Human-readable name used in logs and stage errors.
    fn name(&self) -> &'static str;

    fn enabled(&self) -> bool;

    fn run(&self) -> Result<()>;
}

/// Wraps a stage failure with the stage name, logging it once.
pub(crate) fn stage_error(stage: &'static str, cause: Error) -> Error {
    tracing::error!(stage, code = cause.code.as_str(), error = %cause.message, "stage failed");
    Error::stage_failed(stage, cause)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageResult {
    pub stage: String,
    pub status: StageStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequenceSummary {
    pub total_stages: usize,
    pub succeeded: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequenceResult {
    pub stages: Vec<StageResult>,
    pub summary: SequenceSummary,
}

/// Stages run one after another; the first failure aborts the rest.
pub struct Sequence {
    stages: Vec<Box<dyn Stage>>,
}

impl Sequence {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// code-scan, image-build, image-scan, image-publish, deploy.
    ///
    /// `working_dir` is where deploy probes for implicit validation configs.
    pub fn all(ctx: &Context, config: &PipelineConfig, working_dir: &Path) -> Self {
        Self::new()
            .with_stage(CodeScan::new(ctx.clone()).with_config(config.clone()))
            .with_stage(ImageBuild::new(ctx.clone()).with_config(config.clone()))
            .with_stage(ImageScan::new(ctx.clone()).with_config(config.clone()))
            .with_stage(ImagePublish::new(ctx.clone()).with_config(config.clone()))
            .with_stage(
                Deploy::new(ctx.clone())
                    .with_config(config.clone())
                    .with_working_dir(working_dir),
            )
    }

    /// image-build, image-scan, image-publish.
    pub fn image_delivery(ctx: &Context, config: &PipelineConfig) -> Self {
        Self::new()
            .with_stage(ImageBuild::new(ctx.clone()).with_config(config.clone()))
            .with_stage(ImageScan::new(ctx.clone()).with_config(config.clone()))
            .with_stage(ImagePublish::new(ctx.clone()).with_config(config.clone()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self) -> Result<SequenceResult> {
        let mut stages = Vec::with_capacity(self.stages.len());

        run_all(&self.stages, Aggregation::FailFast, |stage| {
            let status = if stage.enabled() {
                StageStatus::Success
            } else {
                StageStatus::Skipped
            };
            stage.run()?;
            stages.push(StageResult {
                stage: stage.name().to_string(),
                status,
            });
            Ok(())
        })?;

        let skipped = stages
            .iter()
            .filter(|s| s.status == StageStatus::Skipped)
            .count();
        let summary = SequenceSummary {
            total_stages: stages.len(),
            succeeded: stages.len() - skipped,
            skipped,
        };

        Ok(SequenceResult { stages, summary })
    }
}

/// Checks that the executor can reach the external toolchain.
pub fn smoke_test(ctx: &Context) -> Result<()> {
    tracing::info!(dry_run = ctx.dry_run, "running smoke test pipeline");
    ctx.run(&tools::gatecheck_version(), ctx.exec_options())
        .map_err(|e| stage_error("smoke test", e))
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}
