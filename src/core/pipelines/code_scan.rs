use std::path::{Path, PathBuf};

use crate::bundle;
use crate::config::PipelineConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::task::{run_all, Aggregation, CombinedTask};
use crate::utils::io;

use super::{stage_error, Stage};

const NAME: &str = "code scan";

/// Secret and static-analysis scanners over the source tree.
pub struct CodeScan {
    ctx: Context,
    config: PipelineConfig,
}

impl CodeScan {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    fn execute(&self) -> Result<()> {
        io::ensure_dir(Path::new(&self.config.artifact_dir), "create artifact directory")?;

        let combined = CombinedTask::code_scan(&self.config, self.ctx.stdout.clone());
        let reports: Vec<PathBuf> = combined.tasks().map(|t| t.report().to_path_buf()).collect();

        // Reports of successful engines still go into the bundle.
        let scanned = combined.run(&self.ctx);

        let bundle_path = self.config.bundle_path();
        let mut files: Vec<PathBuf> = reports
            .into_iter()
            .filter(|r| self.ctx.dry_run || r.exists())
            .collect();
        if !self.config.code_scan.coverage_file.is_empty() {
            files.push(PathBuf::from(&self.config.code_scan.coverage_file));
        }

        let bundled = run_all(&files, Aggregation::FailFast, |file| {
            bundle::add_file(&self.ctx, &bundle_path, file)
        });

        match (scanned, bundled) {
            (Ok(()), bundled) => bundled,
            (Err(err), Ok(())) => Err(err),
            (Err(scan_err), Err(bundle_err)) => Err(Error::joined(vec![scan_err, bundle_err])
                .unwrap_or_else(|| Error::internal_unexpected("empty join"))),
        }
    }
}

impl Stage for CodeScan {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.config.code_scan.enabled
    }

    fn run(&self) -> Result<()> {
        if !self.enabled() {
            tracing::warn!("code scan pipeline is disabled, skipping");
            return Ok(());
        }
        crate::log_status!("code-scan", "Scanning {}", self.config.code_scan.gitleaks_src_dir);
        self.execute().map_err(|e| stage_error(NAME, e))
    }
}
