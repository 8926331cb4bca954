use std::path::{Path, PathBuf};

use crate::bundle;
use crate::config::PipelineConfig;
use crate::context::Context;
use crate::error::Result;
use crate::exec::{Input, Output};
use crate::tools;
use crate::utils::io;

use super::{stage_error, Stage};

const NAME: &str = "image scan";

/// Saved image archive handed to clamscan. Removed after the scan.
pub const IMAGE_TAR_FILENAME: &str = "image.tar";

/// SBOM, vulnerability and antivirus scans of the built image.
pub struct ImageScan {
    ctx: Context,
    config: PipelineConfig,
}

impl ImageScan {
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

    fn bundle_path(&self) -> PathBuf {
        self.config.bundle_path()
    }

    fn sbom(&self) -> Result<PathBuf> {
        let report = self.config.artifact_path(&self.config.image_scan.syft_filename);
        let opts = self.ctx.exec_options().with_stdout(Output::file(&report));
        self.ctx.run(&tools::syft_scan(&self.config.image_tag), opts)?;
        bundle::add_file(&self.ctx, &self.bundle_path(), &report)?;
        Ok(report)
    }

    fn vulnerabilities(&self, sbom: &Path) -> Result<()> {
        let scan = &self.config.image_scan;
        let report = self.config.artifact_path(&scan.grype_filename);
        let opts = self.ctx.exec_options().with_stdout(Output::file(&report));
        self.ctx.run(
            &tools::grype_scan(sbom, Some(scan.grype_config_filename.as_str())),
            opts,
        )?;
        bundle::add_file(&self.ctx, &self.bundle_path(), &report)?;
        self.ctx
            .run(&tools::gatecheck_list(&report), self.ctx.quiet_options())
    }

    fn viruses(&self) -> Result<()> {
        let scan = &self.config.image_scan;
        if scan.freshclam_disabled {
            tracing::info!("freshclam is disabled, using existing virus definitions");
        } else {
            self.ctx.run(&tools::freshclam(), self.ctx.quiet_options())?;
        }

        let tar = self.config.artifact_path(IMAGE_TAR_FILENAME);
        let result = self.scan_archive(&tar);
        if let Err(err) = io::remove_file_if_exists(&tar, "remove image archive") {
            tracing::warn!(path = %tar.display(), error = %err, "failed to remove image archive");
        }
        result
    }

    fn scan_archive(&self, tar: &Path) -> Result<()> {
        let report = self
            .config
            .artifact_path(&self.config.image_scan.clamav_filename);

        self.ctx.run(
            &tools::image_save(self.ctx.container_cli, &self.config.image_tag, tar),
            self.ctx.quiet_options(),
        )?;

        let opts = self.ctx.exec_options().with_stdout(Output::file(&report));
        self.ctx.run(&tools::clamscan(tar), opts)?;
        bundle::add_file(&self.ctx, &self.bundle_path(), &report)?;

        let opts = self.ctx.quiet_options().with_stdin(Input::File(report));
        self.ctx.run(&tools::gatecheck_list_input("clamav"), opts)
    }

    fn execute(&self) -> Result<()> {
        io::ensure_dir(Path::new(&self.config.artifact_dir), "create artifact directory")?;
        let sbom = self.sbom()?;
        self.vulnerabilities(&sbom)?;
        self.viruses()
    }
}

impl Stage for ImageScan {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.config.image_scan.enabled
    }

    fn run(&self) -> Result<()> {
        if !self.enabled() {
            tracing::warn!("image scan pipeline is disabled, skipping");
            return Ok(());
        }
        crate::log_status!("image-scan", "Scanning {}", self.config.image_tag);
        self.execute().map_err(|e| stage_error(NAME, e))
    }
}
