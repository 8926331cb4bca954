//! Argument vectors for the external tools the pipelines drive.
//!
//! Builders only format arguments; they never touch the filesystem. Output
//! routing (for tools that write reports to stdout) is the caller's job.

use std::fmt;
use std::path::Path;

use crate::config::ImageBuildConfig;
use crate::exec::ToolCommand;

/// Container engine CLI used for build, push and save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContainerCli {
    #[default]
    Docker,
    Podman,
}

impl ContainerCli {
    /// Case-insensitive. Anything unrecognized falls back to docker.
    pub fn from_alias(alias: &str) -> Self {
        match alias.trim().to_ascii_lowercase().as_str() {
            "podman" => ContainerCli::Podman,
            _ => ContainerCli::Docker,
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            ContainerCli::Docker => "docker",
            ContainerCli::Podman => "podman",
        }
    }
}

impl fmt::Display for ContainerCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ============================================================================
// Container engine
// ============================================================================

pub fn image_build(cli: ContainerCli, image_tag: &str, build: &ImageBuildConfig) -> ToolCommand {
    let mut cmd = ToolCommand::new(cli.program(), ["build"])
        .args(["--file", build.dockerfile.as_str()])
        .args(["--tag", image_tag]);

    for arg in &build.args {
        cmd = cmd.args(["--build-arg", arg.as_str()]);
    }
    if !build.platform.is_empty() {
        cmd = cmd.args(["--platform", build.platform.as_str()]);
    }
    if !build.target.is_empty() {
        cmd = cmd.args(["--target", build.target.as_str()]);
    }
    if !build.cache_to.is_empty() {
        cmd = cmd.args(["--cache-to", build.cache_to.as_str()]);
    }
    if !build.cache_from.is_empty() {
        cmd = cmd.args(["--cache-from", build.cache_from.as_str()]);
    }
    if build.squash_layers && cli == ContainerCli::Podman {
        cmd = cmd.arg("--squash-all");
    }

    cmd.arg(build.build_dir.as_str())
}

pub fn image_push(cli: ContainerCli, image_tag: &str) -> ToolCommand {
    ToolCommand::new(cli.program(), ["push", image_tag])
}

pub fn image_save(cli: ContainerCli, image_tag: &str, tar_path: &Path) -> ToolCommand {
    ToolCommand::new(cli.program(), ["save"])
        .args(["--output".to_string(), path_arg(tar_path)])
        .arg(image_tag)
}

// ============================================================================
// Image scanners
// ============================================================================

/// SBOM as JSON on stdout.
pub fn syft_scan(image_tag: &str) -> ToolCommand {
    ToolCommand::new("syft", ["scan", image_tag, "--scope", "squashed", "--output", "json"])
}

/// Vulnerability report as JSON on stdout, from a syft SBOM.
pub fn grype_scan(sbom_path: &Path, config_path: Option<&str>) -> ToolCommand {
    let mut cmd = ToolCommand::new("grype", Vec::<String>::new());
    if let Some(config) = config_path.filter(|c| !c.is_empty()) {
        cmd = cmd.args(["--config", config]);
    }
    cmd.args(["--add-cpes-if-none", "--by-cve", "--output", "json"])
        .arg(format!("sbom:{}", sbom_path.display()))
}

pub fn freshclam() -> ToolCommand {
    ToolCommand::new("freshclam", Vec::<String>::new())
}

/// Virus report as text on stdout.
pub fn clamscan(target: &Path) -> ToolCommand {
    ToolCommand::new(
        "clamscan",
        [
            "--infected",
            "--recursive",
            "--scan-archive=yes",
            "--max-filesize=4000M",
            "--max-scansize=4000M",
            "--stdout",
        ],
    )
    .arg(path_arg(target))
}

// ============================================================================
// Code scanners
// ============================================================================

pub fn gitleaks_detect(src_dir: &str, report_path: &Path) -> ToolCommand {
    ToolCommand::new("gitleaks", ["detect", "--exit-code", "0", "--verbose"])
        .args(["--source", src_dir])
        .args(["--report-path".to_string(), path_arg(report_path)])
}

/// SAST report as JSON on stdout.
pub fn semgrep_scan(rules: &str, experimental: bool, src_dir: &str) -> ToolCommand {
    if experimental {
        ToolCommand::new("osemgrep", ["scan", "--json", "--experimental", "--config", rules, src_dir])
    } else {
        ToolCommand::new("semgrep", ["scan", "--json", "--config", rules, src_dir])
    }
}

pub fn snyk_code_test(report_path: &Path, src_dir: &str) -> ToolCommand {
    ToolCommand::new("snyk", ["code", "test", "-d"])
        .arg(format!("--sarif-file-output={}", report_path.display()))
        .arg(src_dir)
}

// ============================================================================
// gatecheck
// ============================================================================

pub fn gatecheck_version() -> ToolCommand {
    ToolCommand::new("gatecheck", ["version"])
}

/// Summary table of a report file on stdout.
pub fn gatecheck_list(report_path: &Path) -> ToolCommand {
    ToolCommand::new("gatecheck", ["list".to_string(), path_arg(report_path)])
}

/// Summary table of a report read from stdin.
pub fn gatecheck_list_input(input_type: &str) -> ToolCommand {
    ToolCommand::new("gatecheck", ["list", "--input-type", input_type])
}

pub fn gatecheck_bundle_create(bundle_path: &Path, file_path: &Path) -> ToolCommand {
    ToolCommand::new("gatecheck", ["bundle", "create"])
        .args([path_arg(bundle_path), path_arg(file_path)])
}

pub fn gatecheck_bundle_add(bundle_path: &Path, file_path: &Path) -> ToolCommand {
    ToolCommand::new("gatecheck", ["bundle", "add"])
        .args([path_arg(bundle_path), path_arg(file_path)])
}

pub fn gatecheck_validate(target: &Path, config_path: Option<&Path>) -> ToolCommand {
    let cmd = ToolCommand::new("gatecheck", ["validate".to_string(), path_arg(target)]);
    match config_path {
        Some(config) => cmd.args(["--config".to_string(), path_arg(config)]),
        None => cmd,
    }
}

// ============================================================================
// Registry
// ============================================================================

pub const BUNDLE_MEDIA_TYPE: &str = "application/vnd.gatecheck.bundle.tar+gzip";

pub fn oras_push_bundle(bundle_tag: &str, bundle_path: &Path) -> ToolCommand {
    ToolCommand::new("oras", ["push", bundle_tag])
        .arg(format!("{}:{}", bundle_path.display(), BUNDLE_MEDIA_TYPE))
}
