use clap::{Args, Subcommand};

use portage::bundle;
use portage::config::{self, PipelineConfig};
use portage::context::Context;
use portage::pipelines::{
    self, CodeScan, Deploy, ImageBuild, ImagePublish, ImageScan, Sequence, SequenceResult, Stage,
};
use portage::tools::ContainerCli;

use super::{CmdResult, GlobalArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Log commands to debug but don't execute
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Portage config file in json, yaml, or toml
    #[arg(short = 'f', long, global = true, value_name = "FILE")]
    config: Option<String>,

    /// [docker|podman] CLI interface to use for image building
    #[arg(short = 'i', long, global = true, default_value = "docker")]
    cli_interface: String,

    /// The target output directory for security report artifacts
    #[arg(long, global = true, value_name = "DIR")]
    artifact_dir: Option<String>,

    /// The target image tag (ex. alpine:latest)
    #[arg(long, global = true)]
    tag: Option<String>,

    #[command(subcommand)]
    pipeline: PipelineCommand,
}

#[derive(Subcommand, Debug)]
enum PipelineCommand {
    /// Pipeline for smoke testing this application
    Debug,
    /// Builds an image
    ImageBuild(ImageBuildFlags),
    /// Run security scans on an image
    ImageScan(ImageScanFlags),
    /// Publishes an image
    ImagePublish(ImagePublishFlags),
    /// Run Static Application Security Tests (SAST) scans
    CodeScan(CodeScanFlags),
    /// BETA FEATURE: validates the bundle and invokes webhooks; actual deployment is performed via webhooks
    Deploy(DeployFlags),
    /// Run image build + image scan + image publish
    ImageDelivery {
        #[command(flatten)]
        build: ImageBuildFlags,
        #[command(flatten)]
        scan: ImageScanFlags,
        #[command(flatten)]
        publish: ImagePublishFlags,
    },
    /// Run code scan + image delivery + deployment validation
    All {
        #[command(flatten)]
        code: CodeScanFlags,
        #[command(flatten)]
        build: ImageBuildFlags,
        #[command(flatten)]
        scan: ImageScanFlags,
        #[command(flatten)]
        publish: ImagePublishFlags,
        #[command(flatten)]
        deploy: DeployFlags,
    },
}

fn set_if(target: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

#[derive(Args, Debug, Default)]
struct ImageBuildFlags {
    /// Image build context directory
    #[arg(long, value_name = "DIR")]
    build_dir: Option<String>,

    /// Image build custom Dockerfile
    #[arg(long)]
    dockerfile: Option<String>,

    /// A build argument passed to the container build command
    #[arg(long = "build-arg", value_name = "KEY=VALUE")]
    build_args: Vec<String>,

    /// Image build custom platform option
    #[arg(long)]
    platform: Option<String>,

    /// Image build custom target option
    #[arg(long)]
    target: Option<String>,

    /// Image build custom cache-to option
    #[arg(long)]
    cache_to: Option<String>,

    /// Image build custom cache-from option
    #[arg(long)]
    cache_from: Option<String>,

    /// Image build squash all layers into one option
    #[arg(long)]
    squash_layers: bool,
}

impl ImageBuildFlags {
    fn apply(&self, config: &mut PipelineConfig) {
        let build = &mut config.image_build;
        set_if(&mut build.build_dir, &self.build_dir);
        set_if(&mut build.dockerfile, &self.dockerfile);
        set_if(&mut build.platform, &self.platform);
        set_if(&mut build.target, &self.target);
        set_if(&mut build.cache_to, &self.cache_to);
        set_if(&mut build.cache_from, &self.cache_from);
        if !self.build_args.is_empty() {
            build.args = self.build_args.clone();
        }
        if self.squash_layers {
            build.squash_layers = true;
        }
    }
}

#[derive(Args, Debug, Default)]
struct ImageScanFlags {
    /// The output filename for the syft SBOM
    #[arg(long)]
    sbom_filename: Option<String>,

    /// The output filename for the grype vulnerability report
    #[arg(long)]
    grype_filename: Option<String>,

    /// The output filename for the ClamAV scan report
    #[arg(long)]
    clamav_filename: Option<String>,
}

impl ImageScanFlags {
    fn apply(&self, config: &mut PipelineConfig) {
        let scan = &mut config.image_scan;
        set_if(&mut scan.syft_filename, &self.sbom_filename);
        set_if(&mut scan.grype_filename, &self.grype_filename);
        set_if(&mut scan.clamav_filename, &self.clamav_filename);
    }
}

#[derive(Args, Debug, Default)]
struct ImagePublishFlags {
    /// Image tag for publishing the artifact bundle
    #[arg(long)]
    bundle_tag: Option<String>,
}

impl ImagePublishFlags {
    fn apply(&self, config: &mut PipelineConfig) {
        set_if(&mut config.image_publish.bundle_tag, &self.bundle_tag);
    }
}

#[derive(Args, Debug, Default)]
struct CodeScanFlags {
    /// The output filename for the gitleaks vulnerability report
    #[arg(long)]
    gitleaks_filename: Option<String>,

    /// The output filename for the semgrep vulnerability report
    #[arg(long)]
    semgrep_filename: Option<String>,

    /// The rules semgrep will use for the scan
    #[arg(long)]
    semgrep_rules: Option<String>,

    /// Enable the use of the semgrep experimental CLI
    #[arg(long)]
    semgrep_experimental: bool,

    /// An externally generated code coverage file to validate
    #[arg(long)]
    coverage_file: Option<String>,
}

impl CodeScanFlags {
    fn apply(&self, config: &mut PipelineConfig) {
        let scan = &mut config.code_scan;
        set_if(&mut scan.gitleaks_filename, &self.gitleaks_filename);
        set_if(&mut scan.semgrep_filename, &self.semgrep_filename);
        set_if(&mut scan.semgrep_rules, &self.semgrep_rules);
        set_if(&mut scan.coverage_file, &self.coverage_file);
        if self.semgrep_experimental {
            scan.semgrep_experimental = true;
        }
    }
}

#[derive(Args, Debug, Default)]
struct DeployFlags {
    /// Gatecheck configuration file
    #[arg(long = "gatecheck-config", value_name = "FILE")]
    gatecheck_config: Option<String>,
}

impl DeployFlags {
    fn apply(&self, config: &mut PipelineConfig) {
        set_if(&mut config.deploy.gatecheck_config_filename, &self.gatecheck_config);
    }
}

/// Layers CLI flags over the loaded configuration.
fn apply_flags(args: &RunArgs, config: &mut PipelineConfig) {
    set_if(&mut config.artifact_dir, &args.artifact_dir);
    set_if(&mut config.image_tag, &args.tag);

    match &args.pipeline {
        PipelineCommand::Debug => {}
        PipelineCommand::ImageBuild(build) => build.apply(config),
        PipelineCommand::ImageScan(scan) => scan.apply(config),
        PipelineCommand::ImagePublish(publish) => publish.apply(config),
        PipelineCommand::CodeScan(code) => code.apply(config),
        PipelineCommand::Deploy(deploy) => {
            deploy.apply(config);
            if !config.deploy.enabled {
                tracing::debug!("explicitly enabling deploy pipeline");
                config.deploy.enabled = true;
            }
        }
        PipelineCommand::ImageDelivery {
            build,
            scan,
            publish,
        } => {
            build.apply(config);
            scan.apply(config);
            publish.apply(config);
        }
        PipelineCommand::All {
            code,
            build,
            scan,
            publish,
            deploy,
        } => {
            code.apply(config);
            build.apply(config);
            scan.apply(config);
            publish.apply(config);
            deploy.apply(config);
        }
    }
}

impl PipelineCommand {
    /// Pipelines that write reports into the bundle start by recording the effective config.
    fn records_config(&self) -> bool {
        !matches!(
            self,
            PipelineCommand::Debug | PipelineCommand::ImageBuild(_) | PipelineCommand::ImagePublish(_)
        )
    }
}

fn single(stage: impl Stage + 'static) -> Sequence {
    Sequence::new().with_stage(stage)
}

pub fn run(args: RunArgs, global: &GlobalArgs) -> CmdResult<SequenceResult> {
    let dir = super::working_dir()?;
    let (mut config, path) = config::load(args.config.as_deref(), &dir, super::process_env)?;
    match &path {
        Some(path) => tracing::info!(path = %path.display(), "using config file"),
        None => tracing::info!("no config file found, using defaults"),
    }
    apply_flags(&args, &mut config);

    let ctx = Context::local()
        .with_dry_run(args.dry_run)
        .with_verbose(global.verbose)
        .with_container_cli(ContainerCli::from_alias(&args.cli_interface));

    if matches!(args.pipeline, PipelineCommand::Debug) {
        pipelines::smoke_test(&ctx)?;
        return Ok((SequenceResult::default(), 0));
    }

    if args.pipeline.records_config() {
        bundle::init_with_config(&ctx, &config)?;
    }

    let sequence = match &args.pipeline {
        PipelineCommand::Debug => Sequence::new(),
        PipelineCommand::ImageBuild(_) => single(ImageBuild::new(ctx).with_config(config)),
        PipelineCommand::ImageScan(_) => single(ImageScan::new(ctx).with_config(config)),
        PipelineCommand::ImagePublish(_) => single(ImagePublish::new(ctx).with_config(config)),
        PipelineCommand::CodeScan(_) => single(CodeScan::new(ctx).with_config(config)),
        PipelineCommand::Deploy(_) => single(
            Deploy::new(ctx)
                .with_config(config)
                .with_working_dir(dir.clone()),
        ),
        PipelineCommand::ImageDelivery { .. } => Sequence::image_delivery(&ctx, &config),
        PipelineCommand::All { .. } => Sequence::all(&ctx, &config, &dir),
    };

    Ok((sequence.run()?, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: TestCommand,
    }

    #[derive(clap::Subcommand)]
    enum TestCommand {
        Run(RunArgs),
    }

    fn parse(argv: &[&str]) -> RunArgs {
        let cli = TestCli::try_parse_from(["portage", "run"].into_iter().chain(argv.iter().copied()))
            .unwrap();
        match cli.command {
            TestCommand::Run(args) => args,
        }
    }

    #[test]
    fn run_deploy_forces_deploy_enabled() {
        let args = parse(&["deploy", "--gatecheck-config", "gc.yml"]);
        let mut config = PipelineConfig::default();
        config.deploy.enabled = false;

        apply_flags(&args, &mut config);
        assert!(config.deploy.enabled);
        assert_eq!(config.deploy.gatecheck_config_filename, "gc.yml");
    }

    #[test]
    fn run_all_keeps_deploy_setting() {
        let args = parse(&["all"]);
        let mut config = PipelineConfig::default();
        config.deploy.enabled = false;

        apply_flags(&args, &mut config);
        assert!(!config.deploy.enabled);
    }

    #[test]
    fn persistent_and_stage_flags_override_config() {
        let args = parse(&[
            "image-build",
            "--tag",
            "app:2",
            "--artifact-dir",
            "out",
            "--build-arg",
            "A=1",
            "--build-arg",
            "B=2",
            "--squash-layers",
            "-i",
            "podman",
            "-n",
        ]);
        assert!(args.dry_run);
        assert_eq!(args.cli_interface, "podman");

        let mut config = PipelineConfig::default();
        apply_flags(&args, &mut config);
        assert_eq!(config.image_tag, "app:2");
        assert_eq!(config.artifact_dir, "out");
        assert_eq!(config.image_build.args, vec!["A=1", "B=2"]);
        assert!(config.image_build.squash_layers);
    }

    #[test]
    fn image_delivery_accepts_build_scan_and_publish_flags() {
        let args = parse(&[
            "image-delivery",
            "--dockerfile",
            "Containerfile",
            "--grype-filename",
            "grype.json",
            "--bundle-tag",
            "reg/app:bundle",
        ]);
        let mut config = PipelineConfig::default();
        apply_flags(&args, &mut config);
        assert_eq!(config.image_build.dockerfile, "Containerfile");
        assert_eq!(config.image_scan.grype_filename, "grype.json");
        assert_eq!(config.image_publish.bundle_tag, "reg/app:bundle");
    }

    #[test]
    fn only_bundle_writing_pipelines_record_config() {
        assert!(!parse(&["image-build"]).pipeline.records_config());
        assert!(!parse(&["debug"]).pipeline.records_config());
        assert!(parse(&["code-scan"]).pipeline.records_config());
        assert!(parse(&["all"]).pipeline.records_config());
    }
}
