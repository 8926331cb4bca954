use crate::config::PipelineConfig;
use crate::context::Context;
use crate::error::Result;
use crate::tools::{self, ContainerCli};

use super::{stage_error, Stage};

const NAME: &str = "image build";

pub struct ImageBuild {
    ctx: Context,
    config: PipelineConfig,
}

impl ImageBuild {
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
}

impl Stage for ImageBuild {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.config.image_build.enabled
    }

    fn run(&self) -> Result<()> {
        if !self.enabled() {
            tracing::warn!("image build pipeline is disabled, skipping");
            return Ok(());
        }

        let build = &self.config.image_build;
        let cli = self.ctx.container_cli;
        if build.squash_layers && cli == ContainerCli::Docker {
            tracing::warn!(cli = %cli, "squash layers is only supported by podman, ignoring");
        }

        crate::log_status!("image-build", "Building {}", self.config.image_tag);
        let cmd = tools::image_build(cli, &self.config.image_tag, build);
        self.ctx.run(&cmd, self.ctx.exec_options()).map_err(|e| {
            tracing::error!(image_tag = %self.config.image_tag, "failed to build image");
            stage_error(NAME, e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Output;
    use crate::fake::FakeRunner;
    use std::sync::Arc;

    #[test]
    fn disabled_build_runs_nothing() {
        let runner = Arc::new(FakeRunner::new());
        let mut config = PipelineConfig::default();
        config.image_build.enabled = false;

        ImageBuild::new(Context::new(runner.clone())).with_config(config).run().unwrap();
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn build_uses_selected_container_cli() {
        let runner = Arc::new(FakeRunner::new());
        let ctx = Context::new(runner.clone())
            .with_container_cli(ContainerCli::Podman)
            .with_output(Output::Null, Output::Null);
        let mut config = PipelineConfig::default();
        config.image_tag = "registry.example.com/app:v1".to_string();

        ImageBuild::new(ctx).with_config(config).run().unwrap();
        assert_eq!(
            runner.lines(),
            vec!["podman build --file Dockerfile --tag registry.example.com/app:v1 ."]
        );
    }

    #[test]
    fn build_failure_names_the_stage() {
        let runner = Arc::new(FakeRunner::new().failing("docker build", 125));
        let ctx = Context::new(runner).with_output(Output::Null, Output::Null);

        let err = ImageBuild::new(ctx).run().unwrap_err();
        assert!(err.message.starts_with("image build pipeline failed"));
        assert_eq!(err.command_errors()[0].exit_code(), Some(125));
    }
}
