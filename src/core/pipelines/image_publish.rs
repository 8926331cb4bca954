use crate::config::PipelineConfig;
use crate::context::Context;
use crate::error::Result;
use crate::tools;

use super::{stage_error, Stage};

const NAME: &str = "image publish";

/// Pushes the image and, when a bundle tag is configured, the artifact bundle.
pub struct ImagePublish {
    ctx: Context,
    config: PipelineConfig,
}

impl ImagePublish {
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
        let image_tag = &self.config.image_tag;
        self.ctx
            .run(
                &tools::image_push(self.ctx.container_cli, image_tag),
                self.ctx.exec_options(),
            )
            .inspect_err(|_| {
                tracing::error!(image_tag = %image_tag, "failed to push image tag to registry");
            })?;

        let bundle_tag = &self.config.image_publish.bundle_tag;
        if bundle_tag.is_empty() {
            tracing::info!("artifact bundle publish is disabled, skipping");
            return Ok(());
        }

        let bundle = self.config.bundle_path();
        self.ctx
            .run(&tools::oras_push_bundle(bundle_tag, &bundle), self.ctx.exec_options())
            .inspect_err(|_| {
                tracing::error!(
                    image_tag = %bundle_tag,
                    bundle = %bundle.display(),
                    "failed to push artifact bundle to registry"
                );
            })
    }
}

impl Stage for ImagePublish {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.config.image_publish.enabled
    }

    fn run(&self) -> Result<()> {
        if !self.enabled() {
            tracing::warn!("image publish pipeline is disabled, skipping");
            return Ok(());
        }
        crate::log_status!("image-publish", "Pushing {}", self.config.image_tag);
        self.execute().map_err(|e| stage_error(NAME, e))
    }
}
