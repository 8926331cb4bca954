//! Deploy stage: validate the bundle, then notify success webhooks.
//!
//! Steps run in a fixed order and the first failure ends the stage:
//! resolve the validation config, merge it onto the defaults, persist it to
//! the artifact directory, add it to the bundle, validate, notify.

use std::path::PathBuf;
use std::sync::Arc;

use crate::bundle;
use crate::config::PipelineConfig;
use crate::context::Context;
use crate::error::Result;
use crate::tools;
use crate::validation_config;
use crate::webhook::WebhookClient;

use super::{stage_error, Stage};

const NAME: &str = "deploy";

/// Resolves an environment variable by name.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct Deploy {
    ctx: Context,
    config: PipelineConfig,
    working_dir: PathBuf,
    env: EnvLookup,
    webhooks: WebhookClient,
}

impl Deploy {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            config: PipelineConfig::default(),
            working_dir: PathBuf::from("."),
            env: Arc::new(|name: &str| std::env::var(name).ok()),
            webhooks: WebhookClient::new(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Directory probed for `.gatecheck.yml` / `.gatecheck.yaml`.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Source of webhook authorization values.
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    fn execute(&self) -> Result<()> {
        let deploy = &self.config.deploy;
        let bundle_path = self.config.bundle_path();

        let sources =
            validation_config::sources(&deploy.gatecheck_config_filename, &self.working_dir);
        let resolved = validation_config::resolve(&sources)?;
        let config_path =
            validation_config::persist(&PathBuf::from(&self.config.artifact_dir), &resolved)?;

        bundle::add_file(&self.ctx, &bundle_path, &config_path)?;

        self.ctx.run(
            &tools::gatecheck_validate(&bundle_path, Some(&config_path)),
            self.ctx.exec_options(),
        )?;

        if deploy.success_webhooks.is_empty() {
            tracing::debug!("no success webhooks configured");
            return Ok(());
        }
        if self.ctx.dry_run {
            for target in &deploy.success_webhooks {
                tracing::info!(webhook = %target.url, dry_run = true, "would submit deployment success webhook");
            }
            return Ok(());
        }

        let env = &self.env;
        self.webhooks
            .notify_all(&deploy.success_webhooks, &bundle_path, |name| env(name))
    }
}

impl Stage for Deploy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.config.deploy.enabled
    }

    fn run(&self) -> Result<()> {
        if !self.enabled() {
            tracing::warn!("deployment pipeline is disabled, skipping");
            return Ok(());
        }

        tracing::warn!(
            "BETA FEATURE: deploy performs bundle validation and invokes webhooks; the actual deployment is performed by the webhook receivers"
        );
        crate::log_status!("deploy", "Validating {}", self.config.bundle_path().display());
        self.execute().map_err(|e| stage_error(NAME, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebhookTarget;
    use crate::exec::Output;
    use crate::fake::FakeRunner;

    fn config(dir: &std::path::Path) -> PipelineConfig {
        let mut config = PipelineConfig {
            artifact_dir: dir.join("artifacts").to_string_lossy().into_owned(),
            ..PipelineConfig::default()
        };
        config.deploy.enabled = true;
        config
    }

    fn context(runner: Arc<FakeRunner>) -> Context {
        Context::new(runner).with_output(Output::Null, Output::Null)
    }

    #[test]
    fn disabled_deploy_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let mut cfg = config(dir.path());
        cfg.deploy.enabled = false;

        Deploy::new(context(runner.clone()))
            .with_config(cfg)
            .with_working_dir(dir.path())
            .run()
            .unwrap();
        assert!(runner.calls().is_empty());
        assert!(!dir.path().join("artifacts").exists());
    }

    #[test]
    fn defaults_are_persisted_bundled_and_validated() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let cfg = config(dir.path());

        Deploy::new(context(runner.clone()))
            .with_config(cfg.clone())
            .with_working_dir(dir.path())
            .run()
            .unwrap();

        let persisted = cfg.artifact_path(validation_config::PERSISTED_FILENAME);
        assert_eq!(
            std::fs::read_to_string(&persisted).unwrap(),
            validation_config::DEFAULT_CONFIG
        );

        let lines = runner.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("gatecheck bundle create"));
        assert!(lines[1].starts_with("gatecheck validate"));
        assert!(lines[1].ends_with(&format!("--config {}", persisted.display())));
    }

    #[test]
    fn unreadable_explicit_config_fails_before_any_command() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let mut cfg = config(dir.path());
        cfg.deploy.gatecheck_config_filename = dir.path().join("missing.yml").to_string_lossy().into_owned();

        let err = Deploy::new(context(runner.clone()))
            .with_config(cfg)
            .with_working_dir(dir.path())
            .run()
            .unwrap_err();
        assert_eq!(err.details["causeCode"], "internal.io_error");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn validation_failure_skips_webhooks() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new().failing("gatecheck validate", 1));
        let mut cfg = config(dir.path());
        cfg.deploy.success_webhooks = vec![WebhookTarget {
            url: "http://127.0.0.1:9/never".to_string(),
            authorization_var: String::new(),
        }];

        let err = Deploy::new(context(runner))
            .with_config(cfg)
            .with_working_dir(dir.path())
            .run()
            .unwrap_err();
        assert_eq!(err.details["causeCode"], "command.failed");
    }

    #[test]
    fn dry_run_does_not_contact_webhooks() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let mut cfg = config(dir.path());
        cfg.deploy.success_webhooks = vec![WebhookTarget {
            url: "http://127.0.0.1:9/never".to_string(),
            authorization_var: String::new(),
        }];

        Deploy::new(context(runner.clone()).with_dry_run(true))
            .with_config(cfg)
            .with_working_dir(dir.path())
            .run()
            .unwrap();
        assert!(runner.calls().iter().all(|c| c.dry_run));
    }
}
