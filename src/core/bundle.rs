//! Append-only artifact bundle managed through `gatecheck bundle`.
//!
//! The presence check and the create/add call are not atomic; the bundle is
//! only ever touched by one sequential pipeline run.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::tools;
use crate::utils::io;

pub const CONFIG_SNAPSHOT_FILENAME: &str = "portage-config.json";

/// Adds `file` to the bundle, creating the bundle when it does not exist yet.
pub fn add_file(ctx: &Context, bundle: &Path, file: &Path) -> Result<()> {
    tracing::debug!(
        bundle = %bundle.display(),
        file = %file.display(),
        dry_run = ctx.dry_run,
        "attempting to add file to bundle"
    );

    let opts = ctx.quiet_options();

    match fs::metadata(bundle) {
        Ok(_) => {
            tracing::debug!("bundle exists, adding file to existing bundle");
            ctx.run(&tools::gatecheck_bundle_add(bundle, file), opts)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("bundle does not exist, creating new bundle");
            ctx.run(&tools::gatecheck_bundle_create(bundle, file), opts)
        }
        Err(e) => Err(Error::internal_io(
            e.to_string(),
            Some(format!("stat bundle {}", bundle.display())),
        )),
    }
}

/// Records the effective pipeline configuration in the bundle as JSON.
pub fn init_with_config(ctx: &Context, config: &PipelineConfig) -> Result<()> {
    let snapshot = std::env::temp_dir().join(CONFIG_SNAPSHOT_FILENAME);
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| Error::internal_json(e.to_string(), Some("encode config snapshot".to_string())))?;

    io::ensure_dir(Path::new(&config.artifact_dir), "create artifact directory")?;
    io::write_file(&snapshot, &content, "write config snapshot")?;

    let bundle = config.bundle_path();
    let result = add_file(ctx, &bundle, &snapshot);

    if let Err(err) = io::remove_file_if_exists(&snapshot, "remove config snapshot") {
        tracing::warn!(error = %err, "failed to remove config snapshot");
    }
    result
}
