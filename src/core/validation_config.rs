//! Resolution of the gatecheck validation config used by the deploy stage.
//!
//! Sources are tried in order and the first one that yields a document wins.
//! A found document is merged onto the embedded defaults; with no document the
//! defaults are used verbatim.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::merge;
use crate::utils::io;

/// Embedded base document.
pub const DEFAULT_CONFIG: &str = include_str!("gatecheck.defaults.yml");

/// Dotfiles probed in the working directory when no explicit file is configured.
pub const IMPLICIT_CONFIG_FILES: &[&str] = &[".gatecheck.yml", ".gatecheck.yaml"];

/// Filename of the resolved document inside the artifact directory.
pub const PERSISTED_FILENAME: &str = "gatecheck-config.yml";

/// An override document and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub path: PathBuf,
    pub content: String,
}

pub trait ConfigSource {
    fn describe(&self) -> String;

    /// `Ok(None)` passes to the next source.
    fn load(&self) -> Result<Option<Override>>;
}

/// Configured path. Any read failure is fatal.
pub struct ExplicitFile(pub PathBuf);

impl ConfigSource for ExplicitFile {
    fn describe(&self) -> String {
        format!("explicit file {}", self.0.display())
    }

    fn load(&self) -> Result<Option<Override>> {
        let content = io::read_file(&self.0, &format!("read gatecheck config {}", self.0.display()))?;
        Ok(Some(Override {
            path: self.0.clone(),
            content,
        }))
    }
}

/// Optional dotfile. Missing or empty files are skipped; unreadable ones are fatal.
pub struct ImplicitFile(pub PathBuf);

impl ConfigSource for ImplicitFile {
    fn describe(&self) -> String {
        format!("implicit file {}", self.0.display())
    }

    fn load(&self) -> Result<Option<Override>> {
        match fs::read_to_string(&self.0) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(Override {
                path: self.0.clone(),
                content,
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::internal_io(
                e.to_string(),
                Some(format!("read gatecheck config {}", self.0.display())),
            )),
        }
    }
}

/// Sources in priority order: the explicit file alone when configured,
/// otherwise the implicit dotfiles under `dir`.
pub fn sources(explicit: &str, dir: &Path) -> Vec<Box<dyn ConfigSource>> {
    if !explicit.trim().is_empty() {
        let path = PathBuf::from(shellexpand::tilde(explicit).to_string());
        return vec![Box::new(ExplicitFile(path))];
    }

    IMPLICIT_CONFIG_FILES
        .iter()
        .map(|name| Box::new(ImplicitFile(dir.join(name))) as Box<dyn ConfigSource>)
        .collect()
}

/// The document to validate against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub document: String,
    /// `None` when the embedded defaults were used as-is.
    pub source: Option<PathBuf>,
}

pub fn resolve(sources: &[Box<dyn ConfigSource>]) -> Result<Resolved> {
    for source in sources {
        tracing::debug!(source = %source.describe(), "probe gatecheck config");
        if let Some(found) = source.load()? {
            tracing::info!(path = %found.path.display(), "merging gatecheck config onto defaults");
            let document = merge_onto_defaults(&found)?;
            return Ok(Resolved {
                document,
                source: Some(found.path),
            });
        }
    }

    tracing::debug!("no gatecheck config override found, using defaults");
    Ok(Resolved {
        document: DEFAULT_CONFIG.to_string(),
        source: None,
    })
}

fn merge_onto_defaults(found: &Override) -> Result<String> {
    let path = found.path.display().to_string();

    let base: serde_yml::Value = serde_yml::from_str(DEFAULT_CONFIG)
        .map_err(|e| Error::config_invalid_yaml("gatecheck.defaults.yml", e.to_string()))?;
    let overlay: serde_yml::Value = serde_yml::from_str(&found.content)
        .map_err(|e| Error::config_invalid_yaml(path.clone(), e.to_string()))?;

    let merged = match overlay {
        serde_yml::Value::Null => base,
        overlay => merge::merge(base, overlay),
    };

    serde_yml::to_string(&merged).map_err(|e| Error::config_invalid_yaml(path, e.to_string()))
}

/// Writes the resolved document to `<artifact_dir>/gatecheck-config.yml`.
pub fn persist(artifact_dir: &Path, resolved: &Resolved) -> Result<PathBuf> {
    io::ensure_dir(artifact_dir, "create artifact directory")?;
    let path = artifact_dir.join(PERSISTED_FILENAME);
    io::write_file_atomic(&path, &resolved.document, "write gatecheck config")?;
    tracing::debug!(path = %path.display(), "persisted gatecheck config");
    Ok(path)
}
