//! Pipeline configuration: the value every stage is built from.
//!
//! Layering, lowest to highest precedence:
//! 1. Built-in defaults (`PipelineConfig::default()`).
//! 2. A config file: explicit path, or `.portage.yml` / `.portage.yaml` in the working directory.
//! 3. `PORTAGE_*` environment variables listed in [`CONFIG_VARS`].
//! 4. CLI flags, applied by the caller on the returned value.

use crate::error::{Error, Result};
use crate::utils::io;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const IMPLICIT_CONFIG_FILES: &[&str] = &[".portage.yml", ".portage.yaml"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub version: String,
    pub image_tag: String,
    pub artifact_dir: String,
    pub gatecheck_bundle_filename: String,
    pub image_build: ImageBuildConfig,
    pub image_scan: ImageScanConfig,
    pub code_scan: CodeScanConfig,
    pub image_publish: ImagePublishConfig,
    pub deploy: DeployConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            image_tag: "my-app:latest".to_string(),
            artifact_dir: "artifacts".to_string(),
            gatecheck_bundle_filename: "gatecheck-bundle.tar.gz".to_string(),
            image_build: ImageBuildConfig::default(),
            image_scan: ImageScanConfig::default(),
            code_scan: CodeScanConfig::default(),
            image_publish: ImagePublishConfig::default(),
            deploy: DeployConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn bundle_path(&self) -> PathBuf {
        Path::new(&self.artifact_dir).join(&self.gatecheck_bundle_filename)
    }

    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        Path::new(&self.artifact_dir).join(filename)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageBuildConfig {
    pub enabled: bool,
    pub build_dir: String,
    pub dockerfile: String,
    pub platform: String,
    pub target: String,
    pub cache_to: String,
    pub cache_from: String,
    /// Only honored by podman.
    pub squash_layers: bool,
    /// `KEY=value` build arguments.
    pub args: Vec<String>,
}

impl Default for ImageBuildConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            build_dir: ".".to_string(),
            dockerfile: "Dockerfile".to_string(),
            platform: String::new(),
            target: String::new(),
            cache_to: String::new(),
            cache_from: String::new(),
            squash_layers: false,
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageScanConfig {
    pub enabled: bool,
    pub syft_filename: String,
    pub grype_config_filename: String,
    pub grype_filename: String,
    pub clamav_filename: String,
    pub freshclam_disabled: bool,
}

impl Default for ImageScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            syft_filename: "syft-sbom-report.json".to_string(),
            grype_config_filename: String::new(),
            grype_filename: "grype-vulnerability-report-full.json".to_string(),
            clamav_filename: "clamav-virus-report.txt".to_string(),
            freshclam_disabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeScanConfig {
    pub enabled: bool,
    pub gitleaks_filename: String,
    pub gitleaks_src_dir: String,
    pub semgrep_filename: String,
    pub semgrep_rules: String,
    pub semgrep_experimental: bool,
    pub semgrep_src_dir: String,
    /// Snyk runs only when this is set.
    pub snyk_filename: String,
    pub snyk_src_dir: String,
    pub coverage_file: String,
}

impl Default for CodeScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gitleaks_filename: "gitleaks-secrets-report.json".to_string(),
            gitleaks_src_dir: ".".to_string(),
            semgrep_filename: "semgrep-sast-report.json".to_string(),
            semgrep_rules: "p/default".to_string(),
            semgrep_experimental: false,
            semgrep_src_dir: ".".to_string(),
            snyk_filename: String::new(),
            snyk_src_dir: ".".to_string(),
            coverage_file: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImagePublishConfig {
    pub enabled: bool,
    /// Registry tag for pushing the bundle with oras. Empty skips the bundle push.
    pub bundle_tag: String,
}

impl Default for ImagePublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bundle_tag: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployConfig {
    pub enabled: bool,
    pub gatecheck_config_filename: String,
    pub success_webhooks: Vec<WebhookTarget>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gatecheck_config_filename: String::new(),
            success_webhooks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTarget {
    pub url: String,
    /// Name of the environment variable holding the `Authorization` header value.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authorization_var: String,
}

// ============================================================================
// Environment variables
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    String,
    Bool,
    /// Comma separated.
    List,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfigVar {
    /// JSON pointer into the serialized `PipelineConfig`.
    pub pointer: &'static str,
    pub env: &'static str,
    pub kind: VarKind,
    pub description: &'static str,
}

macro_rules! var {
    ($pointer:expr, $env:expr, $kind:ident, $description:expr) => {
        ConfigVar {
            pointer: $pointer,
            env: $env,
            kind: VarKind::$kind,
            description: $description,
        }
    };
}

pub const CONFIG_ENV: &str = "PORTAGE_CONFIG";

pub const CONFIG_VARS: &[ConfigVar] = &[
    var!("/imageTag", "PORTAGE_IMAGE_TAG", String, "The full image tag for the target container image"),
    var!("/artifactDir", "PORTAGE_ARTIFACT_DIR", String, "The target directory for all generated artifacts"),
    var!("/gatecheckBundleFilename", "PORTAGE_GATECHECK_BUNDLE_FILENAME", String, "The filename for the gatecheck bundle, a validatable archive of security artifacts"),
    var!("/imageBuild/enabled", "PORTAGE_IMAGE_BUILD_ENABLED", Bool, "Enable/Disable the image build pipeline"),
    var!("/imageBuild/buildDir", "PORTAGE_IMAGE_BUILD_DIR", String, "The build directory to use during an image build"),
    var!("/imageBuild/dockerfile", "PORTAGE_IMAGE_BUILD_DOCKERFILE", String, "The Dockerfile/Containerfile to use during an image build"),
    var!("/imageBuild/platform", "PORTAGE_IMAGE_BUILD_PLATFORM", String, "The target platform for build (e.g., linux/amd64)"),
    var!("/imageBuild/target", "PORTAGE_IMAGE_BUILD_TARGET", String, "The target build stage to build"),
    var!("/imageBuild/cacheTo", "PORTAGE_IMAGE_BUILD_CACHE_TO", String, "Cache export destinations (e.g., \"user/app:cache\", \"type=local,src=path/to/dir\")"),
    var!("/imageBuild/cacheFrom", "PORTAGE_IMAGE_BUILD_CACHE_FROM", String, "External cache sources (e.g., \"user/app:cache\", \"type=local,src=path/to/dir\")"),
    var!("/imageBuild/squashLayers", "PORTAGE_IMAGE_BUILD_SQUASH_LAYERS", Bool, "Squash image layers, only supported with podman"),
    var!("/imageBuild/args", "PORTAGE_IMAGE_BUILD_ARGS", List, "Comma separated list of build time variables"),
    var!("/imageScan/enabled", "PORTAGE_IMAGE_SCAN_ENABLED", Bool, "Enable/Disable the image scan pipeline"),
    var!("/imageScan/syftFilename", "PORTAGE_IMAGE_SCAN_SYFT_FILENAME", String, "The filename for the syft SBOM report, must contain 'syft'"),
    var!("/imageScan/grypeConfigFilename", "PORTAGE_IMAGE_SCAN_GRYPE_CONFIG_FILENAME", String, "The config filename for the grype vulnerability scan"),
    var!("/imageScan/grypeFilename", "PORTAGE_IMAGE_SCAN_GRYPE_FILENAME", String, "The filename for the grype vulnerability report, must contain 'grype'"),
    var!("/imageScan/clamavFilename", "PORTAGE_IMAGE_SCAN_CLAMAV_FILENAME", String, "The filename for the clamscan virus report, must contain 'clamav'"),
    var!("/imageScan/freshclamDisabled", "PORTAGE_IMAGE_SCAN_FRESHCLAM_DISABLED", Bool, "Skip the freshclam virus definition update"),
    var!("/codeScan/enabled", "PORTAGE_CODE_SCAN_ENABLED", Bool, "Enable/Disable the code scan pipeline"),
    var!("/codeScan/gitleaksFilename", "PORTAGE_CODE_SCAN_GITLEAKS_FILENAME", String, "The filename for the gitleaks secret report, must contain 'gitleaks'"),
    var!("/codeScan/gitleaksSrcDir", "PORTAGE_CODE_SCAN_GITLEAKS_SRC_DIR", String, "The target directory for the gitleaks scan"),
    var!("/codeScan/semgrepFilename", "PORTAGE_CODE_SCAN_SEMGREP_FILENAME", String, "The filename for the semgrep SAST report, must contain 'semgrep'"),
    var!("/codeScan/semgrepRules", "PORTAGE_CODE_SCAN_SEMGREP_RULES", String, "Semgrep ruleset manual override"),
    var!("/codeScan/semgrepExperimental", "PORTAGE_CODE_SCAN_SEMGREP_EXPERIMENTAL", Bool, "Enable the use of the semgrep experimental CLI"),
    var!("/codeScan/semgrepSrcDir", "PORTAGE_CODE_SCAN_SEMGREP_SRC_DIR", String, "The target directory for the semgrep scan"),
    var!("/codeScan/snykFilename", "PORTAGE_CODE_SCAN_SNYK_FILENAME", String, "The filename for the snyk code SARIF report, enables the snyk scan"),
    var!("/codeScan/snykSrcDir", "PORTAGE_CODE_SCAN_SNYK_SRC_DIR", String, "The target directory for the snyk code scan"),
    var!("/codeScan/coverageFile", "PORTAGE_CODE_SCAN_COVERAGE_FILE", String, "An externally generated code coverage file to validate"),
    var!("/imagePublish/enabled", "PORTAGE_IMAGE_PUBLISH_ENABLED", Bool, "Enable/Disable the image publish pipeline"),
    var!("/imagePublish/bundleTag", "PORTAGE_IMAGE_PUBLISH_BUNDLE_TAG", String, "The full image tag for the target gatecheck bundle image blob"),
    var!("/deploy/enabled", "PORTAGE_DEPLOY_ENABLED", Bool, "Enable/Disable the deploy pipeline"),
    var!("/deploy/gatecheckConfigFilename", "PORTAGE_DEPLOY_GATECHECK_CONFIG_FILENAME", String, "The filename for the gatecheck config"),
];

fn parse_env_value(var: &ConfigVar, raw: &str) -> Result<Value> {
    match var.kind {
        VarKind::String => Ok(Value::String(raw.to_string())),
        VarKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
            "0" | "f" | "false" | "no" | "off" | "" => Ok(Value::Bool(false)),
            _ => Err(Error::config_invalid_value(
                var.env,
                Some(raw.to_string()),
                "Expected a boolean (true/false/1/0)",
            )),
        },
        VarKind::List => Ok(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        )),
    }
}

/// Applies every set variable in [`CONFIG_VARS`] to `config`.
///
/// `lookup` stands in for `std::env::var` so callers and tests control the environment.
pub fn apply_env<F>(config: PipelineConfig, lookup: F) -> Result<PipelineConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut root = serde_json::to_value(&config)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize config".to_string())))?;

    let mut applied = 0;
    for var in CONFIG_VARS {
        let Some(raw) = lookup(var.env) else {
            continue;
        };
        let value = parse_env_value(var, &raw)?;
        set_json_pointer(&mut root, var.pointer, value)?;
        applied += 1;
    }

    if applied == 0 {
        return Ok(config);
    }
    tracing::debug!(applied, "applied environment overrides");

    serde_json::from_value(root)
        .map_err(|e| Error::internal_json(e.to_string(), Some("apply environment overrides".to_string())))
}

// ============================================================================
// Config files
// ============================================================================

/// Parses a config document, choosing the format from the file extension (YAML by default).
pub fn from_str(content: &str, path: &Path) -> Result<PipelineConfig> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let display = path.display().to_string();

    match extension.as_deref() {
        Some("json") => serde_json::from_str(content)
            .map_err(|e| Error::internal_json(e.to_string(), Some(format!("parse {}", display)))),
        Some("toml") => toml::from_str(content)
            .map_err(|e| Error::config_invalid_value(display, None, e.to_string())),
        _ => {
            if content.trim().is_empty() {
                return Ok(PipelineConfig::default());
            }
            serde_yml::from_str(content).map_err(|e| Error::config_invalid_yaml(display, e.to_string()))
        }
    }
}

/// Finds the config file to use. An explicit path must exist; the implicit files may not.
pub fn resolve_path(explicit: Option<&str>, dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
        let expanded = PathBuf::from(shellexpand::tilde(path).to_string());
        if !expanded.is_file() {
            return Err(Error::config_missing_key(
                "config",
                Some(expanded.display().to_string()),
            )
            .with_hint("Check the --config path or PORTAGE_CONFIG"));
        }
        return Ok(Some(expanded));
    }

    Ok(IMPLICIT_CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file()))
}

/// Loads defaults, the config file (if any) and environment overrides.
pub fn load<F>(explicit: Option<&str>, dir: &Path, lookup: F) -> Result<(PipelineConfig, Option<PathBuf>)>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = explicit.map(str::to_string).or_else(|| lookup(CONFIG_ENV));
    let path = resolve_path(explicit.as_deref(), dir)?;

    let config = match &path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "using config file");
            let content = io::read_file(path, &format!("read {}", path.display()))?;
            from_str(&content, path)?
        }
        None => {
            tracing::debug!("no config file found, using defaults");
            PipelineConfig::default()
        }
    };

    Ok((apply_env(config, lookup)?, path))
}

// ============================================================================
// Display
// ============================================================================

fn default_for(pointer: &str, defaults: &Value) -> String {
    match defaults.pointer(pointer) {
        Some(Value::String(s)) if s.is_empty() => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "1".to_string(),
        Some(Value::Bool(false)) => "0".to_string(),
        Some(Value::Array(items)) if items.is_empty() => "-".to_string(),
        Some(other) => other.to_string(),
        None => "-".to_string(),
    }
}

/// Markdown table of every supported environment variable.
pub fn vars_markdown_table() -> String {
    let defaults = serde_json::to_value(PipelineConfig::default()).unwrap_or(Value::Null);

    let mut rows: Vec<[String; 4]> = vec![[
        "Config Key".to_string(),
        "Environment Variable".to_string(),
        "Default Value".to_string(),
        "Description".to_string(),
    ]];
    rows.push([
        "config".to_string(),
        CONFIG_ENV.to_string(),
        IMPLICIT_CONFIG_FILES[0].to_string(),
        "The path to a config file to use when executing portage".to_string(),
    ]);
    for var in CONFIG_VARS {
        rows.push([
            var.pointer.trim_start_matches('/').replace('/', "."),
            var.env.to_string(),
            default_for(var.pointer, &defaults),
            var.description.to_string(),
        ]);
    }

    let mut widths = [0usize; 4];
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.len());
        }
    }

    let render = |cells: &[String; 4]| {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(idx, cell)| format!("{:<width$}", cell, width = widths[idx]))
            .collect();
        format!("| {} |\n", padded.join(" | "))
    };

    let mut out = render(&rows[0]);
    let separator: [String; 4] = std::array::from_fn(|idx| "-".repeat(widths[idx]));
    out.push_str(&render(&separator));
    for row in &rows[1..] {
        out.push_str(&render(row));
    }
    out
}

// ============================================================================
// JSON Pointer Operations (internal)
// ============================================================================

pub(crate) fn set_json_pointer(root: &mut Value, pointer: &str, new_value: Value) -> Result<()> {
    if pointer.is_empty() {
        *root = new_value;
        return Ok(());
    }
    if !pointer.starts_with('/') || pointer == "/" {
        return Err(Error::validation_invalid_argument(
            "pointer",
            format!("Invalid JSON pointer: {}", pointer),
            None,
            None,
        ));
    }

    let tokens: Vec<String> = pointer.split('/').skip(1).map(unescape_token).collect();
    let Some((last, parents)) = tokens.split_last() else {
        *root = new_value;
        return Ok(());
    };

    let mut current = root;
    for token in parents {
        if current.is_null() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(token.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new())),
            other => {
                return Err(Error::config_invalid_value(
                    pointer,
                    Some(value_type_name(other).to_string()),
                    "Expected object at pointer",
                ))
            }
        };
    }

    match current {
        Value::Object(map) => {
            map.insert(last.clone(), new_value);
            Ok(())
        }
        other => Err(Error::config_invalid_value(
            pointer,
            Some(value_type_name(other).to_string()),
            "Cannot set child on non-object",
        )),
    }
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.image_tag, "my-app:latest");
        assert_eq!(config.artifact_dir, "artifacts");
        assert_eq!(config.bundle_path(), PathBuf::from("artifacts/gatecheck-bundle.tar.gz"));
        assert!(config.image_build.enabled);
        assert_eq!(config.image_build.dockerfile, "Dockerfile");
        assert_eq!(config.code_scan.semgrep_rules, "p/default");
        assert_eq!(config.image_scan.grype_filename, "grype-vulnerability-report-full.json");
        assert!(config.deploy.enabled);
        assert!(config.deploy.gatecheck_config_filename.is_empty());
    }

    #[test]
    fn every_var_pointer_resolves_against_defaults() {
        let defaults = serde_json::to_value(PipelineConfig::default()).unwrap();
        for var in CONFIG_VARS {
            assert!(defaults.pointer(var.pointer).is_some(), "{}", var.pointer);
        }
    }

    #[test]
    fn yaml_file_fills_missing_fields_from_defaults() {
        let yaml = "imageTag: registry.example.com/app:1.2\ncodeScan:\n  semgrepRules: p/ci\ndeploy:\n  successWebhooks:\n    - url: https://hooks.example.com/a\n      authorizationVar: HOOK_TOKEN\n";
        let config = from_str(yaml, Path::new(".portage.yml")).unwrap();
        assert_eq!(config.image_tag, "registry.example.com/app:1.2");
        assert_eq!(config.code_scan.semgrep_rules, "p/ci");
        assert_eq!(config.code_scan.semgrep_filename, "semgrep-sast-report.json");
        assert_eq!(config.deploy.success_webhooks.len(), 1);
        assert_eq!(config.deploy.success_webhooks[0].authorization_var, "HOOK_TOKEN");
    }

    #[test]
    fn json_and_toml_files_are_supported() {
        let json = from_str(r#"{"artifactDir": "out"}"#, Path::new("portage.json")).unwrap();
        assert_eq!(json.artifact_dir, "out");

        let toml = from_str("artifactDir = \"reports\"\n[imageBuild]\nenabled = false\n", Path::new("portage.toml")).unwrap();
        assert_eq!(toml.artifact_dir, "reports");
        assert!(!toml.image_build.enabled);
    }

    #[test]
    fn invalid_yaml_is_config_error() {
        let err = from_str("imageTag: [unclosed", Path::new("bad.yml")).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_yaml");
    }

    #[test]
    fn env_overrides_apply_by_kind() {
        let config = apply_env(
            PipelineConfig::default(),
            env(&[
                ("PORTAGE_IMAGE_TAG", "alpine:3"),
                ("PORTAGE_IMAGE_SCAN_ENABLED", "0"),
                ("PORTAGE_IMAGE_BUILD_ARGS", "A=1, B=2"),
            ]),
        )
        .unwrap();
        assert_eq!(config.image_tag, "alpine:3");
        assert!(!config.image_scan.enabled);
        assert_eq!(config.image_build.args, vec!["A=1", "B=2"]);
    }

    #[test]
    fn invalid_bool_env_is_rejected() {
        let err = apply_env(PipelineConfig::default(), env(&[("PORTAGE_DEPLOY_ENABLED", "maybe")]))
            .unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
    }

    #[test]
    fn load_prefers_explicit_then_implicit_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".portage.yaml"), "artifactDir: implicit\n").unwrap();

        let (config, path) = load(None, dir.path(), env(&[])).unwrap();
        assert_eq!(config.artifact_dir, "implicit");
        assert_eq!(path, Some(dir.path().join(".portage.yaml")));

        let explicit = dir.path().join("custom.json");
        std::fs::write(&explicit, r#"{"artifactDir": "explicit"}"#).unwrap();
        let (config, _) = load(Some(explicit.to_str().unwrap()), dir.path(), env(&[])).unwrap();
        assert_eq!(config.artifact_dir, "explicit");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some("/nonexistent/portage.yml"), dir.path(), env(&[])).unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
    }

    #[test]
    fn no_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, path) = load(None, dir.path(), env(&[])).unwrap();
        assert!(path.is_none());
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn set_json_pointer_creates_missing_objects() {
        let mut root = serde_json::json!({});
        set_json_pointer(&mut root, "/a/b", serde_json::json!(1)).unwrap();
        assert_eq!(root, serde_json::json!({"a": {"b": 1}}));
    }

    #[test]
    fn vars_table_lists_every_variable() {
        let table = vars_markdown_table();
        assert!(table.starts_with("| Config Key"));
        for var in CONFIG_VARS {
            assert!(table.contains(var.env));
        }
        assert!(table.contains("p/default"));
    }
}
