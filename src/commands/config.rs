use clap::{Args, Subcommand, ValueEnum};

use portage::config::{self, PipelineConfig};
use portage::Error;

use super::GlobalArgs;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// List supported environment variables
    Vars,
    /// Display the effective configuration (defaults + file + environment)
    Show {
        /// Portage config file in json, yaml, or toml
        #[arg(short = 'f', long, value_name = "FILE")]
        config: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,

        /// Show only built-in defaults (ignore config files and environment)
        #[arg(long)]
        builtin: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Yaml,
    Toml,
}

pub fn run_text(args: ConfigArgs, _global: &GlobalArgs) -> portage::Result<(String, i32)> {
    match args.command {
        ConfigCommand::Vars => Ok((config::vars_markdown_table(), 0)),
        ConfigCommand::Show {
            config: explicit,
            format,
            builtin,
        } => {
            let config = if builtin {
                PipelineConfig::default()
            } else {
                let dir = super::working_dir()?;
                config::load(explicit.as_deref(), &dir, super::process_env)?.0
            };
            Ok((encode(&config, format)?, 0))
        }
    }
}

fn encode(config: &PipelineConfig, format: Format) -> portage::Result<String> {
    let mut rendered = match format {
        Format::Json => serde_json::to_string_pretty(config)
            .map_err(|e| Error::internal_json(e.to_string(), Some("encode config".to_string())))?,
        Format::Yaml => serde_yml::to_string(config)
            .map_err(|e| Error::internal_unexpected(format!("Failed to encode config as YAML: {}", e)))?,
        Format::Toml => toml::to_string_pretty(config)
            .map_err(|e| Error::internal_unexpected(format!("Failed to encode config as TOML: {}", e)))?,
    };
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn every_format_round_trips_through_the_loader() {
        let mut config = PipelineConfig::default();
        config.image_tag = "registry.example.com/app:v2".to_string();
        config.deploy.success_webhooks = vec![config::WebhookTarget {
            url: "https://hooks.example.com/deploy".to_string(),
            authorization_var: "DEPLOY_TOKEN".to_string(),
        }];

        for (format, name) in [
            (Format::Json, "c.json"),
            (Format::Yaml, "c.yml"),
            (Format::Toml, "c.toml"),
        ] {
            let rendered = encode(&config, format).unwrap();
            let parsed = config::from_str(&rendered, Path::new(name)).unwrap();
            assert_eq!(parsed, config, "format {:?}", format);
        }
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let rendered = encode(&PipelineConfig::default(), Format::Json).unwrap();
        assert!(rendered.contains("\"gatecheckBundleFilename\""));
        assert!(rendered.contains("\"semgrepRules\": \"p/default\""));
    }
}
