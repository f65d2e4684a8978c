use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use pipeline_engine::EngineSettings;
use pipeline_logging::{pipeline_info, pipeline_warn};
use serde::Deserialize;

use crate::cli::{Cli, LogTarget};

/// Contents of the RON settings file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSettings {
    pub engine: EngineSettings,
    pub log: LogTarget,
    pub verbose: bool,
}

impl AppSettings {
    /// Reads `path`, falling back to defaults when the file is missing.
    /// A file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                pipeline_info!("No settings at {:?}; using defaults", path);
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading settings from {}", path.display()))
            }
        };

        let settings: Self = ron::from_str(&content)
            .with_context(|| format!("parsing settings from {}", path.display()))?;
        Ok(settings)
    }

    /// Applies command-line overrides and checks the result.
    pub fn resolve(mut self, cli: &Cli) -> Result<Self> {
        if let Some(base_url) = &cli.base_url {
            self.engine.base_url = base_url.clone();
        }
        if let Some(variant) = cli.variant {
            self.engine.variant = variant.into();
        }
        if let Some(log) = cli.log {
            self.log = log;
        }
        self.verbose |= cli.verbose;

        if self.engine.poll_interval < self.engine.debounce {
            pipeline_warn!(
                "poll_interval {:?} is shorter than the debounce window {:?}",
                self.engine.poll_interval,
                self.engine.debounce
            );
        }
        self.engine.validate().context("invalid engine settings")?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use pipeline_core::PipelineVariant;

    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn reads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.ron");
        fs::write(
            &path,
            r#"(
                engine: (
                    base_url: "https://crm.example.com",
                    variant: social,
                    poll_interval: 5000,
                ),
                log: both,
            )"#,
        )
        .unwrap();

        let settings = AppSettings::load(&path).unwrap();
        assert_eq!(settings.engine.base_url, "https://crm.example.com");
        assert_eq!(settings.engine.variant, PipelineVariant::Social);
        assert_eq!(settings.engine.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.engine.debounce, Duration::from_millis(300));
        assert_eq!(settings.log, LogTarget::Both);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.ron");
        fs::write(&path, "(engine: (polling: 5))").unwrap();

        let err = AppSettings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing settings"));
    }

    #[test]
    fn command_line_overrides_file() {
        let cli = Cli::parse_from([
            "pipeline-sync",
            "--base-url",
            "http://10.0.0.5:9000",
            "--variant",
            "social",
            "-v",
        ]);
        let settings = AppSettings::default().resolve(&cli).unwrap();
        assert_eq!(settings.engine.base_url, "http://10.0.0.5:9000");
        assert_eq!(settings.engine.variant, PipelineVariant::Social);
        assert!(settings.verbose);

        let cli = Cli::parse_from(["pipeline-sync", "--base-url", "not a url"]);
        assert!(AppSettings::default().resolve(&cli).is_err());
    }
}
