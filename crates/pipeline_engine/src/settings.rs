use std::time::Duration;

use pipeline_core::{PipelineVariant, Timing};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid base url {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("jobs_page_limit must be between 1 and 500, got {0}")]
    PageLimit(u32),
}

/// Engine configuration. Durations are given in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub base_url: String,
    pub variant: PipelineVariant,
    #[serde(deserialize_with = "millis")]
    pub poll_interval: Duration,
    #[serde(deserialize_with = "millis")]
    pub debounce: Duration,
    #[serde(deserialize_with = "millis")]
    pub completion_refresh_delay: Duration,
    #[serde(deserialize_with = "millis")]
    pub completion_cooldown: Duration,
    pub jobs_page_limit: u32,
    #[serde(deserialize_with = "millis")]
    pub connect_timeout: Duration,
    #[serde(deserialize_with = "millis")]
    pub request_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let timing = Timing::default();
        Self {
            base_url: "http://localhost:8000".to_string(),
            variant: PipelineVariant::Website,
            poll_interval: Duration::from_secs(10),
            debounce: timing.debounce,
            completion_refresh_delay: timing.completion_refresh_delay,
            completion_cooldown: timing.completion_cooldown,
            jobs_page_limit: 50,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineSettings {
    pub fn timing(&self) -> Timing {
        Timing {
            debounce: self.debounce,
            completion_refresh_delay: self.completion_refresh_delay,
            completion_cooldown: self.completion_cooldown,
        }
    }

    /// Parsed base URL, normalized to end with a slash so joins keep its path.
    pub fn base(&self) -> Result<Url, SettingsError> {
        let mut text = self.base_url.trim().to_string();
        if !text.ends_with('/') {
            text.push('/');
        }
        let url = Url::parse(&text).map_err(|err| SettingsError::BaseUrl {
            url: self.base_url.clone(),
            reason: err.to_string(),
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(SettingsError::BaseUrl {
                url: self.base_url.clone(),
                reason: "expected an http(s) url".to_string(),
            });
        }
        Ok(url)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.base()?;
        for (field, value) in [
            ("poll_interval", self.poll_interval),
            ("debounce", self.debounce),
            ("completion_refresh_delay", self.completion_refresh_delay),
            ("completion_cooldown", self.completion_cooldown),
            ("request_timeout", self.request_timeout),
            ("connect_timeout", self.connect_timeout),
        ] {
            if value.is_zero() {
                return Err(SettingsError::ZeroDuration { field });
            }
        }
        if !(1..=500).contains(&self.jobs_page_limit) {
            return Err(SettingsError::PageLimit(self.jobs_page_limit));
        }
        Ok(())
    }
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EngineSettings::default().validate().unwrap();
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let settings = EngineSettings {
            base_url: "https://crm.example.com/backend".into(),
            ..EngineSettings::default()
        };
        assert_eq!(
            settings.base().unwrap().join("api/jobs").unwrap().as_str(),
            "https://crm.example.com/backend/api/jobs"
        );
    }

    #[test]
    fn rejects_zero_poll_interval_and_bad_urls() {
        let settings = EngineSettings {
            poll_interval: Duration::ZERO,
            ..EngineSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::ZeroDuration { field: "poll_interval" })
        ));

        let settings = EngineSettings {
            base_url: "ftp://example.com".into(),
            ..EngineSettings::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::BaseUrl { .. })));
    }

    #[test]
    fn rejects_zero_completion_timings() {
        let settings = EngineSettings {
            completion_refresh_delay: Duration::ZERO,
            ..EngineSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::ZeroDuration {
                field: "completion_refresh_delay"
            })
        ));

        let settings = EngineSettings {
            completion_cooldown: Duration::ZERO,
            ..EngineSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::ZeroDuration {
                field: "completion_cooldown"
            })
        ));
    }
}
