use config::{builder::BuilderState, ConfigBuilder, ConfigError};
use envconfig::Envconfig;
use tracing::debug;

use crate::{
    authorization::UnauthorizedMode,
    log::{LogFormat, LogLevel},
};

/// Environment variables that take precedence over the configuration file.
#[derive(Envconfig, Default)]
pub struct EnvVarOverrides {
    #[envconfig(from = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,
    #[envconfig(from = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    #[envconfig(from = "LOG_FILTER")]
    pub log_filter: Option<String>,
    #[envconfig(from = "LOG_SPAN_EVENTS")]
    pub log_span_events: Option<bool>,

    #[envconfig(from = "AUTHZ_DEFAULT_RULE")]
    pub default_rule: Option<String>,
    #[envconfig(from = "AUTHZ_UNAUTHORIZED_MODE")]
    pub unauthorized_mode: Option<UnauthorizedMode>,
}

#[derive(Debug, thiserror::Error)]
#[error("Environment override for '{key}' was rejected: {source}")]
pub struct EnvVarOverridesError {
    key: &'static str,
    #[source]
    source: ConfigError,
}

impl EnvVarOverrides {
    /// The configuration keys to override, in a stable order.
    fn entries(self) -> Vec<(&'static str, String)> {
        [
            ("log.level", self.log_level.map(|level| level.as_str().to_string())),
            ("log.format", self.log_format.map(|format| format.as_str().to_string())),
            ("log.filter", self.log_filter),
            ("log.span_events", self.log_span_events.map(|on| on.to_string())),
            ("authorization.default_rule", self.default_rule),
            (
                "authorization.unauthorized.mode",
                self.unauthorized_mode.map(|mode| mode.as_str().to_string()),
            ),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect()
    }

    pub fn apply_overrides<T: BuilderState>(
        self,
        config: ConfigBuilder<T>,
    ) -> Result<ConfigBuilder<T>, EnvVarOverridesError> {
        self.entries()
            .into_iter()
            .try_fold(config, |config, (key, value)| {
                debug!(key, value = value.as_str(), "configuration override from environment");
                config
                    .set_override(key, value)
                    .map_err(|source| EnvVarOverridesError { key, source })
            })
    }
}
