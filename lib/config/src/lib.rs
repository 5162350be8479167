pub mod authorization;
mod env_overrides;
pub mod log;

use std::path::Path;

use config::{builder::DefaultState, Config, ConfigBuilder, File, FileFormat};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    authorization::AuthorizationConfig,
    env_overrides::{EnvVarOverrides, EnvVarOverridesError},
    log::LoggingConfig,
};

/// Everything the engine and its logging need, loaded once at startup.
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScopeGuardConfig {
    #[serde(default)]
    pub log: LoggingConfig,

    /// Roles, scope targets and denial behaviour of the authorization engine.
    #[serde(default)]
    pub authorization: AuthorizationConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ScopeGuardConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error(transparent)]
    Override(#[from] EnvVarOverridesError),
    #[error("Failed to read environment variables: {0}")]
    Environment(#[from] envconfig::Error),
}

/// Looked up in the working directory when no path is given. All are optional.
static DEFAULT_FILE_NAMES: &[&str] = &[
    "scope-guard.config.yaml",
    "scope-guard.config.yml",
    "scope-guard.config.json",
    "scope-guard.config.json5",
];

/// Loads the configuration from `path`, or from the default file names, then
/// applies the environment overrides on top.
pub fn load_config(path: Option<String>) -> Result<ScopeGuardConfig, ScopeGuardConfigError> {
    let overrides = EnvVarOverrides::init_from_env()?;
    let builder = with_file_sources(Config::builder(), path.as_deref().map(Path::new));

    Ok(overrides
        .apply_overrides(builder)?
        .build()?
        .try_deserialize::<ScopeGuardConfig>()?)
}

fn with_file_sources(
    builder: ConfigBuilder<DefaultState>,
    path: Option<&Path>,
) -> ConfigBuilder<DefaultState> {
    match path {
        Some(path) => builder.add_source(File::from(path).required(true)),
        None => DEFAULT_FILE_NAMES.iter().fold(builder, |builder, name| {
            builder.add_source(File::with_name(name).required(false))
        }),
    }
}

/// Parses inline YAML, without environment overrides.
pub fn parse_yaml_config(raw: String) -> Result<ScopeGuardConfig, ScopeGuardConfigError> {
    Ok(Config::builder()
        .add_source(File::from_str(&raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<ScopeGuardConfig>()?)
}
