use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use fncall::agent::{AgentConfig, DEFAULT_MAX_ROUNDS};
use fncall::providers::base::ModelOptions;
use fncall::providers::configs::{OpenAiProviderConfig, OPENAI_HOST};
use serde::Deserialize;

use crate::error::{to_env_var, ConfigError, ENV_PREFIX};

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            model: default_model(),
            temperature: None,
            max_tokens: None,
            description: None,
        }
    }
}

impl AgentSettings {
    pub fn into_config(self) -> Result<AgentConfig, ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::Invalid {
                field: "agent.max_rounds".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let model = ModelOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..ModelOptions::new(self.model)
        };
        let mut config = AgentConfig::new(model).with_max_rounds(self.max_rounds);
        config.description = self.description;
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ProviderSettings {
    pub fn into_config(self) -> Result<OpenAiProviderConfig, ConfigError> {
        let api_key = self
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar {
                env_var: to_env_var("provider.api_key"),
            })?;
        Ok(OpenAiProviderConfig::new(api_key).with_host(self.host))
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub agent: AgentSettings,
    pub provider: ProviderSettings,
}

impl Settings {
    /// Load defaults, then the optional TOML file, then `FNCALL_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("agent.max_rounds", default_max_rounds() as i64)?
            .set_default("agent.model", default_model())?
            .set_default("provider.host", default_openai_host())?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);

            // "missing field `name`" only names the leaf, so fall back to the key itself
            let error_str = err.to_string();
            if let Some(field) = error_str.strip_prefix("missing field `") {
                let field = field.split('`').next().unwrap_or_default();
                ConfigError::MissingEnvVar {
                    env_var: to_env_var(field),
                }
            } else if let config::ConfigError::NotFound(field) = &err {
                ConfigError::MissingEnvVar {
                    env_var: to_env_var(field),
                }
            } else {
                ConfigError::Other(err)
            }
        })
    }
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}
