use thiserror::Error;

pub const ENV_PREFIX: &str = "FNCALL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting, set the {env_var} environment variable")]
    MissingEnvVar { env_var: String },
    #[error("Invalid setting {field}: {message}")]
    Invalid { field: String, message: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Map a dotted settings key to the environment variable that sets it
pub fn to_env_var(field: &str) -> String {
    format!("{}_{}", ENV_PREFIX, field.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("provider.api_key"), "FNCALL_PROVIDER__API_KEY");
        assert_eq!(to_env_var("agent.max_rounds"), "FNCALL_AGENT__MAX_ROUNDS");
        assert_eq!(to_env_var("model"), "FNCALL_MODEL");
    }

    #[test]
    fn test_missing_env_var_message() {
        let err = ConfigError::MissingEnvVar {
            env_var: to_env_var("provider.api_key"),
        };
        assert_eq!(
            err.to_string(),
            "Missing required setting, set the FNCALL_PROVIDER__API_KEY environment variable"
        );
    }
}
