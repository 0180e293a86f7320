//! Environment variable interpolation for configuration

use super::error::ConfigError;
use regex::Regex;
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Interpolate `${VAR}` references in a configuration string
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut missing_vars = Vec::new();

    let result = ENV_VAR_PATTERN.replace_all(content, |cap: &regex::Captures<'_>| {
        match env::var(&cap[1]) {
            Ok(value) => value,
            Err(_) => {
                missing_vars.push(cap[1].to_string());
                cap[0].to_string()
            }
        }
    });

    // Report the first missing variable
    if let Some(var) = missing_vars.into_iter().next() {
        return Err(ConfigError::MissingEnvVar { var });
    }

    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_vars() {
        env::set_var("LOCALCHAT_TEST_MODEL", "Qwen/Qwen2.5-Coder-3B-Instruct");

        let content = "model_id: ${LOCALCHAT_TEST_MODEL}";
        let result = interpolate_env_vars(content).unwrap();
        assert_eq!(result, "model_id: Qwen/Qwen2.5-Coder-3B-Instruct");

        env::remove_var("LOCALCHAT_TEST_MODEL");
    }

    #[test]
    fn test_missing_env_var() {
        let content = "cache_dir: ${LOCALCHAT_MISSING_VAR}";
        let result = interpolate_env_vars(content);

        assert!(result.is_err());
        if let Err(ConfigError::MissingEnvVar { var }) = result {
            assert_eq!(var, "LOCALCHAT_MISSING_VAR");
        } else {
            panic!("Expected MissingEnvVar error");
        }
    }

    #[test]
    fn test_text_without_references_is_unchanged() {
        let content = "model_id: local/path\ntemperature: 0.2";
        assert_eq!(interpolate_env_vars(content).unwrap(), content);
    }
}
