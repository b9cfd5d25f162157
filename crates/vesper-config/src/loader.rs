//! Configuration loading and environment expansion.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::{ConfigError, ConfigResult, RouterConfig};
use crate::validate::validate;

/// Default configuration directory (`~/.config/vesper` on Linux).
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "vesper", "vesper")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Load, expand, and validate configuration from a TOML file.
///
/// A missing file yields the documented defaults.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed,
/// when validation fails, or when an environment reference cannot be
/// resolved.
pub fn load(path: impl AsRef<Path>) -> ConfigResult<RouterConfig> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(RouterConfig::default());
    }
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Parse, expand, and validate configuration from TOML text.
///
/// # Errors
///
/// Returns an error on parse failure, failed validation, or an
/// unresolvable environment reference.
pub fn load_from_str(contents: &str) -> ConfigResult<RouterConfig> {
    let mut config: RouterConfig =
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

    if let Some(reference) = config.credentials_file.take() {
        config.credentials_file = Some(expand_env(&reference, |var| std::env::var(var).ok())?);
    }

    validate(&config)?;
    Ok(config)
}

/// Expand `${VAR}` and `${VAR:-default}` references in a string.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnv`] when a referenced variable is
/// unset and no default is given.
pub fn expand_env<F>(input: &str, resolver: F) -> ConfigResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_name = String::new();
            let mut default_value = None;

            while let Some(&c) = chars.peek() {
                if c == '}' {
                    chars.next();
                    break;
                }
                if c == ':' && chars.clone().nth(1) == Some('-') {
                    chars.next(); // consume ':'
                    chars.next(); // consume '-'
                    let mut default = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == '}' {
                            break;
                        }
                        chars.next();
                        default.push(c);
                    }
                    default_value = Some(default);
                } else {
                    chars.next();
                    var_name.push(c);
                }
            }

            let value = resolver(&var_name)
                .or(default_value)
                .ok_or_else(|| ConfigError::MissingEnv(var_name.clone()))?;
            result.push_str(&value);
        } else {
            result.push(c);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, RouterConfig::default());
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vesper.toml");
        std::fs::write(
            &path,
            r#"
            prefer_sovereign = false
            max_concurrent_cloud_streams = 5
            "#,
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert!(!config.prefer_sovereign);
        assert_eq!(config.max_concurrent_cloud_streams, 5);
    }

    #[test]
    fn test_parse_error_surfaces() {
        assert!(matches!(
            load_from_str("not = [valid"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_expand_env_basic() {
        let expanded = expand_env("${HOME_DIR}/creds.toml", |var| {
            (var == "HOME_DIR").then(|| "/home/u".to_string())
        })
        .unwrap();
        assert_eq!(expanded, "/home/u/creds.toml");
    }

    #[test]
    fn test_expand_env_default() {
        let expanded = expand_env("${MISSING:-/fallback}", |_| None).unwrap();
        assert_eq!(expanded, "/fallback");
    }

    #[test]
    fn test_expand_env_missing_errors() {
        assert!(matches!(
            expand_env("${MISSING}", |_| None),
            Err(ConfigError::MissingEnv(_))
        ));
    }

    #[test]
    fn test_credentials_reference_expanded() {
        // Uses a default so the test never depends on the environment.
        let config =
            load_from_str("credentials_file = \"${VESPER_CREDS:-/tmp/creds.toml}\"").unwrap();
        assert_eq!(config.credentials_file.as_deref(), Some("/tmp/creds.toml"));
    }
}
