use std::path::PathBuf;

use classroom_core::config::{Settings, DEFAULT_API_BASE_URL, DEFAULT_AUTH_URL, DEFAULT_TOKEN_URL};
use config::{Config, Environment, File};
use directories::ProjectDirs;

pub const ENV_PREFIX: &str = "GC_CLI";

/// Per-user configuration directory, also home of the saved credential
pub fn config_dir() -> PathBuf {
    ProjectDirs::from("com", "gc-cli", "gc-cli")
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("config"))
}

/// Credential location used when `auth.token_file` is unset
pub fn default_token_path() -> PathBuf {
    config_dir().join("token.json")
}

pub fn get_configuration_with_paths(
    current_dir_path: Option<PathBuf>,
    system_config_dir_path: Option<PathBuf>,
) -> Result<Settings, config::ConfigError> {
    let config_directory = current_dir_path.unwrap_or_else(|| {
        std::env::current_dir()
            .map(|p| p.join("config"))
            .unwrap_or_else(|_| PathBuf::from("config"))
    });

    let system_config_dir = system_config_dir_path.unwrap_or_else(config_dir);

    let settings = Config::builder()
        .set_default("auth.auth_url", DEFAULT_AUTH_URL)?
        .set_default("auth.token_url", DEFAULT_TOKEN_URL)?
        .set_default("auth.callback_timeout_secs", 60)?
        .set_default("api.base_url", DEFAULT_API_BASE_URL)?
        .set_default("api.retries", 3)?
        .set_default("api.initial_backoff_ms", 1_000)?
        .set_default("api.max_backoff_ms", 32_000)?
        .set_default("api.page_size", 100)?
        .set_default("api.request_timeout_secs", 30)?
        .set_default("log_level", "info")?
        .add_source(File::from(system_config_dir.join("config.toml")).required(false))
        .add_source(File::from(config_directory.join("config.toml")).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    get_configuration_with_paths(None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::tempdir;

    fn clear_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with("GC_CLI__") {
                std::env::remove_var(&key);
            }
        }
    }

    fn nowhere() -> Option<PathBuf> {
        Some(PathBuf::from("/nonexistent"))
    }

    #[serial]
    #[test]
    fn test_get_configuration_defaults() {
        clear_env();

        let settings = get_configuration_with_paths(nowhere(), nowhere()).unwrap();

        assert_eq!(settings.api.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.api.retries, 3);
        assert_eq!(settings.api.initial_backoff_ms, 1_000);
        assert_eq!(settings.api.max_backoff_ms, 32_000);
        assert_eq!(settings.auth.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(settings.auth.scopes.len(), 4);
        assert!(settings.classroom.course_id.is_none());
        assert_eq!(settings.log_level, "info");
    }

    #[serial]
    #[test]
    fn test_get_configuration_file_override() {
        clear_env();

        let dir = tempdir().unwrap();
        let config_content = r#"
        log_level = "debug"

        [api]
        retries = 5

        [classroom]
        course_id = "12345"
        "#;

        let mut file = std::fs::File::create(dir.path().join("config.toml")).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let settings =
            get_configuration_with_paths(Some(dir.path().to_path_buf()), nowhere()).unwrap();

        assert_eq!(settings.api.retries, 5);
        assert_eq!(settings.api.page_size, 100);
        assert_eq!(settings.classroom.course_id.as_deref(), Some("12345"));
        assert_eq!(settings.log_level, "debug");
    }

    #[serial]
    #[test]
    fn test_get_configuration_env_override() {
        clear_env();

        std::env::set_var("GC_CLI__API__RETRIES", "7");
        std::env::set_var("GC_CLI__LOG_LEVEL", "trace");

        let settings = get_configuration_with_paths(nowhere(), nowhere()).unwrap();

        assert_eq!(settings.api.retries, 7);
        assert_eq!(settings.log_level, "trace");

        std::env::remove_var("GC_CLI__API__RETRIES");
        std::env::remove_var("GC_CLI__LOG_LEVEL");
    }

    #[serial]
    #[test]
    fn test_get_configuration_precedence_env_over_file() {
        clear_env();

        let dir = tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("config.toml")).unwrap();
        file.write_all(b"log_level = \"debug\"\n").unwrap();

        std::env::set_var("GC_CLI__LOG_LEVEL", "warn");

        let settings =
            get_configuration_with_paths(Some(dir.path().to_path_buf()), nowhere()).unwrap();

        assert_eq!(settings.log_level, "warn");

        std::env::remove_var("GC_CLI__LOG_LEVEL");
    }

    #[test]
    fn test_default_token_path_lives_in_config_dir() {
        assert_eq!(default_token_path().parent(), Some(config_dir().as_path()));
    }
}
