use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_API_BASE_URL: &str = "https://classroom.googleapis.com/v1";

pub const DEFAULT_SCOPES: [&str; 4] = [
    "https://www.googleapis.com/auth/classroom.courses.readonly",
    "https://www.googleapis.com/auth/classroom.coursework.me",
    "https://www.googleapis.com/auth/classroom.coursework.students",
    "https://www.googleapis.com/auth/classroom.announcements.readonly",
];

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub classroom: ClassroomSettings,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// OAuth client registration and credential location.
///
/// The client id and secret are never compiled in as literals; they come from
/// the config file, the environment, or build-time `GC_CLI_CLIENT_ID` /
/// `GC_CLI_CLIENT_SECRET`.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AuthSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_file: Option<PathBuf>,
    pub auth_url: String,
    pub token_url: String,
    pub callback_timeout_secs: u64,
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub page_size: u32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ClassroomSettings {
    /// Course used by one-shot commands when `--course` is omitted
    pub course_id: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AuthSettings {
    /// Client id from settings, falling back to the value baked in at build time.
    pub fn resolved_client_id(&self) -> Option<String> {
        self.client_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| option_env!("GC_CLI_CLIENT_ID").map(str::to_string))
    }

    pub fn resolved_client_secret(&self) -> Option<String> {
        self.client_secret
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| option_env!("GC_CLI_CLIENT_SECRET").map(str::to_string))
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

impl ApiSettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auth: AuthSettings::default(),
            api: ApiSettings::default(),
            classroom: ClassroomSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_file: None,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            callback_timeout_secs: 60,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            retries: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 32_000,
            page_size: 100,
            request_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.auth.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(settings.auth.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(settings.auth.callback_timeout(), Duration::from_secs(60));
        assert_eq!(settings.auth.scopes.len(), 4);
        assert!(settings.auth.token_file.is_none());

        assert_eq!(settings.api.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.api.retries, 3);
        assert_eq!(settings.api.initial_backoff(), Duration::from_secs(1));
        assert_eq!(settings.api.max_backoff(), Duration::from_secs(32));
        assert_eq!(settings.api.page_size, 100);

        assert!(settings.classroom.course_id.is_none());
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"classroom": {"course_id": "42"}}"#)
            .expect("partial settings should deserialize");

        assert_eq!(settings.classroom.course_id.as_deref(), Some("42"));
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.api.retries, 3);
    }

    #[test]
    fn test_empty_client_id_is_ignored() {
        let auth = AuthSettings {
            client_id: Some(String::new()),
            ..AuthSettings::default()
        };
        assert_eq!(
            auth.resolved_client_id(),
            option_env!("GC_CLI_CLIENT_ID").map(str::to_string)
        );
    }
}
