use std::path::{Path, PathBuf};

use async_trait::async_trait;
use classroom_core::config::Settings;
use classroom_core::ports::ConfigRepository;
use classroom_core::Error;
use tracing::{debug, info, instrument};

use crate::token_store::write_atomically;

/// The user's `config.toml`, edited by `gc-cli config`.
///
/// Only this one file is read or written here; layering with environment
/// overrides happens in [`crate::configuration`].
pub struct FileConfigRepository {
    config_path: PathBuf,
}

impl FileConfigRepository {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            config_path: config_dir.join("config.toml"),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Store `course_id` as the class used when `--course` is omitted,
    /// leaving every other saved setting untouched.
    pub async fn set_default_course(&self, course_id: Option<String>) -> Result<Settings, Error> {
        let mut settings = self.load().await?;
        if settings.classroom.course_id == course_id {
            return Ok(settings);
        }

        settings.classroom.course_id = course_id;
        self.save(&settings).await?;
        info!(course_id = ?settings.classroom.course_id, "default class updated");
        Ok(settings)
    }
}

#[async_trait]
impl ConfigRepository for FileConfigRepository {
    #[instrument(skip(self), fields(path = ?self.config_path))]
    async fn load(&self) -> Result<Settings, Error> {
        let content = match tokio::fs::read_to_string(&self.config_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config file, using defaults");
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "{} is not valid: {}",
                self.config_path.display(),
                e
            ))
        })
    }

    #[instrument(skip(self, settings), fields(path = ?self.config_path))]
    async fn save(&self, settings: &Settings) -> Result<(), Error> {
        let content = toml::to_string_pretty(settings)
            .map_err(|e| Error::Config(format!("failed to serialize settings: {}", e)))?;

        let path = self.config_path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, content.as_bytes()))
            .await
            .map_err(|e| Error::Other(format!("task join error: {}", e)))??;

        debug!("settings saved");
        Ok(())
    }

    async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.config_path)
            .await
            .unwrap_or(false)
    }
}
