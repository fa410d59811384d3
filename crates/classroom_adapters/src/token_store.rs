use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use classroom_core::entities::{split_scopes, Credential};
use classroom_core::ports::TokenStore;
use classroom_core::{Error, TokenError};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// On-disk shape of the credential file
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    expiry: DateTime<Utc>,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    scope: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl From<&Credential> for StoredCredential {
    fn from(c: &Credential) -> Self {
        Self {
            access_token: c.access_token.clone(),
            refresh_token: c.refresh_token.clone(),
            expiry: c.expiry,
            token_type: c.token_type.clone(),
            scope: c.scope_string(),
        }
    }
}

impl From<StoredCredential> for Credential {
    fn from(s: StoredCredential) -> Self {
        Self {
            access_token: s.access_token,
            refresh_token: s.refresh_token.filter(|t| !t.is_empty()),
            expiry: s.expiry,
            token_type: s.token_type,
            scopes: split_scopes(&s.scope),
        }
    }
}

/// Credential saved as a JSON file readable only by its owner.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so readers never observe a partial file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Replace `path` with `contents` via a same-directory temp file, owner-only on unix.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), Error> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl TokenStore for FileTokenStore {
    #[instrument(skip(self), fields(path = ?self.path))]
    async fn load(&self) -> Result<Credential, Error> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TokenError::NotFound.into())
            }
            Err(e) => return Err(e.into()),
        };

        let stored: StoredCredential = serde_json::from_str(&content)
            .map_err(|e| TokenError::Corrupt(e.to_string()))?;

        if stored.access_token.is_empty() {
            return Err(TokenError::Corrupt("empty access token".to_string()).into());
        }

        Ok(stored.into())
    }

    #[instrument(skip(self, credential), fields(path = ?self.path))]
    async fn persist(&self, credential: &Credential) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(&StoredCredential::from(credential))
            .map_err(|e| Error::Other(format!("failed to serialize credential: {}", e)))?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &json))
            .await
            .map_err(|e| Error::Other(format!("task join error: {}", e)))??;

        debug!("credential saved");
        Ok(())
    }

    #[instrument(skip(self), fields(path = ?self.path))]
    async fn delete(&self) -> Result<(), Error> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn credential() -> Credential {
        Credential {
            access_token: "ya29.access".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expiry: Utc.with_ymd_and_hms(2030, 6, 1, 8, 30, 0).unwrap(),
            token_type: "Bearer".to_string(),
            scopes: vec!["scope.one".to_string(), "scope.two".to_string()],
        }
    }

    #[tokio::test]
    async fn test_persist_then_load() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("token.json"));

        store.persist(&credential()).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded, credential());
    }

    #[tokio::test]
    async fn test_file_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        let store = FileTokenStore::new(path.clone());

        store.persist(&credential()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["access_token"], "ya29.access");
        assert_eq!(raw["refresh_token"], "1//refresh");
        assert_eq!(raw["expiry"], "2030-06-01T08:30:00Z");
        assert_eq!(raw["token_type"], "Bearer");
        assert_eq!(raw["scope"], "scope.one scope.two");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        FileTokenStore::new(path.clone())
            .persist(&credential())
            .await
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token.json"));

        store.persist(&credential()).await.unwrap();
        let mut next = credential();
        next.access_token = "ya29.second".to_string();
        next.expiry = next.expiry + Duration::hours(1);
        store.persist(&next).await.unwrap();

        assert_eq!(store.load().await.unwrap(), next);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token.json"));

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, Error::Token(TokenError::NotFound)));
    }

    #[tokio::test]
    async fn test_garbage_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{\"access_token\": ").unwrap();

        let err = FileTokenStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, Error::Token(TokenError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token.json"));

        store.persist(&credential()).await.unwrap();
        store.delete().await.unwrap();
        store.delete().await.unwrap();

        assert!(matches!(
            store.load().await.unwrap_err(),
            Error::Token(TokenError::NotFound)
        ));
    }
}
