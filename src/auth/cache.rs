use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::AuthError;

/// Keep only word characters so tenant and client IDs are safe in file names.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedToken {
    refresh_token: String,
    saved_at: i64,
}

/// On-disk refresh-token cache for one tenant/client pair.
///
/// Holds an exclusive advisory lock for its lifetime so two runs against the
/// same tenant cannot race on the cached token.
pub struct TokenCache {
    token_path: PathBuf,
    lock_file: std::fs::File,
}

impl TokenCache {
    pub async fn open(directory: &Path, tenant: &str, client_id: &str) -> Result<Self, AuthError> {
        fs::create_dir_all(directory).await?;

        let stem = format!("{}_{}", sanitize_key(tenant), sanitize_key(client_id));
        let lock_path = directory.join(format!("{}.lock", stem));
        let lock_file = tokio::task::spawn_blocking(move || {
            let file = std::fs::File::create(&lock_path)?;
            file.try_lock_exclusive()
                .map_err(|_| AuthError::Locked(lock_path.display().to_string()))?;
            Ok::<_, AuthError>(file)
        })
        .await
        .map_err(|e| AuthError::Io(std::io::Error::other(e)))??;

        Ok(Self {
            token_path: directory.join(format!("{}.token", stem)),
            lock_file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.token_path
    }

    /// Cached refresh token, if one exists and parses.
    pub async fn load(&self) -> Option<String> {
        let contents = fs::read_to_string(&self.token_path).await.ok()?;
        match serde_json::from_str::<CachedToken>(&contents) {
            Ok(cached) => Some(cached.refresh_token),
            Err(e) => {
                tracing::info!("Token cache corrupt, ignoring: {}", e);
                None
            }
        }
    }

    pub async fn store(&self, refresh_token: &str) -> Result<(), AuthError> {
        let cached = CachedToken {
            refresh_token: refresh_token.to_string(),
            saved_at: chrono::Utc::now().timestamp(),
        };
        let json = serde_json::to_string_pretty(&cached)?;

        // Refresh tokens grant drive access; owner-only from creation on.
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.token_path).await?;
        #[cfg(unix)]
        {
            // `mode` only applies to new files.
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.token_path, perms).await?;
        }
        file.write_all(json.as_bytes()).await?;
        file.flush().await?;
        tracing::debug!("Saved refresh token to {}", self.token_path.display());
        Ok(())
    }

    pub async fn clear(&self) {
        if let Err(e) = fs::remove_file(&self.token_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove stale token cache: {}", e);
            }
        }
    }
}

impl Drop for TokenCache {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
    }
}
