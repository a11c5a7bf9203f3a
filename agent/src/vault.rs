// agent/src/vault.rs

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::fs as std_fs;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::error::{AgentError, AgentResult};
use crate::sys::secrets::AdminSecret;

pub const CREDENTIAL_LEN: usize = 32;

/// 32 characters drawn uniformly from `[A-Za-z0-9]`.
pub fn generate_secret() -> AdminSecret {
    let raw: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CREDENTIAL_LEN)
        .map(char::from)
        .collect();
    AdminSecret::new(raw)
}

/// The installation's one administrative password, generated on first need and
/// reused until someone deletes the file.
pub struct CredentialVault {
    path: PathBuf,
}

impl CredentialVault {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn get_or_create_credential(&self) -> AgentResult<AdminSecret> {
        get_or_create_credential(&self.path).await
    }
}

pub async fn get_or_create_credential(path: &Path) -> AgentResult<AdminSecret> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            // A hand-edited file is honoured as-is, no length/alphabet check.
            let contents = Zeroizing::new(contents);
            let secret = AdminSecret::new(contents.trim().to_string());
            if secret.is_empty() {
                warn!(path = %path.display(), "credential file is empty, using it anyway");
            }
            Ok(secret)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let secret = generate_secret();
            persist(path, &secret)?;
            info!(path = %path.display(), "🔑 generated new admin credential");
            Ok(secret)
        }
        Err(source) => Err(AgentError::Credential { path: path.to_path_buf(), source }),
    }
}

/// 🚨 Synchronous on purpose: the exposed plaintext must not be held across an
/// `.await`. The file is `0600` from the moment it exists.
fn persist(path: &Path, secret: &AdminSecret) -> AgentResult<()> {
    let to_err = |source| AgentError::Credential { path: path.to_path_buf(), source };

    secret.use_secret(|plain| {
        let line = Zeroizing::new(format!("{}\n", plain));
        let mut file = std_fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(to_err)?;
        file.write_all(line.as_bytes()).map_err(to_err)?;
        file.sync_all().map_err(to_err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn plain(secret: &AdminSecret) -> String {
        secret.use_secret(|s| s.to_string())
    }

    #[tokio::test]
    async fn generated_secret_is_32_alphanumerics() {
        let dir = tempfile::tempdir().unwrap();
        let secret = get_or_create_credential(&dir.path().join("admin.passwd")).await.unwrap();
        let s = plain(&secret);
        assert_eq!(s.len(), CREDENTIAL_LEN);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn repeated_calls_return_the_same_secret() {
        let dir = tempfile::tempdir().unwrap();
        let vault = CredentialVault::new(dir.path().join("admin.passwd"));
        let first = plain(&vault.get_or_create_credential().await.unwrap());
        let second = plain(&vault.get_or_create_credential().await.unwrap());
        assert_eq!(first, second);

        // A fresh vault (process restart) reads the persisted value.
        let restarted = CredentialVault::new(dir.path().join("admin.passwd"));
        assert_eq!(plain(&restarted.get_or_create_credential().await.unwrap()), first);
    }

    #[tokio::test]
    async fn file_holds_secret_and_single_newline_with_owner_only_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.passwd");
        let secret = plain(&get_or_create_credential(&path).await.unwrap());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{}\n", secret));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn hand_edited_file_is_honoured_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.passwd");
        std::fs::write(&path, "  short-and-$pecial \n\n").unwrap();

        let secret = get_or_create_credential(&path).await.unwrap();
        assert_eq!(plain(&secret), "short-and-$pecial");
    }

    #[tokio::test]
    async fn deleting_the_file_rotates_the_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.passwd");
        let first = plain(&get_or_create_credential(&path).await.unwrap());
        std::fs::remove_file(&path).unwrap();
        let second = plain(&get_or_create_credential(&path).await.unwrap());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn unwritable_location_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("admin.passwd");
        let err = get_or_create_credential(&path).await.unwrap_err();
        assert!(matches!(err, AgentError::Credential { .. }));
    }
}
