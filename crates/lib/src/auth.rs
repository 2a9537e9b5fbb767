//! Token login and the persisted identity of the signed-in user.
//!
//! The backend issues a single opaque token per login; there is no refresh flow, so "refresh"
//! hands back the same token. The user and tokens are kept in a JSON file (e.g.
//! `~/.painel/credentials.json`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::{ApiError, Backend};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

/// What a successful login leaves on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user: User,
    pub tokens: AuthTokens,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,
    #[error("login failed: {0}")]
    Api(#[from] ApiError),
    #[error("credentials file: {0}")]
    Io(#[from] std::io::Error),
    #[error("credentials file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// JSON file holding the signed-in session.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored session, or `None` when nobody is signed in.
    pub async fn load(&self) -> Result<Option<StoredSession>, AuthError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => Ok(Some(serde_json::from_str(&s)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, session: &StoredSession) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), AuthError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct AuthService {
    backend: Arc<dyn Backend>,
    store: CredentialStore,
}

impl AuthService {
    pub fn new(backend: Arc<dyn Backend>, store: CredentialStore) -> Self {
        Self { backend, store }
    }

    /// Exchange username and password for a token and persist the session.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<StoredSession, AuthError> {
        log::info!("logging in as {}", credentials.username);
        let token = self
            .backend
            .obtain_token(&credentials.username, &credentials.password)
            .await?;
        let session = StoredSession {
            user: User {
                id: "1".to_string(),
                email: String::new(),
                name: credentials.username.clone(),
            },
            tokens: AuthTokens {
                access: token.clone(),
                refresh: token,
            },
        };
        self.store.save(&session).await?;
        log::info!("login succeeded, session stored at {}", self.store.path().display());
        Ok(session)
    }

    /// Forget the stored session. The backend has no logout endpoint.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.store.clear().await
    }

    /// No refresh flow exists: the same token comes back.
    pub fn refresh_token(&self, refresh: &str) -> AuthTokens {
        AuthTokens {
            access: refresh.to_string(),
            refresh: refresh.to_string(),
        }
    }

    pub async fn current_user(&self) -> Result<User, AuthError> {
        self.store
            .load()
            .await?
            .map(|s| s.user)
            .ok_or(AuthError::UserNotFound)
    }

    /// Access token of the stored session, if any.
    pub async fn access_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.store.load().await?.map(|s| s.tokens.access))
    }
}
