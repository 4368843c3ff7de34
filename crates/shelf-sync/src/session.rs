//! Authentication state and token persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use shelf_core::error::StorageError;
use shelf_core::traits::Remote;
use shelf_core::{AuthToken, Credentials, Result};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Stored session data.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    token: String,
}

/// The token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<AuthToken>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                }
                .into());
            }
        };

        let stored: StoredSession =
            serde_json::from_str(&json).map_err(|e| StorageError::Corrupt {
                path: self.path.clone(),
                details: e.to_string(),
            })?;

        if stored.token.is_empty() {
            return Ok(None);
        }
        Ok(Some(AuthToken::new(stored.token)))
    }

    pub fn save(&self, token: &AuthToken) -> Result<()> {
        let write_err = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let stored = StoredSession {
            token: token.as_str().to_string(),
        };
        let json = serde_json::to_string_pretty(&stored).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            details: e.to_string(),
        })?;

        fs::write(&self.path, json).map_err(write_err)?;

        // Set restrictive permissions (Unix only)
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&self.path).map_err(write_err)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms).map_err(write_err)?;
        }

        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Write {
                path: self.path.clone(),
                source,
            }
            .into()),
        }
    }
}

/// Snapshot of the authentication state.
///
/// A token can be present without being authenticated: a persisted token is
/// loaded at start but only counts once the server confirms it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub token: Option<AuthToken>,
    pub authenticated: bool,
}

/// The current credential and whether the server accepts it.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AuthSession {
    remote: Arc<dyn Remote>,
    store: TokenStore,
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthSession {
    /// Create a session, picking up any persisted token (unauthenticated until checked).
    pub fn new(remote: Arc<dyn Remote>, store: TokenStore) -> Result<Self> {
        let token = store.load()?;
        if token.is_some() {
            debug!(path = %store.path().display(), "Found persisted token");
        }

        let (tx, _) = watch::channel(AuthState {
            token,
            authenticated: false,
        });

        Ok(Self {
            remote,
            store,
            state: Arc::new(tx),
        })
    }

    #[instrument(skip(self, credentials), fields(username = credentials.username()))]
    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        let token = self.remote.login(credentials).await?;
        self.store.save(&token)?;

        self.state.send_replace(AuthState {
            token: Some(token),
            authenticated: true,
        });
        info!("Logged in");
        Ok(())
    }

    /// Validate the current token with the server.
    ///
    /// Becomes authenticated only when the server confirms. Returns whether it did.
    #[instrument(skip(self))]
    pub async fn check_token(&self) -> Result<bool> {
        let Some(token) = self.token() else {
            debug!("No token to check");
            return Ok(false);
        };

        let authenticated = self.remote.check_token(&token).await?;
        self.state.send_if_modified(|state| {
            if state.token.as_ref() == Some(&token) && state.authenticated != authenticated {
                state.authenticated = authenticated;
                true
            } else {
                false
            }
        });

        info!(authenticated, "Token checked");
        Ok(authenticated)
    }

    /// Log out remotely (best effort) and forget the token.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        if let Some(token) = self.token() {
            if let Err(e) = self.remote.logout(&token).await {
                warn!(error = %e, "Remote logout failed, clearing local session anyway");
            }
        }

        self.state.send_replace(AuthState::default());
        self.store.clear()?;
        info!("Logged out");
        Ok(())
    }

    pub fn token(&self) -> Option<AuthToken> {
        self.state.borrow().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().authenticated
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// A receiver notified whenever the state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("store", &self.store)
            .field("state", &*self.state.borrow())
            .finish()
    }
}
