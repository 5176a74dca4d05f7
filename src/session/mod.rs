pub mod storage;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;
use tracing::warn;

use crate::error::AppError;
use crate::models::user::User;
use crate::session::storage::{SessionStorage, ACCESS_TOKEN_KEY, USER_INFO_KEY};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionChange {
    SignedIn(User),
    SignedOut,
    Expired,
}

/// Process-wide authenticated identity. Identity changes are published on a
/// watch channel instead of being read ambiently; every `set_user` and
/// `clear_user` also writes through to durable storage under a fixed key.
pub struct SessionStore {
    inner: Mutex<Inner>,
    change_tx: watch::Sender<SessionChange>,
    storage: Arc<dyn SessionStorage>,
}

struct Inner {
    user: Option<User>,
    expiry_timer: Option<AbortHandle>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Arc<Self> {
        let (change_tx, _unused_rx) = watch::channel(SessionChange::SignedOut);
        Arc::new(Self {
            inner: Mutex::new(Inner {
                user: None,
                expiry_timer: None,
            }),
            change_tx,
            storage,
        })
    }

    /// Re-adopt an identity persisted by a previous run. An unparseable
    /// entry is removed rather than trusted.
    pub async fn restore(self: &Arc<Self>) -> Result<(), AppError> {
        let Some(raw) = self.storage.read(USER_INFO_KEY)? else {
            return Ok(());
        };
        match serde_json::from_str::<User>(&raw) {
            Ok(user) => self.set_user(user).await,
            Err(err) => {
                warn!(error = %err, "stored session entry malformed, discarding");
                self.storage.remove(USER_INFO_KEY)?;
                self.storage.remove(ACCESS_TOKEN_KEY)?;
                Ok(())
            }
        }
    }

    /// Replaces the current identity, persists it and schedules the expiry
    /// timer. An identity whose expiry is already in the past is cleared
    /// immediately. At most one timer is pending; any prior one is aborted.
    pub async fn set_user(self: &Arc<Self>, user: User) -> Result<(), AppError> {
        let payload = serde_json::to_string(&user)
            .map_err(|err| AppError::Internal(format!("serialize session user: {err}")))?;
        self.storage.write(USER_INFO_KEY, &payload)?;

        let mut inner = self.inner.lock().await;
        if let Some(timer) = inner.expiry_timer.take() {
            timer.abort();
        }

        if let Some(expiry) = user.expiry {
            let remaining = expiry - Utc::now();
            match remaining.to_std() {
                Ok(wait) => {
                    let store = Arc::clone(self);
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(wait).await;
                        store.expire().await;
                    });
                    inner.expiry_timer = Some(handle.abort_handle());
                }
                Err(_) => {
                    // expiry already past at observation time
                    inner.user = None;
                    drop(inner);
                    self.remove_entries();
                    let _ = self.change_tx.send(SessionChange::Expired);
                    return Ok(());
                }
            }
        }

        inner.user = Some(user.clone());
        drop(inner);
        let _ = self.change_tx.send(SessionChange::SignedIn(user));
        Ok(())
    }

    pub async fn clear_user(self: &Arc<Self>) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        if let Some(timer) = inner.expiry_timer.take() {
            timer.abort();
        }
        inner.user = None;
        drop(inner);

        self.storage.remove(USER_INFO_KEY)?;
        self.storage.remove(ACCESS_TOKEN_KEY)?;
        let _ = self.change_tx.send(SessionChange::SignedOut);
        Ok(())
    }

    pub async fn current(&self) -> Option<User> {
        self.inner.lock().await.user.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionChange> {
        self.change_tx.subscribe()
    }

    pub fn store_token(&self, token: &str) -> Result<(), AppError> {
        self.storage.write(ACCESS_TOKEN_KEY, token)
    }

    pub fn stored_user_entry(&self) -> Result<Option<String>, AppError> {
        self.storage.read(USER_INFO_KEY)
    }

    async fn expire(self: &Arc<Self>) {
        let mut inner = self.inner.lock().await;
        inner.expiry_timer = None;
        if inner.user.is_none() {
            return;
        }
        inner.user = None;
        drop(inner);

        self.remove_entries();
        let _ = self.change_tx.send(SessionChange::Expired);
        warn!("session expired");
    }

    fn remove_entries(&self) {
        if let Err(err) = self.storage.remove(USER_INFO_KEY) {
            warn!(error = %err, "failed to remove persisted session user");
        }
        if let Err(err) = self.storage.remove(ACCESS_TOKEN_KEY) {
            warn!(error = %err, "failed to remove persisted access token");
        }
    }
}
