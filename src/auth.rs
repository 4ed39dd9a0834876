//! Account session: password and one-time-code login, token restore, logout

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::api::{ApiClient, User};
use crate::error::{ApiError, ApiResult};

const DEVICE_NAME: &str = "aniliberty-rs";

/// Stable id of this machine for the one-time-code flow.
pub fn device_id() -> String {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{DEVICE_NAME}-{hostname}")
}

/// A code to confirm on an already logged-in device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OtpChallenge {
    pub fn seconds_left(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|at| (at - now).num_seconds().max(0))
    }
}

pub struct AuthSession {
    api: ApiClient,
    user: RwLock<Option<User>>,
}

impl AuthSession {
    pub fn new(api: ApiClient) -> Self {
        Self { api, user: RwLock::new(None) }
    }

    pub fn user(&self) -> Option<User> {
        self.user.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.api.has_token()
    }

    pub async fn login(&self, login: &str, password: &str) -> ApiResult<User> {
        let token = self.api.login(login, password).await?;
        self.start(token).await
    }

    pub async fn request_otp(&self, device_id: &str) -> ApiResult<OtpChallenge> {
        let response = self.api.request_otp(device_id).await?;
        let expires_at = response
            .otp
            .expired_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc))
            .or_else(|| {
                (response.remaining_time > 0)
                    .then(|| Utc::now() + chrono::Duration::seconds(response.remaining_time as i64))
            });

        tracing::info!(device_id, "One-time code issued");
        Ok(OtpChallenge { code: response.otp.code, expires_at })
    }

    pub async fn login_with_otp(&self, code: u32, device_id: &str) -> ApiResult<User> {
        let token = self.api.login_with_otp(code, device_id).await?;
        self.start(token).await
    }

    async fn start(&self, token: String) -> ApiResult<User> {
        self.api.store_token(token).await;
        match self.profile().await {
            Ok(user) => {
                tracing::info!(user_id = user.id, "Logged in");
                Ok(user)
            }
            Err(err) => {
                self.api.clear_token().await;
                Err(err)
            }
        }
    }

    /// Fetch the profile of the current token's user.
    pub async fn profile(&self) -> ApiResult<User> {
        let user = self.api.profile().await?;
        *self.user.write() = Some(user.clone());
        Ok(user)
    }

    /// Load a persisted token and check it is still accepted.
    ///
    /// An invalid token is dropped and `Ok(None)` returned. Network failures
    /// keep the token for a later attempt.
    pub async fn restore(&self) -> ApiResult<Option<User>> {
        if self.api.restore_token().await.is_none() {
            tracing::debug!("No stored token");
            return Ok(None);
        }

        match self.profile().await {
            Ok(user) => {
                tracing::info!(user_id = user.id, "Restored session");
                Ok(Some(user))
            }
            Err(err) if err.is_unauthorized() => {
                tracing::info!("Stored token rejected, logging out locally");
                self.api.clear_token().await;
                self.user.write().take();
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Always ends the local session, even if the server call fails.
    pub async fn logout(&self) {
        if let Err(err) = self.api.logout().await {
            tracing::warn!(error = %err, "Server logout failed, clearing local session anyway");
        }
        self.api.clear_token().await;
        self.user.write().take();
        tracing::info!("Logged out");
    }
}
