use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use yup_oauth2::storage::{TokenInfo, TokenStorage};
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use crate::errors::AuthError;
use crate::types::TokenResponse;

const KEYRING_SERVICE_NAME: &str = "gmail-purge";
const KEYRING_USERNAME: &str = "default";

/// Full mailbox access; permanent deletion is not covered by narrower scopes.
pub const GMAIL_SCOPE: &str = "https://mail.google.com/";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

// Treat a token this close to expiry as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now + Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(now)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map_or(false, |token| !token.is_empty())
    }
}

/// Where the client secret lives and which scopes a new credential asks for.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_secret_path: PathBuf,
    pub scopes: Vec<String>,
}

impl AuthConfig {
    pub fn new(client_secret_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_path: client_secret_path.into(),
            scopes: vec![GMAIL_SCOPE.to_string()],
        }
    }
}

// Persistence for the credential blob. Absence is `Ok(None)`, never an error.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, AuthError>;
    fn save(&self, credential: &Credential) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// The blob holds the refresh token and client secret; keep it owner-only.
fn write_owner_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // `mode` only applies on creation; tighten files left by older runs.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, AuthError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuthError::Store(format!(
                    "reading {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        let credential = serde_json::from_str(&contents).map_err(|e| {
            AuthError::Store(format!("parsing {}: {}", self.path.display(), e))
        })?;
        Ok(Some(credential))
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(credential)
            .map_err(|e| AuthError::Store(e.to_string()))?;
        write_owner_only(&self.path, json.as_bytes())
            .map_err(|e| AuthError::Store(format!("writing {}: {}", self.path.display(), e)))
    }

    fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Store(format!(
                "removing {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

// Define a trait for Keyring operations to allow mocking
#[cfg_attr(test, mockall::automock)]
pub trait KeyringEntry: Send + Sync {
    fn get_password(&self) -> Result<String, keyring::Error>;
    fn set_password(&self, password: &str) -> Result<(), keyring::Error>;
    fn delete_password(&self) -> Result<(), keyring::Error>;
}

// Implement the trait for the real keyring::Entry
impl KeyringEntry for Entry {
    fn get_password(&self) -> Result<String, keyring::Error> {
        self.get_password()
    }
    fn set_password(&self, password: &str) -> Result<(), keyring::Error> {
        self.set_password(password)
    }
    fn delete_password(&self) -> Result<(), keyring::Error> {
        self.delete_password()
    }
}

pub struct KeyringCredentialStore<K: KeyringEntry> {
    entry: K,
}

impl KeyringCredentialStore<Entry> {
    pub fn open_default() -> Result<Self, AuthError> {
        Ok(Self::new(Entry::new(KEYRING_SERVICE_NAME, KEYRING_USERNAME)?))
    }
}

impl<K: KeyringEntry> KeyringCredentialStore<K> {
    pub fn new(entry: K) -> Self {
        Self { entry }
    }
}

impl<K: KeyringEntry> CredentialStore for KeyringCredentialStore<K> {
    fn load(&self) -> Result<Option<Credential>, AuthError> {
        let json = match self.entry.get_password() {
            Ok(json) => json,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let credential =
            serde_json::from_str(&json).map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(Some(credential))
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        let json =
            serde_json::to_string(credential).map_err(|e| AuthError::Store(e.to_string()))?;
        self.entry.set_password(&json)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match self.entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError>;
}

/// Exchanges a refresh token at the credential's own token endpoint.
pub struct HttpTokenRefresher {
    client: reqwest::Client,
}

impl HttpTokenRefresher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::Refresh("credential has no refresh token".into()))?;

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&credential.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AuthError::Refresh(format!("{}: {}", status, error_text)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        // Google usually omits the refresh token on refresh; keep the old one.
        Ok(Credential {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .or_else(|| credential.refresh_token.clone()),
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            client_id: credential.client_id.clone(),
            client_secret: credential.client_secret.clone(),
            token_uri: credential.token_uri.clone(),
            scopes: match token.scope {
                Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
                None => credential.scopes.clone(),
            },
        })
    }
}

// Define a trait for OAuth flow operations to allow mocking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    async fn perform_flow(
        &self,
        secret: ApplicationSecret,
        scopes: Vec<String>,
    ) -> Result<Credential, AuthError>;
}

// yup-oauth2 only hands back the access token; this storage captures the
// full token (refresh token included) as the authenticator writes it.
#[derive(Clone, Default)]
struct CapturingStorage {
    token: Arc<Mutex<Option<TokenInfo>>>,
}

#[async_trait]
impl TokenStorage for CapturingStorage {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        *self.token.lock().await = Some(token);
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        self.token.lock().await.clone()
    }
}

fn to_chrono(expires_at: time::OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(expires_at.unix_timestamp(), 0)
}

// Installed-app flow: opens a local redirect listener on an ephemeral port.
pub struct RealOAuthFlow;

#[async_trait]
impl OAuthFlow for RealOAuthFlow {
    async fn perform_flow(
        &self,
        secret: ApplicationSecret,
        scopes: Vec<String>,
    ) -> Result<Credential, AuthError> {
        let storage = CapturingStorage::default();
        let auth = InstalledFlowAuthenticator::builder(
            secret.clone(),
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .with_storage(Box::new(storage.clone()))
        .build()
        .await
        .map_err(|e| AuthError::Flow(e.to_string()))?;

        let scopes_refs: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
        let access = auth
            .token(&scopes_refs)
            .await
            .map_err(|e| AuthError::Flow(e.to_string()))?;

        let captured = storage.token.lock().await.clone();
        let (access_token, refresh_token, expires_at) = match captured {
            Some(info) => (info.access_token, info.refresh_token, info.expires_at),
            None => (
                access.token().map(str::to_string),
                None,
                access.expiration_time(),
            ),
        };
        let access_token = access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Flow("provider returned no access token".into()))?;

        Ok(Credential {
            access_token,
            refresh_token,
            expires_at: expires_at.and_then(to_chrono),
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            token_uri: secret.token_uri,
            scopes,
        })
    }
}

async fn load_client_secret(config: &AuthConfig) -> Result<ApplicationSecret, AuthError> {
    yup_oauth2::read_application_secret(&config.client_secret_path)
        .await
        .map_err(|source| AuthError::ClientSecret {
            path: config.client_secret_path.clone(),
            source,
        })
}

/// Returns a usable credential, refreshing or re-authorizing as needed.
///
/// A stored credential that is still valid is returned untouched. Anything
/// newly refreshed or issued is written back to `store` before returning,
/// so callers never hold a credential that is not yet persisted.
pub async fn obtain_credential<S, R, O>(
    store: &S,
    refresher: &R,
    oauth_flow_impl: &O,
    config: &AuthConfig,
) -> Result<Credential, AuthError>
where
    S: CredentialStore + ?Sized,
    R: TokenRefresher + ?Sized,
    O: OAuthFlow + ?Sized,
{
    let stored = match store.load() {
        Ok(stored) => stored,
        Err(e) => {
            warn!("Ignoring unreadable stored credential: {}", e);
            None
        }
    };

    let now = Utc::now();
    let credential = match stored {
        Some(credential) if credential.is_valid_at(now) => {
            debug!("Reusing stored credential");
            return Ok(credential);
        }
        Some(credential) if credential.is_expired_at(now) && credential.can_refresh() => {
            info!("Stored credential expired, refreshing");
            refresher.refresh(&credential).await?
        }
        _ => {
            info!("No usable credential, starting authorization flow");
            let secret = load_client_secret(config).await?;
            oauth_flow_impl
                .perform_flow(secret, config.scopes.clone())
                .await?
        }
    };

    store.save(&credential)?;
    Ok(credential)
}
