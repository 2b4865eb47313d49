//! Gmail API module split into logical submodules
//!
//! - auth: credential storage, refresh and the installed-app flow
//! - messages: the list and delete calls used by the purge

pub mod auth;
pub mod messages;

pub use auth::{
    obtain_credential, AuthConfig, Credential, CredentialStore, FileCredentialStore,
    HttpTokenRefresher, KeyringCredentialStore, KeyringEntry, OAuthFlow, RealOAuthFlow,
    TokenRefresher, GMAIL_SCOPE,
};
pub use messages::{GmailClient, MailApi};
