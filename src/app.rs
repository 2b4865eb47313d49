use tracing::info;

use crate::bulk_delete::{delete_matching, DeleteSummary, DEFAULT_QUERY};
use crate::cli::Cli;
use crate::gmail_api::{
    obtain_credential, AuthConfig, CredentialStore, FileCredentialStore, GmailClient,
    HttpTokenRefresher, KeyringCredentialStore, RealOAuthFlow,
};

pub fn open_store(cli: &Cli) -> anyhow::Result<Box<dyn CredentialStore>> {
    if cli.keyring {
        Ok(Box::new(KeyringCredentialStore::open_default()?))
    } else {
        Ok(Box::new(FileCredentialStore::new(&cli.token_file)))
    }
}

pub fn handle_credentials_clear(store: &dyn CredentialStore) -> anyhow::Result<()> {
    store.clear()?;
    println!("Stored credentials removed. Exiting.");
    Ok(())
}

/// Authenticate, then purge. Returns `None` when the run only cleared credentials.
pub async fn run(cli: Cli) -> anyhow::Result<Option<DeleteSummary>> {
    let store = open_store(&cli)?;

    if cli.clear_credentials {
        handle_credentials_clear(store.as_ref())?;
        return Ok(None);
    }

    let client = reqwest::Client::new();
    let config = AuthConfig::new(&cli.client_secret);
    let credential = obtain_credential(
        store.as_ref(),
        &HttpTokenRefresher::new(client.clone()),
        &RealOAuthFlow,
        &config,
    )
    .await?;
    info!("Authenticated with Gmail");

    let api = GmailClient::new(client, credential.access_token);
    let summary = delete_matching(&api, DEFAULT_QUERY).await?;
    Ok(Some(summary))
}
