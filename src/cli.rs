use std::path::PathBuf;

use clap::Parser;

/// Permanently delete every Gmail message that is neither important nor starred.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// OAuth client configuration downloaded from the Google Cloud console.
    #[clap(long, default_value = "client_secret.json")]
    pub client_secret: PathBuf,

    /// File the access credential is cached in between runs.
    #[clap(long, default_value = "token.json")]
    pub token_file: PathBuf,

    /// Cache the credential in the system keyring instead of a file.
    #[clap(long)]
    pub keyring: bool,

    /// Remove the stored credential and exit.
    #[clap(long)]
    pub clear_credentials: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_uses_local_files() {
        let cli = Cli::parse_from(["gmail-purge"]);
        assert_eq!(cli.client_secret, PathBuf::from("client_secret.json"));
        assert_eq!(cli.token_file, PathBuf::from("token.json"));
        assert!(!cli.keyring);
        assert!(!cli.clear_credentials);
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "gmail-purge",
            "--client-secret",
            "/tmp/secret.json",
            "--keyring",
            "--clear-credentials",
        ]);
        assert_eq!(cli.client_secret, PathBuf::from("/tmp/secret.json"));
        assert!(cli.keyring);
        assert!(cli.clear_credentials);
    }
}
