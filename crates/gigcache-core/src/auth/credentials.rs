use anyhow::{Context, Result};
use futures::future::BoxFuture;
use keyring::Entry;

use super::TokenProvider;

const SERVICE_NAME: &str = "gigcache";

/// Bearer token for one account, kept in the OS keychain.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    username: String,
}

impl CredentialStore {
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into() }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.username).context("Failed to create keyring entry")
    }

    /// Store the token in the OS keychain
    pub fn store(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store token in keychain")?;
        Ok(())
    }

    /// Retrieve the token; a missing entry is `Ok(None)`
    pub fn get_token(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    /// Delete the stored token
    pub fn delete(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

impl TokenProvider for CredentialStore {
    fn bearer_token(&self) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(async move { self.get_token() })
    }
}
