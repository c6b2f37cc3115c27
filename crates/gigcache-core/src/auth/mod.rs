//! Bearer tokens for remote shows endpoints.
//!
//! Acquiring a token is somebody else's job; this module only defines where
//! the discovery fetch gets one from:
//! - `TokenProvider`: the contract the orchestrator calls before a remote fetch
//! - `StaticToken`: a token handed in by configuration
//! - `Session`: a short-lived token kept in the local store
//! - `CredentialStore`: a token kept in the OS keychain via keyring

pub mod credentials;
pub mod session;

use anyhow::Result;
use futures::future::BoxFuture;

pub use credentials::CredentialStore;
pub use session::{Session, SessionData};

/// Source of an optional bearer token.
///
/// `Ok(None)` means "no signed-in user"; the request goes out without an
/// `Authorization` header. Errors are treated the same way by callers.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> BoxFuture<'_, Result<Option<String>>>;
}

/// A fixed token, or none.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> BoxFuture<'_, Result<Option<String>>> {
        let token = self.0.clone().filter(|t| !t.trim().is_empty());
        Box::pin(async move { Ok(token) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(StaticToken::new("abc").bearer_token().await.unwrap().as_deref(), Some("abc"));
        assert_eq!(StaticToken::new("  ").bearer_token().await.unwrap(), None);
        assert_eq!(StaticToken::none().bearer_token().await.unwrap(), None);
    }
}
