//! Credential lookup.
//!
//! The GitHub token lives in a key/value secret store (AWS SSM Parameter
//! Store in production). It is fetched once per run and only held in memory.

mod env;
#[cfg(feature = "aws")]
mod ssm;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};

pub use env::EnvSecretStore;
#[cfg(feature = "aws")]
pub use ssm::SsmSecretStore;

/// A key/value secret store.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read the value stored under `name`, decrypting it when asked to.
    async fn get(&self, name: &str, decrypt: bool) -> Result<String>;
}

/// An API token. Never logged, never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Fetches the run's credential. No retries: one failure aborts the run.
#[derive(Clone)]
pub struct SecretResolver {
    store: Arc<dyn SecretStore>,
}

impl SecretResolver {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self, name: &str, decrypt: bool) -> Result<Credential> {
        let value = self.store.get(name, decrypt).await?;
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::secret(format!("secret '{name}' is empty")));
        }
        log::info!("Resolved secret '{}'", name);
        Ok(Credential::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore(Option<&'static str>);

    #[async_trait]
    impl SecretStore for FixedStore {
        async fn get(&self, name: &str, _decrypt: bool) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| AppError::NotFound(name.to_string()))
        }
    }

    #[tokio::test]
    async fn test_fetch_trims_value() {
        let resolver = SecretResolver::new(Arc::new(FixedStore(Some(" ghp_abc\n"))));
        let credential = resolver.fetch("/github/apptoken", true).await.unwrap();
        assert_eq!(credential.expose(), "ghp_abc");
    }

    #[tokio::test]
    async fn test_missing_secret_fails() {
        let resolver = SecretResolver::new(Arc::new(FixedStore(None)));
        assert!(resolver.fetch("/github/apptoken", true).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_secret_fails() {
        let resolver = SecretResolver::new(Arc::new(FixedStore(Some("   "))));
        assert!(resolver.fetch("/github/apptoken", true).await.is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let credential = Credential::new("ghp_secret");
        assert_eq!(format!("{credential:?}"), "Credential(***)");
    }
}
