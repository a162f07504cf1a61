//! Environment-backed secret store for local runs.

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::secrets::SecretStore;

/// Reads secrets from environment variables.
///
/// A parameter name such as `/github/apptoken` maps to `GITHUB_APPTOKEN`.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn new() -> Self {
        Self
    }

    /// Environment variable holding the parameter `name`.
    pub fn var_name(name: &str) -> String {
        name.trim_start_matches('/')
            .chars()
            .map(|c| match c {
                '/' | '-' | '.' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect()
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, name: &str, _decrypt: bool) -> Result<String> {
        let var = Self::var_name(name);
        std::env::var(&var)
            .map_err(|_| AppError::secret(format!("parameter '{name}' not set (expected ${var})")))
    }
}
