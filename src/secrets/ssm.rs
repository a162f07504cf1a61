//! AWS Systems Manager Parameter Store.

use async_trait::async_trait;
use aws_sdk_ssm::Client;

use crate::error::{AppError, Result};
use crate::secrets::SecretStore;

/// Secret store backed by SSM `GetParameter`.
#[derive(Clone)]
pub struct SsmSecretStore {
    client: Client,
}

impl SsmSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(sdk_config))
    }
}

#[async_trait]
impl SecretStore for SsmSecretStore {
    async fn get(&self, name: &str, decrypt: bool) -> Result<String> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(decrypt)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_parameter_not_found() {
                    AppError::NotFound(format!("ssm parameter {name}"))
                } else {
                    AppError::secret(format!("get parameter {name}: {service_err}"))
                }
            })?;

        output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| AppError::secret(format!("ssm parameter {name} has no value")))
    }
}
