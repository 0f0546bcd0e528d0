//! Database credential resolution from the cloud secret storage service.
//!
//! Secrets are fetched on every call and never cached.

mod payload;

pub use payload::{RdsSecret, SecretPayload};

use crate::errors::{Result, StackflowError};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Reads raw secret values.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretsClient: Send + Sync {
    /// Fetches the current value of a secret.
    async fn get_secret_value(&self, secret_id: &str) -> Result<SecretPayload>;
}

/// [`SecretsClient`] backed by the AWS Secrets Manager SDK.
#[derive(Debug, Clone)]
pub struct AwsSecretsClient {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretsClient {
    /// Builds a client from the default credential chain for a region.
    pub async fn for_region(region: impl Into<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self::from_client(aws_sdk_secretsmanager::Client::new(&config))
    }

    /// Wraps an existing SDK client.
    #[must_use]
    pub fn from_client(client: aws_sdk_secretsmanager::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretsClient for AwsSecretsClient {
    async fn get_secret_value(&self, secret_id: &str) -> Result<SecretPayload> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| StackflowError::SecretFetch {
                name: secret_id.to_string(),
                message: aws_sdk_secretsmanager::error::DisplayErrorContext(&e).to_string(),
            })?;

        Ok(SecretPayload {
            secret_string: output.secret_string().map(str::to_string),
            secret_binary: output.secret_binary().map(|blob| blob.as_ref().to_vec()),
        })
    }
}

/// Fetches and decodes structured database secrets.
#[derive(Clone)]
pub struct CredentialResolver {
    client: Arc<dyn SecretsClient>,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver").finish_non_exhaustive()
    }
}

impl CredentialResolver {
    /// Creates a resolver over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn SecretsClient>) -> Self {
        Self { client }
    }

    /// Fetches a secret by name and decodes it.
    #[instrument(skip(self))]
    pub async fn resolve(&self, secret_name: &str) -> Result<RdsSecret> {
        let payload = self.client.get_secret_value(secret_name).await?;
        let secret = payload.decode(secret_name)?;
        debug!(host = %secret.host, port = secret.port, "Resolved database secret");
        Ok(secret)
    }
}
