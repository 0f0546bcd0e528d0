//! Secret payloads and the structured database secret decoded from them.

use crate::errors::{Result, StackflowError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The raw value returned by the secret storage service.
///
/// The service returns exactly one of the two encodings for a given secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretPayload {
    /// Text encoding.
    pub secret_string: Option<String>,
    /// Binary encoding holding UTF-8 JSON.
    pub secret_binary: Option<Vec<u8>>,
}

impl SecretPayload {
    /// A payload carried as text.
    #[must_use]
    pub fn from_string(value: impl Into<String>) -> Self {
        Self {
            secret_string: Some(value.into()),
            secret_binary: None,
        }
    }

    /// A payload carried as bytes.
    #[must_use]
    pub fn from_binary(value: impl Into<Vec<u8>>) -> Self {
        Self {
            secret_string: None,
            secret_binary: Some(value.into()),
        }
    }

    /// Decodes the payload into a database secret.
    ///
    /// The text encoding wins when both are set. Failures are final; nothing
    /// partial is returned.
    pub fn decode(&self, name: &str) -> Result<RdsSecret> {
        let json = match (&self.secret_string, &self.secret_binary) {
            (Some(text), _) => text.as_str(),
            (None, Some(bytes)) => std::str::from_utf8(bytes).map_err(|e| {
                StackflowError::secret_decode(name, format!("binary payload is not UTF-8: {e}"))
            })?,
            (None, None) => {
                return Err(StackflowError::secret_decode(
                    name,
                    "payload has neither a string nor a binary value",
                ))
            }
        };

        serde_json::from_str(json)
            .map_err(|e| StackflowError::secret_decode(name, format!("malformed secret JSON: {e}")))
    }
}

/// Credentials and endpoint of a managed database cluster.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdsSecret {
    /// Database user.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Engine name, e.g. `mysql`.
    pub engine: String,
    /// Cluster endpoint.
    pub host: String,
    /// Listener port.
    pub port: u16,
    /// Default database name.
    pub dbname: String,
    /// Instance identifier, when the secret is bound to one instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_instance_identifier: Option<String>,
    /// Cluster identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_cluster_identifier: Option<String>,
}

impl fmt::Debug for RdsSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdsSecret")
            .field("username", &self.username)
            .field("password", &"***")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("db_instance_identifier", &self.db_instance_identifier)
            .field("db_cluster_identifier", &self.db_cluster_identifier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SECRET: &str = r#"{
        "username": "mysqlUserDevelop",
        "password": "hunter2",
        "engine": "mysql",
        "host": "cluster.example.internal",
        "port": 3306,
        "dbname": "AuroraMysqlDevelop",
        "dbClusterIdentifier": "develop-cluster"
    }"#;

    #[test]
    fn test_string_and_binary_decode_identically() {
        let from_string = SecretPayload::from_string(SECRET).decode("s").unwrap();
        let from_binary = SecretPayload::from_binary(SECRET.as_bytes()).decode("s").unwrap();

        assert_eq!(from_string, from_binary);
        assert_eq!(from_string.port, 3306);
        assert_eq!(from_string.db_cluster_identifier.as_deref(), Some("develop-cluster"));
        assert_eq!(from_string.db_instance_identifier, None);
    }

    #[test]
    fn test_empty_payload_is_decode_error() {
        let err = SecretPayload::default().decode("mysqlSecretDevelop").unwrap_err();
        assert!(matches!(err, StackflowError::SecretDecode { ref name, .. } if name == "mysqlSecretDevelop"));
        assert!(err.is_structural());
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let err = SecretPayload::from_string("{\"username\": ").decode("s").unwrap_err();
        assert!(matches!(err, StackflowError::SecretDecode { .. }));
    }

    #[test]
    fn test_invalid_utf8_binary() {
        let err = SecretPayload::from_binary(vec![0xff, 0xfe]).decode("s").unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let secret = SecretPayload::from_string(SECRET).decode("s").unwrap();
        let debug = format!("{secret:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("mysqlUserDevelop"));
    }
}
