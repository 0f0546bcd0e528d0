//! Create-if-absent schema application and the post-deploy migration hook.

use super::session::{SchemaSession, SessionConnector};
use super::table::{example_table, TableSchema};
use crate::core::DeploymentEnvironment;
use crate::errors::Result;
use crate::events::{EventSink, SCHEMA_APPLIED};
use crate::outputs::OutputRecord;
use crate::secrets::CredentialResolver;
use crate::sequencer::PostDeployHook;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Which tables an application created and which were already there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Tables created by this application.
    pub created: Vec<String>,
    /// Tables that already existed and were left untouched.
    pub existing: Vec<String>,
}

/// Ensures a fixed set of tables exists.
///
/// Never drops or recreates a table; existing data is preserved.
#[derive(Debug, Clone)]
pub struct SchemaApplicator {
    tables: Vec<TableSchema>,
}

impl Default for SchemaApplicator {
    fn default() -> Self {
        Self::new(vec![example_table()])
    }
}

impl SchemaApplicator {
    /// Creates an applicator for the given tables.
    #[must_use]
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    /// The managed tables.
    #[must_use]
    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    /// Applies the schema and closes the session whatever the outcome.
    ///
    /// A close failure is returned only when the apply itself succeeded.
    pub async fn apply(&self, mut session: Box<dyn SchemaSession>) -> Result<ApplyReport> {
        let outcome = self.ensure_tables(session.as_mut()).await;
        let closed = session.close().await;

        match (outcome, closed) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "Failed to close database session");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }

    async fn ensure_tables(&self, session: &mut dyn SchemaSession) -> Result<ApplyReport> {
        let dialect = session.dialect();
        let mut report = ApplyReport::default();

        for table in &self.tables {
            if session.table_exists(&table.name).await? {
                info!(table = %table.name, "Table already exists");
                report.existing.push(table.name.clone());
                continue;
            }
            session.execute(&table.create_if_absent_sql(dialect)).await?;
            info!(table = %table.name, "Created table");
            report.created.push(table.name.clone());
        }

        Ok(report)
    }
}

/// Brings an environment's database schema up to date after its
/// infrastructure is deployed.
#[derive(Clone)]
pub struct SchemaMigration {
    resolver: CredentialResolver,
    connector: Arc<dyn SessionConnector>,
    applicator: SchemaApplicator,
}

impl std::fmt::Debug for SchemaMigration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaMigration")
            .field("applicator", &self.applicator)
            .finish_non_exhaustive()
    }
}

impl SchemaMigration {
    /// Creates a migration with the default table set.
    #[must_use]
    pub fn new(resolver: CredentialResolver, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            resolver,
            connector,
            applicator: SchemaApplicator::default(),
        }
    }

    /// Replaces the table set.
    #[must_use]
    pub fn with_applicator(mut self, applicator: SchemaApplicator) -> Self {
        self.applicator = applicator;
        self
    }

    /// Resolves the environment's secret, connects and applies the schema.
    #[instrument(skip(self), fields(environment = %environment))]
    pub async fn migrate(&self, environment: &DeploymentEnvironment) -> Result<ApplyReport> {
        let secret = self
            .resolver
            .resolve(&environment.database_secret_name())
            .await?;
        let session = self.connector.connect(&secret).await?;
        self.applicator.apply(session).await
    }
}

#[async_trait]
impl PostDeployHook for SchemaMigration {
    fn name(&self) -> &str {
        "schema-migration"
    }

    async fn after_deploy(
        &self,
        environment: &DeploymentEnvironment,
        _outputs: &OutputRecord,
        sink: &dyn EventSink,
    ) -> Result<()> {
        let report = self.migrate(environment).await?;
        sink.emit(
            SCHEMA_APPLIED,
            Some(serde_json::json!({
                "environment": environment.as_str(),
                "created": report.created,
                "existing": report.existing,
            })),
        );
        Ok(())
    }
}
