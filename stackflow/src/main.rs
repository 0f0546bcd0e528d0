//! `stackflow` - deploy or destroy every workspace in order.
//!
//! ```bash
//! stackflow deploy
//! stackflow destroy
//! ```

use anyhow::{ensure, Result};
use clap::Parser;
use std::ffi::OsString;
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

use stackflow::config::Settings;
use stackflow::events::LoggingEventSink;
use stackflow::observability::{init_tracing, LogFormat};
use stackflow::outputs::FileOutputStore;
use stackflow::provision::CommandProvisioner;
use stackflow::schema::{MySqlConnector, SchemaMigration};
use stackflow::secrets::{AwsSecretsClient, CredentialResolver};
use stackflow::sequencer::{standard_workspaces, Action, Sequencer, WorkspaceDeps};

/// Sequenced multi-stack deployment.
#[derive(Debug, Parser)]
#[command(name = "stackflow", version, about)]
struct Cli {
    /// `deploy` or `destroy`.
    command: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing(LogFormat::from_env());

    ExitCode::from(run(std::env::args_os(), execute).await)
}

/// Parses the command line and hands a valid action to `execute`.
///
/// Returns the process exit status. `execute` is never called for an
/// unknown command word.
async fn run<I, T, F, Fut>(args: I, execute: F) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    F: FnOnce(Action) -> Fut,
    Fut: Future<Output = Result<u8>>,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return u8::try_from(e.exit_code()).unwrap_or(1);
        }
    };

    let action = match cli.command.parse::<Action>() {
        Ok(action) => action,
        Err(e) => {
            error!("{e}");
            return 1;
        }
    };

    match execute(action).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            1
        }
    }
}

/// Wires the real clients and runs every workspace.
async fn execute(action: Action) -> Result<u8> {
    let settings = Arc::new(Settings::from_env());
    ensure!(
        settings.workdir.is_dir(),
        "STACKFLOW_WORKDIR {} is not a directory",
        settings.workdir.display()
    );

    let secrets = AwsSecretsClient::for_region(settings.client_region()).await;
    let migration = SchemaMigration::new(
        CredentialResolver::new(Arc::new(secrets)),
        Arc::new(MySqlConnector::new()),
    );

    let deps = WorkspaceDeps {
        settings: Arc::clone(&settings),
        store: Arc::new(FileOutputStore::new(settings.workdir.clone())),
        provisioner: Arc::new(CommandProvisioner::new(&settings)),
        infrastructure_hook: Some(Arc::new(migration)),
    };
    let sequencer = Sequencer::new(standard_workspaces(deps), Arc::new(LoggingEventSink::default()));

    let report = sequencer.run(action).await;
    Ok(report.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_rebuild_fails_without_building_workspaces() {
        let seen = Mutex::new(Vec::new());

        let code = run(["stackflow", "rebuild"], |action| {
            seen.lock().push(action);
            async { Ok::<u8, anyhow::Error>(0) }
        })
        .await;

        assert_eq!(code, 1);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_valid_command_reaches_execute() {
        let seen = Mutex::new(Vec::new());

        let code = run(["stackflow", "destroy"], |action| {
            seen.lock().push(action);
            async { Ok::<u8, anyhow::Error>(0) }
        })
        .await;

        assert_eq!(code, 0);
        assert_eq!(*seen.lock(), vec![Action::Destroy]);
    }

    #[tokio::test]
    async fn test_halted_run_status_is_passed_through() {
        let code = run(["stackflow", "deploy"], |_| async { Ok::<u8, anyhow::Error>(1) }).await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_setup_error_fails() {
        let code = run(["stackflow", "deploy"], |_| async {
            Err::<u8, _>(anyhow::anyhow!("workdir missing"))
        })
        .await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_missing_command_is_usage_error() {
        let code = run(["stackflow"], |_| async { Ok::<u8, anyhow::Error>(0) }).await;
        assert_eq!(code, 2);
    }
}
