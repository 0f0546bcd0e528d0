//! Logging initialization and span helpers for deployment runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Selects JSON output when set to `json`.
pub const ENV_LOG_FORMAT: &str = "STACKFLOW_LOG_FORMAT";

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Reads the format from [`ENV_LOG_FORMAT`].
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(ENV_LOG_FORMAT)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    /// Parses a format name; anything but `json` is text.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` controls levels and defaults to `info`. Later calls are no-ops.
pub fn init_tracing(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json().with_target(false))
                    .init();
            }
            LogFormat::Text => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_target(false))
                    .init();
            }
        }
    });
}

/// Attributes recorded for one workspace step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSpanAttributes {
    /// Run identifier shared by every step of one invocation.
    pub run_id: Option<String>,
    /// Workspace name.
    pub workspace: String,
    /// `deploy` or `destroy`.
    pub action: Option<String>,
    /// Deployment environment tag.
    pub environment: Option<String>,
    /// Final status.
    pub status: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
}

impl WorkspaceSpanAttributes {
    /// Creates attributes for a workspace.
    #[must_use]
    pub fn new(workspace: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            ..Default::default()
        }
    }

    /// Sets the run identifier.
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Sets the action.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Sets the environment tag.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Sets the final status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Flattens the attributes into dotted keys for event payloads.
    #[must_use]
    pub fn to_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        attrs.insert("workspace.name".to_string(), self.workspace.clone());

        if let Some(ref v) = self.run_id {
            attrs.insert("run.id".to_string(), v.clone());
        }
        if let Some(ref v) = self.action {
            attrs.insert("run.action".to_string(), v.clone());
        }
        if let Some(ref v) = self.environment {
            attrs.insert("deployment.environment".to_string(), v.clone());
        }
        if let Some(ref v) = self.status {
            attrs.insert("workspace.status".to_string(), v.clone());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("workspace.duration_ms".to_string(), format!("{v:.1}"));
        }

        attrs
    }
}

/// Span wrapping one workspace step.
#[must_use]
pub fn workspace_span(run_id: &str, workspace: &str, action: &str) -> Span {
    tracing::info_span!("workspace", run_id = run_id, workspace = workspace, action = action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
        assert_eq!(LogFormat::parse(""), LogFormat::Text);
    }

    #[test]
    fn test_workspace_attributes() {
        let attrs = WorkspaceSpanAttributes::new("infrastructure")
            .with_run_id("run-1")
            .with_action("deploy")
            .with_environment("develop")
            .with_status("succeeded")
            .with_duration_ms(12.34)
            .to_attributes();

        assert_eq!(attrs.get("workspace.name"), Some(&"infrastructure".to_string()));
        assert_eq!(attrs.get("run.action"), Some(&"deploy".to_string()));
        assert_eq!(attrs.get("workspace.duration_ms"), Some(&"12.3".to_string()));
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(LogFormat::Text);
        init_tracing(LogFormat::Json);
    }
}
