//! Provisioning through an external command-line tool.

use super::Provisioner;
use crate::config::{DeployTool, Redacted, Settings, ENV_LIBRARY_TOKEN};
use crate::errors::{Result, StackflowError};
use crate::outputs::{OutputDocument, OutputRecord};
use crate::stacks::StackTemplate;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Directory under the repository root holding synthesized manifests.
pub const STATE_DIR: &str = ".stackflow";

const STDERR_TAIL_LINES: usize = 40;

/// Runs the configured deploy tool once per stack from the repository root,
/// waiting for it to exit.
#[derive(Debug, Clone)]
pub struct CommandProvisioner {
    tool: DeployTool,
    workdir: PathBuf,
    library_token: Redacted,
}

impl CommandProvisioner {
    /// Creates a provisioner from resolved settings.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            tool: settings.deploy_tool.clone(),
            workdir: settings.workdir.clone(),
            library_token: settings.library_token.clone(),
        }
    }

    /// Replaces the tool.
    #[must_use]
    pub fn with_tool(mut self, tool: DeployTool) -> Self {
        self.tool = tool;
        self
    }

    fn template_path(&self, template: &StackTemplate) -> PathBuf {
        self.workdir
            .join(STATE_DIR)
            .join(format!("{}.template.json", template.stack_id))
    }

    fn outputs_path(&self, template: &StackTemplate) -> PathBuf {
        self.workdir.join(Self::substitute(&self.tool.outputs_file, template))
    }

    fn substitute(text: &str, template: &StackTemplate) -> String {
        text.replace("{workspace}", template.kind.workspace_dir())
            .replace("{stack}", &template.stack_id)
    }

    async fn write_template(&self, template: &StackTemplate) -> Result<PathBuf> {
        let path = self.template_path(template);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, template.to_json()?).await?;
        debug!(path = %path.display(), "Wrote stack manifest");
        Ok(path)
    }

    fn render_args(
        args: &[String],
        template: &StackTemplate,
        manifest: &Path,
        outputs: &Path,
    ) -> Vec<String> {
        args.iter()
            .map(|arg| {
                Self::substitute(arg, template)
                    .replace("{template}", &manifest.display().to_string())
                    .replace("{outputs}", &outputs.display().to_string())
            })
            .collect()
    }

    async fn run(&self, args: Vec<String>, template: &StackTemplate) -> Result<()> {
        let mut command = Command::new(&self.tool.program);
        command
            .args(&args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped());

        for var in template.build_env() {
            if var == ENV_LIBRARY_TOKEN {
                command.env(&var, self.library_token.expose());
            }
        }

        info!(
            program = %self.tool.program,
            stack_id = %template.stack_id,
            "Running provisioning tool"
        );
        let output = command.spawn()?.wait_with_output().await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(target: "stackflow::provision::tool", "{}", line);
        }

        if output.status.success() {
            return Ok(());
        }

        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        Err(StackflowError::CommandFailed {
            program: self.tool.program.clone(),
            status: output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |code| code.to_string()),
            stderr: tail,
        })
    }
}

#[async_trait]
impl Provisioner for CommandProvisioner {
    #[instrument(skip(self, template), fields(stack_id = %template.stack_id))]
    async fn deploy(&self, template: &StackTemplate) -> Result<OutputRecord> {
        let manifest = self.write_template(template).await?;
        let outputs = self.outputs_path(template);
        if outputs.exists() {
            tokio::fs::remove_file(&outputs).await?;
        }

        let args = Self::render_args(&self.tool.deploy_args, template, &manifest, &outputs);
        self.run(args, template).await?;

        if !outputs.exists() {
            return Err(StackflowError::provision(
                &template.stack_id,
                format!("tool wrote no outputs file at {}", outputs.display()),
            ));
        }
        let json = tokio::fs::read_to_string(&outputs).await?;
        let document = OutputDocument::parse(&json, &outputs.display().to_string())?;
        let record = document
            .stacks
            .get(&template.stack_id)
            .cloned()
            .unwrap_or_default();

        info!(outputs = record.len(), "Stack deployed");
        Ok(record)
    }

    #[instrument(skip(self, template), fields(stack_id = %template.stack_id))]
    async fn destroy(&self, template: &StackTemplate) -> Result<()> {
        let manifest = self.write_template(template).await?;
        let outputs = self.outputs_path(template);
        let args = Self::render_args(&self.tool.destroy_args, template, &manifest, &outputs);
        self.run(args, template).await?;
        info!("Stack destroyed");
        Ok(())
    }
}
