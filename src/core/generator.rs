use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use uuid::Uuid;

use super::diagram::DiagramRequest;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("could not write diagram input: {0}")]
    Input(#[source] std::io::Error),
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("could not move diagram into place: {0}")]
    Finalize(#[source] std::io::Error),
    #[error("{program} produced an empty diagram")]
    Empty { program: String },
}

/// Renders a diagram description into an image file.
///
/// On success a complete image must exist at [`DiagramRequest::output_path`].
/// On failure nothing may be left at that path that could be served.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, diagram: &DiagramRequest) -> Result<(), GenerateError>;
}

/// Generator backed by the mermaid command line renderer.
#[derive(Debug, Clone)]
pub struct MermaidCli {
    program: OsString,
    args: Vec<OsString>,
    puppeteer_config: Option<PathBuf>,
}

impl MermaidCli {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            puppeteer_config: None,
        }
    }

    /// Builds a generator from a command line such as `npx -y mmdc`.
    /// The first word is the program, the rest are passed before any
    /// render arguments.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace();
        let program = words.next()?;
        let mut cli = Self::new(program);
        cli.args = words.map(OsString::from).collect();
        Some(cli)
    }

    pub fn with_puppeteer_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.puppeteer_config = Some(path.into());
        self
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn render_args(&self, input: &Path, output: &Path, diagram: &DiagramRequest) -> Vec<OsString> {
        let mut args = self.args.clone();
        if let Some(config) = &self.puppeteer_config {
            args.push("--puppeteerConfigFile".into());
            args.push(config.into());
        }
        args.push("-i".into());
        args.push(input.into());
        args.push("-o".into());
        args.push(output.into());
        args.push("--scale".into());
        args.push(diagram.scale().to_string().into());
        args
    }
}

#[async_trait]
impl Generator for MermaidCli {
    async fn generate(&self, diagram: &DiagramRequest) -> Result<(), GenerateError> {
        let dir = diagram.output_dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(GenerateError::Input)?;

        // mmdc picks the format from the output extension, so the temporary
        // file keeps it
        let nonce = Uuid::new_v4().simple().to_string();
        let input = dir.join(format!("{}.{nonce}.mmd", diagram.id()));
        let staging = dir.join(format!(
            "{}.{nonce}.{}",
            diagram.id(),
            diagram.image_type().extension()
        ));

        tokio::fs::write(&input, diagram.description())
            .await
            .map_err(GenerateError::Input)?;

        tracing::debug!(
            id = diagram.id(),
            image_type = %diagram.image_type(),
            scale = diagram.scale().get(),
            "running {}",
            self.program_name()
        );
        let output = Command::new(&self.program)
            .args(self.render_args(&input, &staging, diagram))
            .stdin(Stdio::null())
            .output()
            .await;

        remove_quietly(&input).await;

        let output = output.map_err(|source| GenerateError::Spawn {
            program: self.program_name(),
            source,
        })?;

        if !output.status.success() {
            remove_quietly(&staging).await;
            return Err(GenerateError::Failed {
                program: self.program_name(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if tokio::fs::metadata(&staging)
            .await
            .is_ok_and(|metadata| metadata.len() == 0)
        {
            remove_quietly(&staging).await;
            return Err(GenerateError::Empty {
                program: self.program_name(),
            });
        }

        if let Err(e) = tokio::fs::rename(&staging, diagram.output_path()).await {
            remove_quietly(&staging).await;
            return Err(GenerateError::Finalize(e));
        }

        Ok(())
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove {}: {}", path.display(), e);
        }
    }
}
