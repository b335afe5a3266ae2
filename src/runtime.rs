use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to write output {name} to {}: {source}", path.display())]
    Output {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Channel back to whatever launched the run: progress lines, the failure
/// message, and named outputs.
pub trait ActionRuntime: Send + Sync {
    fn info(&self, message: &str);

    /// Mark the run as failed with a human-readable message.
    fn fail(&self, message: &str);

    fn set_output(&self, name: &str, value: &str) -> Result<(), RuntimeError>;

    /// Keep `secret` out of anything the runner displays.
    fn mask(&self, _secret: &str) {}
}

/// Workflow-command runtime for GitHub Actions.
#[derive(Debug, Default)]
pub struct GithubActionsRuntime {
    output_path: Option<PathBuf>,
}

impl GithubActionsRuntime {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    /// Outputs go to the file named by `GITHUB_OUTPUT`, when set.
    pub fn from_env() -> Self {
        Self::new(std::env::var_os("GITHUB_OUTPUT").map(PathBuf::from))
    }
}

impl ActionRuntime for GithubActionsRuntime {
    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn fail(&self, message: &str) {
        println!("::error::{}", escape_command_data(message));
    }

    fn set_output(&self, name: &str, value: &str) -> Result<(), RuntimeError> {
        let Some(path) = &self.output_path else {
            info!(name, value, "output");
            return Ok(());
        };

        let to_error = |source| RuntimeError::Output {
            name: name.to_string(),
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(to_error)?;
        file.write_all(format_output(name, value).as_bytes())
            .map_err(to_error)?;
        debug!(name, path = %path.display(), "wrote output");
        Ok(())
    }

    fn mask(&self, secret: &str) {
        if !secret.is_empty() {
            println!("::add-mask::{}", escape_command_data(secret));
        }
    }
}

/// `GITHUB_OUTPUT` entry; multi-line values use the heredoc form.
fn format_output(name: &str, value: &str) -> String {
    if value.contains('\n') {
        let delimiter = "ghadelimiter_pr_notion_sync";
        format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
    } else {
        format!("{name}={value}\n")
    }
}

fn escape_command_data(data: &str) -> String {
    data.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
