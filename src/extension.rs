/// Optional install of the packaged editor extension before code-server starts.
use crate::config::EXTENSION_ASSET;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Installer invocation: `<program> --install-extension <asset>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInstaller {
    pub program: String,
    pub asset: PathBuf,
}

/// What the install step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// No asset on disk, installer not invoked.
    Skipped,
    Installed,
    /// Installer could not be run or exited unsuccessfully.
    Failed(String),
}

impl Default for ExtensionInstaller {
    fn default() -> Self {
        Self {
            program: "code-server".to_string(),
            asset: PathBuf::from(EXTENSION_ASSET),
        }
    }
}

impl ExtensionInstaller {
    pub fn new(program: impl Into<String>, asset: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            asset: asset.as_ref().to_path_buf(),
        }
    }

    /// Run the installer to completion if the asset exists.
    ///
    /// The installer's output goes straight to the supervisor's stdout/stderr.
    /// Failure is logged and reported, never propagated.
    pub async fn install(&self) -> InstallOutcome {
        if !self.asset.exists() {
            tracing::info!(
                asset = %self.asset.display(),
                "no extension found, skipping extension install"
            );
            return InstallOutcome::Skipped;
        }

        tracing::info!(asset = %self.asset.display(), "installing extension");
        let status = Command::new(&self.program)
            .arg("--install-extension")
            .arg(&self.asset)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                tracing::info!(asset = %self.asset.display(), "extension installed");
                InstallOutcome::Installed
            }
            Ok(status) => {
                let reason = format!("{} exited with {}", self.program, status);
                tracing::warn!("failed to install extension: {reason}");
                InstallOutcome::Failed(reason)
            }
            Err(e) => {
                let reason = format!("failed to run {}: {}", self.program, e);
                tracing::warn!("failed to install extension: {reason}");
                InstallOutcome::Failed(reason)
            }
        }
    }
}
