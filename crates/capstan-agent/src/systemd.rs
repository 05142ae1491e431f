#![forbid(unsafe_code)]

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::error::{AgentError, AgentResult};

/// Init-system operations the apply pipeline needs.
#[async_trait]
pub trait ServiceController: Send + Sync {
    /// Reload unit definitions.
    async fn daemon_reload(&self) -> AgentResult<()>;

    /// Restart `unit`, replacing any conflicting queued job.
    async fn restart_unit(&self, unit: &str) -> AgentResult<()>;
}

/// Drives systemd through `systemctl`.
///
/// Restart uses `--job-mode=replace`, matching the replace-on-conflict
/// semantics of the D-Bus RestartUnit call.
#[derive(Clone, Debug, Default)]
pub struct SystemctlController;

impl SystemctlController {
    async fn run(&self, args: &[&str]) -> AgentResult<()> {
        let output = Command::new("systemctl")
            .args(args)
            .output()
            .await
            .map_err(|e| AgentError::Restart(format!("failed to spawn systemctl: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::Restart(format!(
                "systemctl {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceController for SystemctlController {
    async fn daemon_reload(&self) -> AgentResult<()> {
        self.run(&["daemon-reload"]).await
    }

    async fn restart_unit(&self, unit: &str) -> AgentResult<()> {
        self.run(&["restart", "--job-mode=replace", unit]).await?;
        info!(unit, "restart job queued");
        Ok(())
    }
}
