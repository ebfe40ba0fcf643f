//! Process execution utilities with timeout support.
//!
//! The only bounded wait in the system is the downloader availability
//! probe; actual downloads run without a timeout.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Run a command to completion with a timeout.
///
/// Returns `Ok(Some(output))` on completion, `Ok(None)` on timeout, and
/// `Err` when the command could not be executed at all.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> std::io::Result<Option<Output>> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(Some(output)),
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_command_completes() {
        let mut cmd = Command::new("true");
        let result = run_with_timeout(&mut cmd, Duration::from_secs(5)).await;
        assert!(matches!(result, Ok(Some(output)) if output.status.success()));
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let mut cmd = Command::new("/nonexistent/definitely-not-a-binary");
        let result = run_with_timeout(&mut cmd, Duration::from_secs(5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_slow_command_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let result = run_with_timeout(&mut cmd, Duration::from_millis(100)).await;
        assert!(matches!(result, Ok(None)));
    }
}
