//! Shallow git clones through the `git` binary

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{RepoError, Result};

pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct GitCloner {
    binary: PathBuf,
    timeout: Duration,
}

impl Default for GitCloner {
    fn default() -> Self {
        Self::new("git", DEFAULT_GIT_TIMEOUT)
    }
}

impl GitCloner {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Depth-1, single-branch clone of `reference` into `dest`
    ///
    /// The child process is killed when the deadline passes or `cancel`
    /// fires; `dest` may then hold a partial checkout.
    pub async fn shallow_clone(
        &self,
        url: &str,
        reference: Option<&str>,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut command = Command::new(&self.binary);
        command
            .args(["clone", "--depth", "1", "--single-branch"])
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(reference) = reference {
            command.args(["--branch", reference]);
        }
        command.arg("--").arg(url).arg(dest);

        tracing::info!(url = %url, reference = reference.unwrap_or("HEAD"), "cloning chart repository");

        let child = command.spawn().map_err(|e| RepoError::GitFailed {
            url: url.to_string(),
            message: format!("cannot run {}: {e}", self.binary.display()),
        })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = cancel.cancelled() => return Err(RepoError::Cancelled),
            _ = tokio::time::sleep(self.timeout) => {
                return Err(RepoError::Timeout {
                    operation: format!("git clone of {url}"),
                    after: format!("{:?}", self.timeout),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("git exited with {}", output.status),
                text => text.lines().last().unwrap_or(text).to_string(),
            };
            return Err(RepoError::GitFailed {
                url: url.to_string(),
                message,
            });
        }

        tracing::debug!(url = %url, dest = %dest.display(), "clone finished");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Fake `git` that records its arguments and creates the destination
    fn fake_git(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-git");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_clone_arguments() {
        let tools = tempfile::tempdir().unwrap();
        let log = tools.path().join("args");
        let git = fake_git(
            tools.path(),
            &format!("echo \"$@\" > {}\nfor last; do :; done\nmkdir -p \"$last\"", log.display()),
        );

        let dest = tools.path().join("clone");
        GitCloner::new(git, Duration::from_secs(10))
            .shallow_clone("https://git.example.com/charts.git", Some("v1.2.0"), &dest, &CancellationToken::new())
            .await
            .unwrap();

        let args = std::fs::read_to_string(&log).unwrap();
        assert_eq!(
            args.trim(),
            format!(
                "clone --depth 1 --single-branch --branch v1.2.0 -- https://git.example.com/charts.git {}",
                dest.display()
            )
        );
        assert!(dest.is_dir());
    }

    #[tokio::test]
    async fn test_clone_failure_reports_stderr() {
        let tools = tempfile::tempdir().unwrap();
        let git = fake_git(
            tools.path(),
            "echo 'Cloning...' >&2\necho 'fatal: repository not found' >&2\nexit 128",
        );

        let err = GitCloner::new(git, Duration::from_secs(10))
            .shallow_clone("https://x/y.git", None, &tools.path().join("d"), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            RepoError::GitFailed { message, .. } => {
                assert_eq!(message, "fatal: repository not found")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_clone_deadline() {
        let tools = tempfile::tempdir().unwrap();
        let git = fake_git(tools.path(), "sleep 30");

        let err = GitCloner::new(git, Duration::from_millis(200))
            .shallow_clone("https://x/y.git", None, &tools.path().join("d"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_clone_cancelled() {
        let tools = tempfile::tempdir().unwrap();
        let git = fake_git(tools.path(), "sleep 30");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = GitCloner::new(git, Duration::from_secs(30))
            .shallow_clone("https://x/y.git", None, &tools.path().join("d"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let err = GitCloner::new("/nonexistent/git", Duration::from_secs(1))
            .shallow_clone("https://x/y.git", None, Path::new("/tmp/unused"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::GitFailed { .. }));
    }
}
