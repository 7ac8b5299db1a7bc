//! Cross-checking a driver's mount claim against the host.
//!
//! A driver can report a successful Mount while nothing is actually mounted
//! (for example when it only created the directory). Certification therefore
//! asks the operating system directly.
//!
//! Two verifiers are provided:
//!
//! - [`ShellMountCheck`] runs a shell pipeline, by default
//!   `cat /proc/mounts | grep -E '<mountpoint>'`, and treats a non-zero exit as
//!   "not mounted".
//! - [`MountTableCheck`] parses `/proc/mounts` in-process and looks for an
//!   exact mount-point match.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::command::run_with_timeout;
use crate::mount_table::{find_mount, read_mount_table_from, PROC_MOUNTS};

/// Default deadline for a host check.
pub const DEFAULT_HOST_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default shell used for [`ShellMountCheck`].
pub const DEFAULT_SHELL: &str = "bash";

/// Default command template. `{mountpoint}` is replaced with the
/// single-quote-escaped mount path.
pub const DEFAULT_COMMAND: &str = "cat /proc/mounts | grep -E '{mountpoint}'";

const MOUNTPOINT_PLACEHOLDER: &str = "{mountpoint}";

/// Errors from host verification.
#[derive(Debug, thiserror::Error)]
pub enum HostCheckError {
    /// The host does not show a mount at the path the driver returned
    #[error("host mount table has no entry for {}: {detail}", mountpoint.display())]
    NotMounted {
        /// Mount path reported by the driver
        mountpoint: PathBuf,
        /// What the check observed
        detail: String,
    },

    /// The check command could not be started
    #[error("failed to run host check `{command}`: {source}")]
    Spawn {
        /// Rendered command line
        command: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the check command failed
    #[error("failed waiting for host check `{command}`: {source}")]
    Wait {
        /// Rendered command line
        command: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The check command did not finish in time
    #[error("host check `{command}` did not finish within {timeout:?}")]
    TimedOut {
        /// Rendered command line
        command: String,
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// The mount table could not be read
    #[error("failed to read mount table {}: {source}", path.display())]
    MountTable {
        /// Mount table path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl HostCheckError {
    /// True when the host answered and the answer contradicts the driver.
    ///
    /// Everything else is an environment problem.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(self, Self::NotMounted { .. })
    }
}

/// Confirms that the host shows an active mount at a path.
pub trait MountVerifier {
    /// Succeeds when the OS reports a mount at `mountpoint`.
    fn verify(&self, mountpoint: &Path) -> Result<(), HostCheckError>;
}

/// Which verifier to build from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostCheckMode {
    /// Shell pipeline with exit-code semantics
    #[default]
    Shell,
    /// In-process `/proc/mounts` lookup
    MountTable,
}

/// Host verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostCheckConfig {
    /// Verifier implementation
    pub mode: HostCheckMode,
    /// Shell binary for [`HostCheckMode::Shell`]
    pub shell: String,
    /// Command template for [`HostCheckMode::Shell`]
    pub command: String,
    /// Deadline for one check
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HostCheckConfig {
    fn default() -> Self {
        Self {
            mode: HostCheckMode::Shell,
            shell: DEFAULT_SHELL.to_string(),
            command: DEFAULT_COMMAND.to_string(),
            timeout: DEFAULT_HOST_CHECK_TIMEOUT,
        }
    }
}

impl HostCheckConfig {
    /// Build the configured verifier.
    pub fn build(&self) -> Box<dyn MountVerifier> {
        match self.mode {
            HostCheckMode::Shell => Box::new(ShellMountCheck::new(
                self.shell.clone(),
                self.command.clone(),
                self.timeout,
            )),
            HostCheckMode::MountTable => Box::new(MountTableCheck::default()),
        }
    }
}

/// Host check that shells out and inspects the exit code.
#[derive(Debug, Clone)]
pub struct ShellMountCheck {
    shell: String,
    template: String,
    timeout: Duration,
}

impl ShellMountCheck {
    /// Create a check running `template` through `shell -c`.
    pub fn new(shell: impl Into<String>, template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            shell: shell.into(),
            template: template.into(),
            timeout,
        }
    }

    /// Substitute the mount path into the template.
    pub fn render(&self, mountpoint: &Path) -> String {
        let quoted = mountpoint.to_string_lossy().replace('\'', r"'\''");
        self.template.replace(MOUNTPOINT_PLACEHOLDER, &quoted)
    }
}

impl Default for ShellMountCheck {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL, DEFAULT_COMMAND, DEFAULT_HOST_CHECK_TIMEOUT)
    }
}

impl MountVerifier for ShellMountCheck {
    fn verify(&self, mountpoint: &Path) -> Result<(), HostCheckError> {
        let script = self.render(mountpoint);
        let span = info_span!("host-check", mountpoint = %mountpoint.display());
        let _enter = span.enter();

        let mut command = Command::new(&self.shell);
        command.arg("-c").arg(&script);
        let output = run_with_timeout(command, &script, self.timeout)?;

        debug!(
            exit_code = ?output.code(),
            stdout = output.stdout.trim(),
            stderr = output.stderr.trim(),
            "host check finished"
        );

        if output.status.success() {
            Ok(())
        } else {
            Err(HostCheckError::NotMounted {
                mountpoint: mountpoint.to_path_buf(),
                detail: match output.code() {
                    Some(code) => format!("`{script}` exited with status {code}"),
                    None => format!("`{script}` was terminated by a signal"),
                },
            })
        }
    }
}

/// Host check that parses the mount table in-process.
#[derive(Debug, Clone)]
pub struct MountTableCheck {
    table: PathBuf,
}

impl MountTableCheck {
    /// Check against a mount table at a custom location.
    pub fn with_table(table: impl Into<PathBuf>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl Default for MountTableCheck {
    fn default() -> Self {
        Self::with_table(PROC_MOUNTS)
    }
}

impl MountVerifier for MountTableCheck {
    fn verify(&self, mountpoint: &Path) -> Result<(), HostCheckError> {
        let entries = read_mount_table_from(&self.table)?;
        match find_mount(&entries, mountpoint) {
            Some(entry) => {
                debug!(
                    mountpoint = %mountpoint.display(),
                    device = %entry.device,
                    fstype = %entry.fstype,
                    read_only = entry.is_read_only(),
                    "mount table entry found"
                );
                Ok(())
            }
            None => Err(HostCheckError::NotMounted {
                mountpoint: mountpoint.to_path_buf(),
                detail: format!("no entry in {}", self.table.display()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_template() {
        let check = ShellMountCheck::default();
        assert_eq!(
            check.render(Path::new("/var/vcap/data/vol-A")),
            "cat /proc/mounts | grep -E '/var/vcap/data/vol-A'"
        );
    }

    #[test]
    fn test_render_escapes_single_quotes() {
        let check = ShellMountCheck::new("bash", "echo '{mountpoint}'", Duration::from_secs(1));
        assert_eq!(check.render(Path::new("/mnt/it's")), r"echo '/mnt/it'\''s'");
    }

    #[test]
    fn test_shell_check_success() {
        let temp = tempfile::TempDir::new().unwrap();
        let check = ShellMountCheck::new("sh", "test -d '{mountpoint}'", Duration::from_secs(5));
        check.verify(temp.path()).unwrap();
    }

    #[test]
    fn test_shell_check_nonzero_exit_is_consistency_violation() {
        let check = ShellMountCheck::new("sh", "exit 1", Duration::from_secs(5));
        let err = check.verify(Path::new("/mnt/nowhere")).unwrap_err();
        assert!(err.is_consistency_violation());
        assert!(err.to_string().contains("/mnt/nowhere"));
    }

    #[test]
    fn test_shell_check_timeout_is_infrastructure() {
        let check = ShellMountCheck::new("sh", "sleep 30", Duration::from_millis(200));
        let err = check.verify(Path::new("/mnt/slow")).unwrap_err();
        assert!(matches!(err, HostCheckError::TimedOut { .. }));
        assert!(!err.is_consistency_violation());
    }

    #[test]
    fn test_shell_check_missing_shell() {
        let check = ShellMountCheck::new("/nonexistent/shell", "true", Duration::from_secs(1));
        let err = check.verify(Path::new("/mnt")).unwrap_err();
        assert!(matches!(err, HostCheckError::Spawn { .. }));
    }

    #[test]
    fn test_mount_table_check() {
        let table = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            table.path(),
            "//srv/share /mnt/vol\\040A cifs rw 0 0\nnfs:/export /mnt/ro nfs4 ro,relatime 0 0\n",
        )
        .unwrap();
        let check = MountTableCheck::with_table(table.path());

        check.verify(Path::new("/mnt/vol A")).unwrap();
        check.verify(Path::new("/mnt/ro/")).unwrap();
        let err = check.verify(Path::new("/mnt/vol B")).unwrap_err();
        assert!(err.is_consistency_violation());
    }

    #[test]
    fn test_config_defaults() {
        let config = HostCheckConfig::default();
        assert_eq!(config.mode, HostCheckMode::Shell);
        assert_eq!(config.shell, "bash");
        assert_eq!(config.command, DEFAULT_COMMAND);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }
}
