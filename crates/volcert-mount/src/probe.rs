//! Filesystem behaviour probes run against a driver-provided mount.
//!
//! - [`write_read_delete`] checks a read-write mount end to end: write a
//!   uniquely named file, see it through a glob, read it back byte for byte,
//!   delete it, and see it disappear.
//! - [`read_only`] checks that a read-only mount refuses writes with a
//!   read-only filesystem error, and not some other failure.
//!
//! Both use plain host filesystem calls, so they observe exactly what a
//! workload in a container would.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::naming::{NameGenerator, DEFAULT_PREFIX, DEFAULT_SUFFIX_LENGTH};

/// Content written by both probes.
pub const DEFAULT_CONTENT: &str = "hello persi";

/// Message fragment the platform reports for writes on a read-only mount.
pub const READ_ONLY_MESSAGE: &str = "read-only file system";

/// Mode for probe files.
const PROBE_FILE_MODE: u32 = 0o644;

/// Probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// File name prefix
    pub prefix: String,
    /// Number of random letters after the prefix
    pub suffix_length: usize,
    /// Bytes written to the probe file
    pub content: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            suffix_length: DEFAULT_SUFFIX_LENGTH,
            content: DEFAULT_CONTENT.to_string(),
        }
    }
}

/// Which probe a scenario runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// Write/read/delete must succeed
    ReadWrite,
    /// Writes must fail with a read-only filesystem error
    ReadOnly,
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadWrite => f.write_str("read-write"),
            Self::ReadOnly => f.write_str("read-only"),
        }
    }
}

/// Probe failures.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// A filesystem operation that should have worked did not
    #[error("failed to {operation} {}: {source}", path.display())]
    Io {
        /// What was being attempted ("write", "read", "delete")
        operation: &'static str,
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The glob pattern could not be built or walked
    #[error("failed to glob {pattern}: {detail}")]
    Glob {
        /// Pattern used
        pattern: String,
        /// Error detail
        detail: String,
    },

    /// Glob found the wrong number of entries
    #[error("expected {expected} match(es) for {pattern}, found {found}")]
    MatchCount {
        /// Pattern used
        pattern: String,
        /// Expected count
        expected: usize,
        /// Observed count
        found: usize,
    },

    /// Read-back differs in length
    #[error("{}: size mismatch - expected {expected} bytes, got {actual} bytes", path.display())]
    SizeMismatch {
        /// File involved
        path: PathBuf,
        /// Bytes written
        expected: usize,
        /// Bytes read back
        actual: usize,
    },

    /// Read-back differs in content
    #[error(
        "{}: content mismatch at byte {offset} - expected 0x{expected:02x}, got 0x{actual:02x}",
        path.display()
    )]
    ContentMismatch {
        /// File involved
        path: PathBuf,
        /// First differing offset
        offset: usize,
        /// Byte written
        expected: u8,
        /// Byte read back
        actual: u8,
    },

    /// A write on a read-only mount succeeded
    #[error("write to {} succeeded on a mount that should be read-only", path.display())]
    WriteSucceeded {
        /// File that was written
        path: PathBuf,
    },

    /// A write on a read-only mount failed for some other reason
    #[error(
        "write to {} failed with `{message}`, expected a \"{READ_ONLY_MESSAGE}\" error",
        path.display()
    )]
    UnexpectedWriteError {
        /// File involved
        path: PathBuf,
        /// Reported error
        message: String,
    },
}

impl ProbeError {
    /// True for data-integrity failures (wrong bytes or wrong glob counts).
    pub fn is_content_mismatch(&self) -> bool {
        matches!(
            self,
            Self::MatchCount { .. } | Self::SizeMismatch { .. } | Self::ContentMismatch { .. }
        )
    }

    /// True when a read-only mount did not behave as read-only.
    pub fn is_read_only_violation(&self) -> bool {
        matches!(
            self,
            Self::WriteSucceeded { .. } | Self::UnexpectedWriteError { .. }
        )
    }
}

/// What a successful probe touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Probe that ran
    pub mode: AccessMode,
    /// Full path of the probe file
    pub path: PathBuf,
    /// Number of bytes written (read-write only)
    pub bytes: usize,
}

/// Whether `err` is the platform's read-only filesystem error.
pub fn is_read_only_error(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::ReadOnlyFilesystem
        || err.to_string().to_lowercase().contains(READ_ONLY_MESSAGE)
}

/// Run the probe for `mode`.
pub fn run_probe(
    mode: AccessMode,
    mountpoint: &Path,
    names: &mut NameGenerator,
    config: &ProbeConfig,
) -> Result<ProbeReport, ProbeError> {
    match mode {
        AccessMode::ReadWrite => write_read_delete(mountpoint, names, config),
        AccessMode::ReadOnly => read_only(mountpoint, names, config),
    }
}

/// Write, list, read back and delete a uniquely named file.
pub fn write_read_delete(
    mountpoint: &Path,
    names: &mut NameGenerator,
    config: &ProbeConfig,
) -> Result<ProbeReport, ProbeError> {
    let span = info_span!("test-file-write");
    let _enter = span.enter();
    info!("start");

    let file_name = names.file_name(&config.prefix, config.suffix_length);
    let test_file = mountpoint.join(&file_name);
    let content = config.content.as_bytes();

    info!(mountpoint = %mountpoint.display(), "writing-test-file");
    info!(filepath = %test_file.display(), "writing-test-file");
    write_file(&test_file, content).map_err(|source| ProbeError::Io {
        operation: "write",
        path: test_file.clone(),
        source,
    })?;

    removing_on_error(
        &test_file,
        check_and_delete(mountpoint, &file_name, &test_file, content),
    )?;

    info!("end");
    Ok(ProbeReport {
        mode: AccessMode::ReadWrite,
        path: test_file,
        bytes: content.len(),
    })
}

fn check_and_delete(
    mountpoint: &Path,
    file_name: &str,
    test_file: &Path,
    content: &[u8],
) -> Result<(), ProbeError> {
    expect_matches(mountpoint, file_name, 1)?;

    let read_back = std::fs::read(test_file).map_err(|source| ProbeError::Io {
        operation: "read",
        path: test_file.to_path_buf(),
        source,
    })?;
    compare_bytes(test_file, &read_back, content)?;

    std::fs::remove_file(test_file).map_err(|source| ProbeError::Io {
        operation: "delete",
        path: test_file.to_path_buf(),
        source,
    })?;

    expect_matches(mountpoint, file_name, 0)
}

/// Attempt a write and require a read-only filesystem error.
pub fn read_only(
    mountpoint: &Path,
    names: &mut NameGenerator,
    config: &ProbeConfig,
) -> Result<ProbeReport, ProbeError> {
    let span = info_span!("test-read-only");
    let _enter = span.enter();
    info!("start");

    let file_name = names.file_name(&config.prefix, config.suffix_length);
    let test_file = mountpoint.join(&file_name);

    info!(mountpoint = %mountpoint.display(), "writing-test-file");
    info!(filepath = %test_file.display(), "writing-test-file");
    let write = write_file(&test_file, config.content.as_bytes());
    let result = classify_read_only_write(test_file, write);

    info!("end");
    result
}

/// Judge a write attempted on a mount that should be read-only.
///
/// Only a read-only filesystem error passes. A write that went through is
/// removed again before the violation is reported.
pub fn classify_read_only_write(
    test_file: PathBuf,
    write: std::io::Result<()>,
) -> Result<ProbeReport, ProbeError> {
    match write {
        Ok(()) => {
            remove_stray_file(&test_file);
            Err(ProbeError::WriteSucceeded { path: test_file })
        }
        Err(e) if is_read_only_error(&e) => Ok(ProbeReport {
            mode: AccessMode::ReadOnly,
            path: test_file,
            bytes: 0,
        }),
        Err(e) => Err(ProbeError::UnexpectedWriteError {
            path: test_file,
            message: e.to_string(),
        }),
    }
}

/// Pass `result` through, removing `path` first if it is an error.
fn removing_on_error<T>(path: &Path, result: Result<T, ProbeError>) -> Result<T, ProbeError> {
    if result.is_err() {
        remove_stray_file(path);
    }
    result
}

fn remove_stray_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(filepath = %path.display(), error = %e, "failed to remove stray probe file"),
    }
}

fn write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(PROBE_FILE_MODE)
        .open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

fn expect_matches(mountpoint: &Path, file_name: &str, expected: usize) -> Result<(), ProbeError> {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&mountpoint.to_string_lossy()),
        glob::Pattern::escape(file_name)
    );
    let paths = glob::glob(&pattern).map_err(|e| ProbeError::Glob {
        pattern: pattern.clone(),
        detail: e.to_string(),
    })?;

    let mut found = 0;
    for entry in paths {
        entry.map_err(|e| ProbeError::Glob {
            pattern: pattern.clone(),
            detail: e.to_string(),
        })?;
        found += 1;
    }

    if found == expected {
        Ok(())
    } else {
        Err(ProbeError::MatchCount {
            pattern,
            expected,
            found,
        })
    }
}

fn compare_bytes(path: &Path, actual: &[u8], expected: &[u8]) -> Result<(), ProbeError> {
    if actual.len() != expected.len() {
        return Err(ProbeError::SizeMismatch {
            path: path.to_path_buf(),
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    match actual.iter().zip(expected).position(|(a, e)| a != e) {
        Some(offset) => Err(ProbeError::ContentMismatch {
            path: path.to_path_buf(),
            offset,
            expected: expected[offset],
            actual: actual[offset],
        }),
        None => Ok(()),
    }
}
