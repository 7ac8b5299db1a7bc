//! Certification failure types.

use std::fmt;

use serde::{Deserialize, Serialize};
use volcert_mount::{HostCheckError, ProbeError};

/// Lifecycle step a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// `VolumeDriver.Create`
    Create,
    /// `VolumeDriver.Mount`
    Mount,
    /// Host mount-table cross-check
    HostCheck,
    /// Filesystem behaviour probe
    Probe,
    /// `VolumeDriver.Unmount`
    Unmount,
    /// `VolumeDriver.Remove`
    Remove,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Mount => "mount",
            Self::HostCheck => "host-check",
            Self::Probe => "probe",
            Self::Unmount => "unmount",
            Self::Remove => "remove",
        })
    }
}

/// Broad category of a failure, used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The driver returned a non-empty error
    Protocol,
    /// The driver's claims disagree with what the host observes
    ConsistencyViolation,
    /// Data read back differs from what was written
    ContentMismatch,
    /// A read-only mount accepted a write, or refused it for the wrong reason
    ReadOnlyViolation,
    /// The harness or host environment failed, not the driver
    Infrastructure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Protocol => "protocol",
            Self::ConsistencyViolation => "consistency-violation",
            Self::ContentMismatch => "content-mismatch",
            Self::ReadOnlyViolation => "read-only-violation",
            Self::Infrastructure => "infrastructure",
        })
    }
}

/// A failed certification step.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    /// Driver reported an error
    #[error("{operation} of `{volume}` failed: {message}")]
    Protocol {
        /// Operation that failed
        operation: Stage,
        /// Volume name
        volume: String,
        /// Driver error text
        message: String,
    },

    /// Mount succeeded without naming a mount point
    #[error("mount of `{volume}` reported success with an empty mountpoint")]
    MissingMountpoint {
        /// Volume name
        volume: String,
    },

    /// Host verification failed
    #[error(transparent)]
    HostCheck(#[from] HostCheckError),

    /// Probe failed
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

impl CertError {
    /// Failure category.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Protocol { .. } => FailureKind::Protocol,
            Self::MissingMountpoint { .. } => FailureKind::ConsistencyViolation,
            Self::HostCheck(e) if e.is_consistency_violation() => FailureKind::ConsistencyViolation,
            Self::Probe(e) if e.is_content_mismatch() => FailureKind::ContentMismatch,
            Self::Probe(e) if e.is_read_only_violation() => FailureKind::ReadOnlyViolation,
            Self::HostCheck(_) | Self::Probe(_) => FailureKind::Infrastructure,
        }
    }

    pub(crate) fn protocol(operation: Stage, volume: &str, message: impl Into<String>) -> Self {
        Self::Protocol {
            operation,
            volume: volume.to_string(),
            message: message.into(),
        }
    }
}
