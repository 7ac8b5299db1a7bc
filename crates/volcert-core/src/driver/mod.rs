//! The volume driver control protocol.
//!
//! [`VolumeDriver`] is the only way the orchestrator talks to a driver. Every
//! failure, including transport problems, comes back as a non-empty `Err` in
//! the reply so the orchestrator sees a single contract.

mod http;

pub use http::{DriverClientError, RemoteClient, DEFAULT_REQUEST_TIMEOUT};

use crate::request::{
    CreateRequest, ErrorResponse, MountRequest, MountResponse, RemoveRequest, UnmountRequest,
};

/// A driver under certification.
pub trait VolumeDriver {
    /// Provision a volume.
    fn create(&self, request: &CreateRequest) -> ErrorResponse;

    /// Mount a provisioned volume and return its host path.
    fn mount(&self, request: &MountRequest) -> MountResponse;

    /// Release a mount.
    fn unmount(&self, request: &UnmountRequest) -> ErrorResponse;

    /// Destroy a volume.
    fn remove(&self, request: &RemoveRequest) -> ErrorResponse;
}
