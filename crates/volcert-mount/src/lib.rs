//! Host-side checks for volume driver certification.
//!
//! Everything in this crate runs on the host that the driver mounts into and
//! never talks to the driver itself:
//!
//! - [`MountVerifier`] - confirms the OS mount table agrees with the driver
//!   ([`ShellMountCheck`], [`MountTableCheck`])
//! - [`run_probe`] - exercises a mount for read-write or read-only behaviour
//! - [`NameGenerator`] - per-run source of unique probe file names
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use volcert_mount::{
//!     run_probe, AccessMode, MountVerifier, NameGenerator, ProbeConfig, ShellMountCheck,
//! };
//!
//! let mountpoint = Path::new("/var/vcap/data/volumes/smb/vol-A");
//! ShellMountCheck::default().verify(mountpoint)?;
//!
//! let mut names = NameGenerator::from_time();
//! run_probe(AccessMode::ReadWrite, mountpoint, &mut names, &ProbeConfig::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod command;
mod host_check;
pub mod mount_table;
mod naming;
mod probe;

pub use command::{run_with_timeout, CommandOutput};
pub use host_check::{
    HostCheckConfig, HostCheckError, HostCheckMode, MountTableCheck, MountVerifier,
    ShellMountCheck, DEFAULT_COMMAND, DEFAULT_HOST_CHECK_TIMEOUT, DEFAULT_SHELL,
};
pub use naming::{NameGenerator, DEFAULT_PREFIX, DEFAULT_SUFFIX_LENGTH};
pub use probe::{
    classify_read_only_write, is_read_only_error, read_only, run_probe, write_read_delete,
    AccessMode, ProbeConfig, ProbeError, ProbeReport, DEFAULT_CONTENT, READ_ONLY_MESSAGE,
};
