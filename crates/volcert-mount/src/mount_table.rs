//! Native view of the host mount table.
//!
//! Used by the `mount-table` verification mode, which reads `/proc/mounts`
//! directly instead of shelling out. Parsing lives here so it can be tested on
//! any platform.
//!
//! # Format
//!
//! `{device} {mountpoint} {fstype} {options} {dump} {pass}`, with special
//! characters in paths encoded as three-digit octal escapes (`\040` = space).

use std::path::{Path, PathBuf};

use crate::host_check::HostCheckError;

/// Location of the kernel mount table on Linux.
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Source device or remote export (e.g. `//server/share`, `nfs:/export`)
    pub device: String,
    /// Where it is mounted
    pub mountpoint: PathBuf,
    /// Filesystem type (e.g. `cifs`, `nfs4`, `fuse.sshfs`)
    pub fstype: String,
    /// Raw comma-separated mount options
    pub options: String,
}

impl MountEntry {
    /// Whether the kernel reports this mount as read-only.
    pub fn is_read_only(&self) -> bool {
        self.options.split(',').any(|opt| opt == "ro")
    }
}

/// Read and parse a mount table in `/proc/mounts` format from `path`.
pub fn read_mount_table_from(path: &Path) -> Result<Vec<MountEntry>, HostCheckError> {
    let contents = std::fs::read_to_string(path).map_err(|source| HostCheckError::MountTable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_mount_table(&contents))
}

/// Parse every well-formed line; malformed lines are skipped.
pub fn parse_mount_table(contents: &str) -> Vec<MountEntry> {
    contents.lines().filter_map(parse_mount_line).collect()
}

/// Parse one mount-table line.
pub fn parse_mount_line(line: &str) -> Option<MountEntry> {
    let mut parts = line.split_whitespace();
    let device = parts.next()?;
    let mountpoint = parts.next()?;
    let fstype = parts.next()?;
    let options = parts.next().unwrap_or_default();

    Some(MountEntry {
        device: unescape_mount_field(device),
        mountpoint: PathBuf::from(unescape_mount_field(mountpoint)),
        fstype: fstype.to_string(),
        options: options.to_string(),
    })
}

/// Find the entry mounted exactly at `mountpoint`.
///
/// Trailing slashes are ignored on both sides. When the same path is stacked
/// several times the last (topmost) entry wins.
pub fn find_mount<'a>(entries: &'a [MountEntry], mountpoint: &Path) -> Option<&'a MountEntry> {
    let wanted = trim_trailing_slash(mountpoint);
    entries
        .iter()
        .rev()
        .find(|entry| trim_trailing_slash(&entry.mountpoint) == wanted)
}

fn trim_trailing_slash(path: &Path) -> &Path {
    let s = path.as_os_str().to_str().unwrap_or_default();
    if s.len() > 1 && s.ends_with('/') {
        Path::new(s.trim_end_matches('/'))
    } else {
        path
    }
}

/// Decode the octal escapes the kernel uses in mount-table fields.
///
/// Incomplete or out-of-range escapes are kept verbatim.
pub fn unescape_mount_field(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }

        let mut octal = String::with_capacity(3);
        while octal.len() < 3 {
            match chars.next_if(|next| ('0'..='7').contains(next)) {
                Some(digit) => octal.push(digit),
                None => break,
            }
        }

        match u8::from_str_radix(&octal, 8) {
            Ok(code) if octal.len() == 3 => result.push(char::from(code)),
            _ => {
                result.push('\\');
                result.push_str(&octal);
            }
        }
    }

    result
}
