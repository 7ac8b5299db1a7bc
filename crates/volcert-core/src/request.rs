//! Driver protocol messages and the create-request builder.

use serde::{Deserialize, Serialize};
use volcert_mount::AccessMode;

use crate::fixture::{Binding, FixtureTemplate, OptionMap};

/// Option keys that always come from the template.
///
/// Bindings may carry these too (service brokers often echo them), but the
/// template is authoritative and binding values are discarded.
pub const RESERVED_KEYS: [&str; 3] = ["source", "username", "password"];

/// Option keys that put a scenario in read-only mode. Presence is enough; the
/// value is never inspected.
pub const READ_ONLY_KEYS: [&str; 2] = ["readonly", "ro"];

/// `VolumeDriver.Create` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Volume name
    #[serde(rename = "Name")]
    pub name: String,
    /// Driver options
    #[serde(rename = "Opts")]
    pub opts: OptionMap,
}

/// `VolumeDriver.Mount` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountRequest {
    /// Volume name
    #[serde(rename = "Name")]
    pub name: String,
}

/// `VolumeDriver.Unmount` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmountRequest {
    /// Volume name
    #[serde(rename = "Name")]
    pub name: String,
}

/// `VolumeDriver.Remove` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRequest {
    /// Volume name
    #[serde(rename = "Name")]
    pub name: String,
}

/// Reply carrying only an error indicator. Empty means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message, empty on success
    #[serde(rename = "Err", default)]
    pub err: String,
}

impl ErrorResponse {
    /// Successful reply.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Failed reply with `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self { err: message.into() }
    }

    /// Whether the driver reported success.
    pub fn is_success(&self) -> bool {
        self.err.is_empty()
    }
}

/// Reply to `VolumeDriver.Mount`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountResponse {
    /// Host path of the mount, empty on failure
    #[serde(rename = "Mountpoint", default)]
    pub mountpoint: String,
    /// Error message, empty on success
    #[serde(rename = "Err", default)]
    pub err: String,
}

impl MountResponse {
    /// Successful mount at `mountpoint`.
    pub fn mounted(mountpoint: impl Into<String>) -> Self {
        Self {
            mountpoint: mountpoint.into(),
            err: String::new(),
        }
    }

    /// Failed mount with `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            mountpoint: String::new(),
            err: message.into(),
        }
    }
}

/// Output of [`build_create_request`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRequest {
    /// The request to send
    pub request: CreateRequest,
    /// Every key the binding declared, reserved or not, in sorted order
    pub option_keys: Vec<String>,
    /// Reserved keys the binding set to a value different from the template's
    pub overridden_reserved: Vec<String>,
}

/// Merge `binding` into `template`.
///
/// The template's `source`, `username` and `password` seed the options and
/// are never overwritten; every other binding key is copied verbatim and wins
/// over anything else.
pub fn build_create_request(template: &FixtureTemplate, binding: &Binding) -> BuiltRequest {
    let mut opts = OptionMap::new();
    for key in RESERVED_KEYS {
        if let Some(value) = template.option(key) {
            opts.insert(key.to_string(), value.clone());
        }
    }

    let mut option_keys = Vec::with_capacity(binding.mount_config.len());
    let mut overridden_reserved = Vec::new();

    for (key, value) in &binding.mount_config {
        option_keys.push(key.clone());

        if RESERVED_KEYS.contains(&key.as_str()) {
            if template.option(key) != Some(value) {
                overridden_reserved.push(key.clone());
            }
            continue;
        }

        opts.insert(key.clone(), value.clone());
    }

    BuiltRequest {
        request: CreateRequest {
            name: binding.volume_id.clone(),
            opts,
        },
        option_keys,
        overridden_reserved,
    }
}

/// Read-only when any [`READ_ONLY_KEYS`] entry is present, whatever its value.
pub fn access_mode(opts: &OptionMap) -> AccessMode {
    if READ_ONLY_KEYS.iter().any(|key| opts.contains_key(*key)) {
        AccessMode::ReadOnly
    } else {
        AccessMode::ReadWrite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{CreateConfig, OptionValue};
    use proptest::prelude::*;

    fn template() -> FixtureTemplate {
        FixtureTemplate {
            driver_name: "smbdriver".to_string(),
            driver_address: "http://127.0.0.1:8589".to_string(),
            create_config: CreateConfig {
                name: "template".to_string(),
                opts: [
                    ("source".to_string(), OptionValue::from("//srv/share")),
                    ("username".to_string(), OptionValue::from("tmpl-user")),
                    ("password".to_string(), OptionValue::from("tmpl-pass")),
                    ("domain".to_string(), OptionValue::from("CORP")),
                ]
                .into(),
            },
            tls_config: None,
        }
    }

    #[test]
    fn test_reserved_keys_come_from_template() {
        let binding = Binding::new(
            "vol-A",
            [("source", "nfs://x"), ("username", "u"), ("password", "p")],
        );
        let built = build_create_request(&template(), &binding);

        assert_eq!(built.request.name, "vol-A");
        assert_eq!(built.request.opts["source"], OptionValue::from("//srv/share"));
        assert_eq!(built.request.opts["username"], OptionValue::from("tmpl-user"));
        assert_eq!(built.request.opts["password"], OptionValue::from("tmpl-pass"));
        assert_eq!(built.request.opts.len(), 3);
        assert_eq!(built.option_keys, vec!["password", "source", "username"]);
        assert_eq!(built.overridden_reserved, vec!["password", "source", "username"]);
    }

    #[test]
    fn test_binding_options_are_copied_verbatim() {
        let binding = Binding::new("vol-B", [("readonly", "true"), ("vers", "3.0")]);
        let built = build_create_request(&template(), &binding);

        assert_eq!(built.request.opts["readonly"], OptionValue::from("true"));
        assert_eq!(built.request.opts["vers"], OptionValue::from("3.0"));
        assert!(built.overridden_reserved.is_empty());
    }

    #[test]
    fn test_non_reserved_template_options_are_not_inherited() {
        let binding = Binding::new("vol-C", [("vers", "2.1")]);
        let built = build_create_request(&template(), &binding);
        assert!(!built.request.opts.contains_key("domain"));
    }

    #[test]
    fn test_matching_reserved_value_is_not_an_override() {
        let binding = Binding::new("vol-D", [("source", "//srv/share")]);
        let built = build_create_request(&template(), &binding);
        assert!(built.overridden_reserved.is_empty());
        assert_eq!(built.option_keys, vec!["source"]);
    }

    #[test]
    fn test_missing_template_credentials_are_omitted() {
        let mut template = template();
        template.create_config.opts.remove("password");
        let built = build_create_request(&template, &Binding::new("vol-E", [("password", "p")]));
        assert!(!built.request.opts.contains_key("password"));
    }

    #[test]
    fn test_access_mode_by_key_presence() {
        let mut opts = OptionMap::new();
        assert_eq!(access_mode(&opts), AccessMode::ReadWrite);

        opts.insert("readonly".to_string(), OptionValue::from("false"));
        assert_eq!(access_mode(&opts), AccessMode::ReadOnly);

        opts.clear();
        opts.insert("ro".to_string(), OptionValue::from(false));
        assert_eq!(access_mode(&opts), AccessMode::ReadOnly);

        opts.clear();
        opts.insert("rw".to_string(), OptionValue::from(true));
        assert_eq!(access_mode(&opts), AccessMode::ReadWrite);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&MountRequest { name: "vol-A".into() }).unwrap();
        assert_eq!(json, r#"{"Name":"vol-A"}"#);

        let reply: MountResponse = serde_json::from_str(r#"{"Mountpoint":"/mnt/a","Err":""}"#).unwrap();
        assert_eq!(reply, MountResponse::mounted("/mnt/a"));

        let reply: ErrorResponse = serde_json::from_str("{}").unwrap();
        assert!(reply.is_success());
    }

    proptest! {
        #[test]
        fn prop_reserved_keys_always_match_template(
            source in "[a-z/:]{0,12}",
            username in "[a-z]{0,8}",
            password in "[a-zA-Z0-9]{0,8}",
            extra in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..6),
        ) {
            let mut options: Vec<(String, String)> = extra.into_iter().collect();
            options.push(("source".into(), source));
            options.push(("username".into(), username));
            options.push(("password".into(), password));
            let binding = Binding::new("vol", options.clone());

            let template = template();
            let built = build_create_request(&template, &binding);

            for key in RESERVED_KEYS {
                prop_assert_eq!(built.request.opts.get(key), template.option(key));
            }
            for (key, value) in &options {
                if !RESERVED_KEYS.contains(&key.as_str()) {
                    prop_assert_eq!(&built.request.opts[key], &OptionValue::from(value.as_str()));
                }
            }
        }
    }
}
