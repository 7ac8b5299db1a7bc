//! Fixture model: the template of connection defaults and the bindings to
//! certify.
//!
//! Both are loaded from JSON once per run and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Driver create options keyed by option name.
pub type OptionMap = BTreeMap<String, OptionValue>;

/// A single driver option value.
///
/// Backends legitimately need different types (`vers: "3.0"`, `uid: 1000`,
/// `readonly: true`, `mount_options: ["nolock"]`), so values are typed rather
/// than stringly. On the wire each variant is the matching JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// JSON boolean
    Bool(bool),
    /// JSON number, integer or float
    Number(serde_json::Number),
    /// JSON string
    String(String),
    /// JSON array of strings
    List(Vec<String>),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for OptionValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

/// Errors loading or validating fixtures.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// File could not be read
    #[error("failed to read fixture {}: {source}", path.display())]
    Read {
        /// Fixture path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid fixture JSON
    #[error("failed to parse fixture {}: {source}", path.display())]
    Parse {
        /// Fixture path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The template does not carry a `source` option
    #[error("fixture template has no `source` in create_config.Opts")]
    MissingSource,

    /// A service binding lists no volume mounts
    #[error("binding #{index} has no volume_mounts")]
    NoVolumeMounts {
        /// Position in the bindings file
        index: usize,
    },

    /// A binding has an empty volume id
    #[error("binding #{index} has an empty volume_id")]
    EmptyVolumeId {
        /// Position in the bindings file
        index: usize,
    },

    /// Two bindings share a volume id
    #[error("volume_id `{0}` is declared by more than one binding")]
    DuplicateVolumeId(String),
}

/// TLS settings for reaching the driver.
///
/// Field names follow the Go-style fixture files (`InsecureSkipVerify`,
/// `CAFile`, ...). Empty paths mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Skip server certificate verification
    #[serde(rename = "InsecureSkipVerify", default)]
    pub insecure_skip_verify: bool,
    /// PEM bundle of CAs trusted for the driver
    #[serde(rename = "CAFile", default)]
    pub ca_file: String,
    /// PEM client certificate
    #[serde(rename = "CertFile", default)]
    pub cert_file: String,
    /// PEM client private key
    #[serde(rename = "KeyFile", default)]
    pub key_file: String,
}

impl TlsConfig {
    /// CA bundle path, if configured.
    pub fn ca_path(&self) -> Option<&Path> {
        non_empty_path(&self.ca_file)
    }

    /// Client certificate and key paths, if both are configured.
    pub fn client_identity(&self) -> Option<(&Path, &Path)> {
        Some((non_empty_path(&self.cert_file)?, non_empty_path(&self.key_file)?))
    }
}

fn non_empty_path(s: &str) -> Option<&Path> {
    (!s.is_empty()).then(|| Path::new(s))
}

/// Template create request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateConfig {
    /// Template volume name (unused for certification, each binding names its own)
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Default options (`source`, `username`, `password`, ...)
    #[serde(rename = "Opts", default)]
    pub opts: OptionMap,
}

/// Connection defaults shared by every binding in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureTemplate {
    /// Informational driver name
    #[serde(default)]
    pub driver_name: String,
    /// Base URL of the driver under test
    pub driver_address: String,
    /// Default create options
    #[serde(default)]
    pub create_config: CreateConfig,
    /// Optional TLS settings
    #[serde(default)]
    pub tls_config: Option<TlsConfig>,
}

impl FixtureTemplate {
    /// Load a template from a JSON file.
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let contents = read(path)?;
        serde_json::from_str(&contents).map_err(|source| FixtureError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Template option by key.
    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.create_config.opts.get(key)
    }

    /// Check the template is usable before planning scenarios.
    pub fn validate(&self) -> Result<(), FixtureError> {
        match self.option("source") {
            Some(OptionValue::String(s)) if s.is_empty() => Err(FixtureError::MissingSource),
            Some(_) => Ok(()),
            None => Err(FixtureError::MissingSource),
        }
    }
}

/// One volume under certification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    /// Volume identity, unique within a run
    pub volume_id: String,
    /// Backend-specific mount options
    #[serde(default)]
    pub mount_config: OptionMap,
}

impl Binding {
    /// Create a binding from an id and option pairs.
    pub fn new<K, V>(volume_id: impl Into<String>, options: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<OptionValue>,
    {
        Self {
            volume_id: volume_id.into(),
            mount_config: options
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Device {
    volume_id: String,
    #[serde(default)]
    mount_config: OptionMap,
}

#[derive(Debug, Deserialize)]
struct VolumeMount {
    device: Device,
}

#[derive(Debug, Deserialize)]
struct ServiceBinding {
    volume_mounts: Vec<VolumeMount>,
}

/// Either a full service binding (first volume mount is used) or the flat
/// `{volume_id, mount_config}` shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BindingEntry {
    Service(ServiceBinding),
    Flat(Binding),
}

/// Load bindings from a JSON array.
pub fn load_bindings(path: &Path) -> Result<Vec<Binding>, FixtureError> {
    let contents = read(path)?;
    let entries: Vec<BindingEntry> =
        serde_json::from_str(&contents).map_err(|source| FixtureError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            BindingEntry::Flat(binding) => Ok(binding),
            BindingEntry::Service(service) => service
                .volume_mounts
                .into_iter()
                .next()
                .map(|mount| Binding {
                    volume_id: mount.device.volume_id,
                    mount_config: mount.device.mount_config,
                })
                .ok_or(FixtureError::NoVolumeMounts { index }),
        })
        .collect()
}

fn read(path: &Path) -> Result<String, FixtureError> {
    std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_template() {
        let file = json_file(
            r#"{
                "driver_name": "smbdriver",
                "driver_address": "https://127.0.0.1:8589",
                "create_config": {
                    "Name": "template",
                    "Opts": {"source": "//srv/share", "username": "u", "password": "p", "vers": 3}
                },
                "tls_config": {"InsecureSkipVerify": true, "CAFile": "/ca.pem", "CertFile": "", "KeyFile": ""}
            }"#,
        );
        let template = FixtureTemplate::load(file.path()).unwrap();

        assert_eq!(template.driver_name, "smbdriver");
        assert_eq!(template.option("source"), Some(&OptionValue::from("//srv/share")));
        assert_eq!(template.option("vers"), Some(&OptionValue::from(3)));
        template.validate().unwrap();
        let tls = template.tls_config.unwrap();
        assert!(tls.insecure_skip_verify);
        assert_eq!(tls.ca_path(), Some(Path::new("/ca.pem")));
        assert!(tls.client_identity().is_none());
    }

    fn template_with_source(source: &str) -> FixtureTemplate {
        FixtureTemplate {
            driver_name: String::new(),
            driver_address: "http://localhost".to_string(),
            create_config: CreateConfig {
                name: String::new(),
                opts: [("source".to_string(), OptionValue::from(source))].into(),
            },
            tls_config: None,
        }
    }

    #[test]
    fn test_template_requires_source() {
        let mut template = template_with_source("");
        assert!(matches!(template.validate(), Err(FixtureError::MissingSource)));

        template.create_config.opts.clear();
        assert!(matches!(template.validate(), Err(FixtureError::MissingSource)));
    }

    #[test]
    fn test_load_bindings_both_shapes() {
        let file = json_file(
            r#"[
                {"volume_id": "vol-A", "mount_config": {"source": "nfs://x", "username": "u", "password": "p"}},
                {"name": "svc", "credentials": {}, "volume_mounts": [
                    {"driver": "nfsv3driver", "container_dir": "/data", "mode": "r", "device_type": "shared",
                     "device": {"volume_id": "vol-B", "mount_config": {"readonly": "true", "uid": 1000}}},
                    {"device": {"volume_id": "ignored"}}
                ]}
            ]"#,
        );
        let bindings = load_bindings(file.path()).unwrap();

        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].volume_id, "vol-A");
        assert_eq!(bindings[0].mount_config.len(), 3);
        assert_eq!(bindings[1].volume_id, "vol-B");
        assert_eq!(bindings[1].mount_config["uid"], OptionValue::from(1000));
    }

    #[test]
    fn test_service_binding_without_mounts() {
        let file = json_file(r#"[{"volume_mounts": []}]"#);
        let err = load_bindings(file.path()).unwrap_err();
        assert!(matches!(err, FixtureError::NoVolumeMounts { index: 0 }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_bindings(Path::new("/nonexistent/bindings.json")).unwrap_err();
        assert!(matches!(err, FixtureError::Read { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let file = json_file("{not json");
        let err = FixtureTemplate::load(file.path()).unwrap_err();
        assert!(matches!(err, FixtureError::Parse { .. }));
    }

    #[test]
    fn test_option_value_wire_format() {
        let opts: OptionMap = [
            ("a".to_string(), OptionValue::from("x")),
            ("b".to_string(), OptionValue::from(true)),
            ("c".to_string(), OptionValue::from(7)),
            ("d".to_string(), OptionValue::List(vec!["nolock".into(), "hard".into()])),
        ]
        .into();
        let json = serde_json::to_string(&opts).unwrap();
        assert_eq!(json, r#"{"a":"x","b":true,"c":7,"d":["nolock","hard"]}"#);

        let back: OptionMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, opts);
    }

    #[test]
    fn test_option_value_display() {
        assert_eq!(OptionValue::from("x").to_string(), "x");
        assert_eq!(OptionValue::from(false).to_string(), "false");
        assert_eq!(OptionValue::List(vec!["a".into(), "b".into()]).to_string(), "a,b");
    }
}
