//! HTTP/JSON client for the volume driver protocol.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{Certificate, Identity};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::VolumeDriver;
use crate::fixture::{FixtureTemplate, TlsConfig};
use crate::request::{
    CreateRequest, ErrorResponse, MountRequest, MountResponse, RemoveRequest, UnmountRequest,
};

/// Default deadline for one driver request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors building a [`RemoteClient`].
#[derive(Debug, thiserror::Error)]
pub enum DriverClientError {
    /// The address is not `http://` or `https://`
    #[error("unsupported driver address `{0}`: expected an http:// or https:// URL")]
    UnsupportedAddress(String),

    /// A TLS file could not be read
    #[error("failed to read TLS file {}: {source}", path.display())]
    ReadTlsFile {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be built (bad PEM data, TLS backend failure)
    #[error("failed to build driver client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Replies that can carry a synthesized error.
trait WireResponse: DeserializeOwned {
    fn from_error(message: String) -> Self;
    fn error_message(&self) -> &str;
}

impl WireResponse for ErrorResponse {
    fn from_error(message: String) -> Self {
        Self::error(message)
    }

    fn error_message(&self) -> &str {
        &self.err
    }
}

impl WireResponse for MountResponse {
    fn from_error(message: String) -> Self {
        Self::error(message)
    }

    fn error_message(&self) -> &str {
        &self.err
    }
}

/// Blocking client for a driver listening on HTTP(S).
#[derive(Debug, Clone)]
pub struct RemoteClient {
    base_url: String,
    client: Client,
}

impl RemoteClient {
    /// Create a client for `address`, optionally with TLS settings.
    pub fn new(
        address: &str,
        tls: Option<&TlsConfig>,
        timeout: Duration,
    ) -> Result<Self, DriverClientError> {
        if !(address.starts_with("http://") || address.starts_with("https://")) {
            return Err(DriverClientError::UnsupportedAddress(address.to_string()));
        }

        let mut builder = Client::builder().use_rustls_tls().timeout(timeout);

        if let Some(tls) = tls {
            builder = builder.danger_accept_invalid_certs(tls.insecure_skip_verify);
            if let Some(ca) = tls.ca_path() {
                builder = builder.add_root_certificate(Certificate::from_pem(&read_pem(ca)?)?);
            }
            if let Some((cert, key)) = tls.client_identity() {
                let mut pem = read_pem(cert)?;
                pem.push(b'\n');
                pem.extend(read_pem(key)?);
                builder = builder.identity(Identity::from_pem(&pem)?);
            }
        }

        Ok(Self {
            base_url: address.trim_end_matches('/').to_string(),
            client: builder.build()?,
        })
    }

    /// Create a client for the driver a fixture template points at.
    pub fn from_template(
        template: &FixtureTemplate,
        timeout: Duration,
    ) -> Result<Self, DriverClientError> {
        Self::new(&template.driver_address, template.tls_config.as_ref(), timeout)
    }

    /// Driver base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn call<B: Serialize, R: WireResponse>(&self, operation: &str, body: &B) -> R {
        let url = format!("{}/VolumeDriver.{operation}", self.base_url);
        debug!(url = %url, "calling driver");

        let response = match self.client.post(&url).json(body).send() {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "driver request failed");
                return R::from_error(format!("{operation} request to {url} failed: {e}"));
            }
        };

        let status = response.status();
        let text = match response.text() {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %url, error = %e, "failed to read driver response");
                return R::from_error(format!("failed to read {operation} response: {e}"));
            }
        };

        match serde_json::from_str::<R>(&text) {
            Ok(reply) if status.is_success() || !reply.error_message().is_empty() => reply,
            Ok(_) => R::from_error(format!("driver returned HTTP {status} for {operation}")),
            Err(_) if !status.is_success() => R::from_error(format!(
                "driver returned HTTP {status} for {operation}: {}",
                text.trim()
            )),
            Err(e) => {
                warn!(url = %url, error = %e, "undecodable driver response");
                R::from_error(format!("undecodable {operation} response: {e}"))
            }
        }
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, DriverClientError> {
    std::fs::read(path).map_err(|source| DriverClientError::ReadTlsFile {
        path: path.to_path_buf(),
        source,
    })
}

impl VolumeDriver for RemoteClient {
    fn create(&self, request: &CreateRequest) -> ErrorResponse {
        self.call("Create", request)
    }

    fn mount(&self, request: &MountRequest) -> MountResponse {
        self.call("Mount", request)
    }

    fn unmount(&self, request: &UnmountRequest) -> ErrorResponse {
        self.call("Unmount", request)
    }

    fn remove(&self, request: &RemoveRequest) -> ErrorResponse {
        self.call("Remove", request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::OptionValue;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serve exactly one HTTP request and hand back its raw text.
    fn one_shot_server(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });

        (address, handle)
    }

    fn read_request(stream: &mut impl Read) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&data);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= header_end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8(data).unwrap()
    }

    fn client(address: &str) -> RemoteClient {
        RemoteClient::new(address, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_create_posts_name_and_opts() {
        let (address, server) = one_shot_server("200 OK", r#"{"Err":""}"#);
        let request = CreateRequest {
            name: "vol-A".into(),
            opts: [("source".to_string(), OptionValue::from("//srv/share"))].into(),
        };

        let reply = client(&address).create(&request);
        assert!(reply.is_success());

        let raw = server.join().unwrap();
        assert!(raw.starts_with("POST /VolumeDriver.Create HTTP/1.1"));
        assert!(raw.ends_with(r#"{"Name":"vol-A","Opts":{"source":"//srv/share"}}"#));
    }

    #[test]
    fn test_mount_returns_mountpoint() {
        let (address, server) =
            one_shot_server("200 OK", r#"{"Mountpoint":"/var/vcap/data/vol-A","Err":""}"#);

        let reply = client(&format!("{address}/")).mount(&MountRequest { name: "vol-A".into() });
        assert_eq!(reply, MountResponse::mounted("/var/vcap/data/vol-A"));

        let raw = server.join().unwrap();
        assert!(raw.starts_with("POST /VolumeDriver.Mount HTTP/1.1"));
    }

    #[test]
    fn test_driver_error_is_passed_through() {
        let (address, server) = one_shot_server("200 OK", r#"{"Err":"volume already exists"}"#);
        let reply = client(&address).create(&CreateRequest {
            name: "vol-A".into(),
            opts: Default::default(),
        });
        assert_eq!(reply.err, "volume already exists");
        server.join().unwrap();
    }

    #[test]
    fn test_error_status_keeps_decodable_err() {
        let (address, server) = one_shot_server("500 Internal Server Error", r#"{"Err":"busy"}"#);
        let reply = client(&address).unmount(&UnmountRequest { name: "vol-A".into() });
        assert_eq!(reply.err, "busy");
        server.join().unwrap();
    }

    #[test]
    fn test_error_status_without_err_is_synthesized() {
        let (address, server) = one_shot_server("404 Not Found", "404 page not found");
        let reply = client(&address).remove(&RemoveRequest { name: "vol-A".into() });
        assert!(reply.err.contains("HTTP 404"), "{}", reply.err);
        assert!(reply.err.contains("page not found"));
        server.join().unwrap();
    }

    #[test]
    fn test_undecodable_body() {
        let (address, server) = one_shot_server("200 OK", "<html>");
        let reply = client(&address).mount(&MountRequest { name: "vol-A".into() });
        assert!(reply.mountpoint.is_empty());
        assert!(reply.err.starts_with("undecodable Mount response"));
        server.join().unwrap();
    }

    #[test]
    fn test_connection_refused_becomes_error() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let reply = client(&address).create(&CreateRequest {
            name: "vol-A".into(),
            opts: Default::default(),
        });
        assert!(!reply.is_success());
        assert!(reply.err.contains("Create request to"));
    }

    #[test]
    fn test_rejects_non_http_address() {
        let err = RemoteClient::new("unix:///var/run/driver.sock", None, DEFAULT_REQUEST_TIMEOUT)
            .unwrap_err();
        assert!(matches!(err, DriverClientError::UnsupportedAddress(_)));
    }

    #[test]
    fn test_missing_ca_file() {
        let tls = TlsConfig {
            ca_file: "/nonexistent/ca.pem".into(),
            ..TlsConfig::default()
        };
        let err = RemoteClient::new("https://127.0.0.1:1", Some(&tls), DEFAULT_REQUEST_TIMEOUT)
            .unwrap_err();
        assert!(matches!(err, DriverClientError::ReadTlsFile { .. }));
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        assert_eq!(client("http://127.0.0.1:8589/").base_url(), "http://127.0.0.1:8589");
    }
}
