//! Compatibility certification for volume plugin drivers.
//!
//! A run takes a fixture template (connection defaults) and a list of
//! bindings (volumes to certify), plans one [`Scenario`] per binding and
//! drives each one through the full lifecycle:
//!
//! ```text
//! Create -> Mount -> host check -> probe -> Unmount -> Remove
//! ```
//!
//! The driver is reached through the [`VolumeDriver`] trait;
//! [`RemoteClient`] implements it over the HTTP/JSON plugin protocol.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use volcert_core::{
//!     load_bindings, plan_scenarios, CertificationSession, FixtureTemplate, RemoteClient,
//!     DEFAULT_REQUEST_TIMEOUT,
//! };
//! use volcert_mount::{NameGenerator, ShellMountCheck};
//!
//! let template = FixtureTemplate::load(Path::new("fixture.json"))?;
//! let bindings = load_bindings(Path::new("bindings.json"))?;
//! let scenarios = plan_scenarios(&template, &bindings)?;
//!
//! let driver = RemoteClient::from_template(&template, DEFAULT_REQUEST_TIMEOUT)?;
//! let verifier = ShellMountCheck::default();
//! let mut session = CertificationSession::new(&driver, &verifier, NameGenerator::from_time());
//!
//! let report = session.run_all(&scenarios);
//! println!("{} passed, {} failed", report.passed_count(), report.failed_count());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod driver;
mod error;
pub mod fixture;
mod report;
pub mod request;
mod scenario;
mod session;

pub use driver::{DriverClientError, RemoteClient, VolumeDriver, DEFAULT_REQUEST_TIMEOUT};
pub use error::{CertError, FailureKind, Stage};
pub use fixture::{load_bindings, Binding, FixtureError, FixtureTemplate, OptionMap, OptionValue};
pub use report::{RunReport, ScenarioReport, StageFailure, StepRecord};
pub use request::{build_create_request, CreateRequest, RESERVED_KEYS};
pub use scenario::{plan_scenarios, Scenario};
pub use session::{CertificationSession, LifecycleState};
