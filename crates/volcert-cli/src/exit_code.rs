//! Exit codes for the CLI.
//!
//! A failed certification is kept distinct from a broken fixture or a
//! harness error. Code 2 is left to clap for usage errors.

/// Successful execution (every scenario passed)
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// At least one scenario failed, or host verification reported no mount
pub const CERTIFICATION_FAILED: u8 = 3;

/// Fixture or bindings are malformed
pub const FIXTURE_INVALID: u8 = 4;

/// Fixture, bindings or config file not found
pub const NOT_FOUND: u8 = 5;
