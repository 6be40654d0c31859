//! # driverci
//!
//! CI and developer tooling for an edge-driver monorepo.
//!
//! The crate bundles the small, linear tools that run around driver pull
//! requests and releases:
//!
//! - **Duplicate profile detection**: compares changed device profiles against
//!   their sibling profiles with an order-tolerant structural equivalence and
//!   writes a review comment body.
//! - **Lua unit test runners**: a sequential runner with verbosity levels,
//!   filtering, `JUnit` output and coverage, and a per-driver parallel runner.
//! - **Driver deployment**: packages changed drivers, uploads them to the
//!   device-management API with rate-limit retries and publishes them to a
//!   channel.
//! - **Source stamping**: inserts `min_api_version` options into Lua test
//!   registrations.
//!
//! ## Example
//!
//! ```rust,ignore
//! use driverci::profiles::{DuplicateDetector, report};
//!
//! let detector = DuplicateDetector::new("/path/to/repo");
//! let outcome = detector.check(&changed_files)?;
//! report::write_report(Path::new("profile-comment-body.md"), &outcome)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;
use thiserror::Error as ThisError;

// Module declarations
pub mod changes;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod observability;
pub mod process;
pub mod profiles;
pub mod stamp;
pub mod testing;

// Re-exports for convenience
pub use config::DriverCiConfig;
pub use profiles::{DetectionOutcome, DuplicateDetector, DuplicatePair, Profile};

/// Error type for driverci operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Bad CLI arguments, invalid filter regex, missing deploy settings |
/// | `OperationFailed` | I/O errors, subprocess spawn failures, serialization failures |
/// | `MalformedProfile` | A profile document is unparsable or misses a required field |
/// | `Http` | The device-management API answered with a terminal error status |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O errors occur
    /// - A subprocess cannot be spawned
    /// - Configuration or API payloads cannot be parsed
    /// - An HTTP request cannot be sent
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A profile document could not be loaded.
    ///
    /// `field` names the offending field as a path into the document
    /// (for example `components[0].capabilities`), or `<document>` when the
    /// file is not valid YAML at all.
    #[error("malformed profile {}: {field}: {reason}", path.display())]
    MalformedProfile {
        /// Path of the profile document.
        path: PathBuf,
        /// Field path that is missing or has the wrong shape.
        field: String,
        /// What is wrong with the field.
        reason: String,
    },

    /// The device-management API returned a terminal error response.
    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        /// Endpoint that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

impl Error {
    /// Builds an `OperationFailed` error from any displayable cause.
    pub fn operation(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for driverci operations.
pub type Result<T> = std::result::Result<T, Error>;
