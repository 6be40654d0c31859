//! Driver deployment to a device-management channel.
//!
//! Changed drivers are zipped, uploaded as packages and then assigned to the
//! release channel with one bulk update. The API sits behind [`ChannelApi`];
//! [`HttpChannelClient`] is the blocking `reqwest` implementation.

pub mod client;
pub mod localize;
pub mod package;
pub mod pipeline;
pub mod retry;

pub use client::{ApiResponse, ChannelApi, DriverVersion, HttpChannelClient};
pub use package::PartnerKeys;
pub use pipeline::{DeployEnvironment, DeployPipeline, DeployReport, DeployTarget};
pub use retry::{RetryOutcome, RetryPolicy, send_with_retry};
