//! Device profile duplicate detection.
//!
//! A pull request that adds a profile next to an existing, equivalent one
//! should be flagged before review. Equivalence is structural and tolerant of
//! the orderings that upstream tooling does not keep stable:
//!
//! ```text
//! Profile
//! ├── metadata      exact
//! ├── preferences   exact
//! └── components[i] positional
//!     ├── categories     exact (absence is distinct from empty)
//!     ├── label          exact (absence is distinct)
//!     └── capabilities   [0] anchored by id, [1..] any order
//!         └── config.values         any order, keyed by `key`
//!             └── enabledValues     compared as a set
//! ```
//!
//! The comparator in [`compare`] is pure. [`DuplicateDetector`] drives it over
//! a change list and [`report`] renders the review comment body.

pub mod compare;
mod detector;
mod loader;
mod model;
pub mod report;

pub use compare::{detect, is_duplicate};
pub use detector::{DetectionOutcome, DuplicateDetector, DuplicatePair, SkippedProfile};
pub use loader::{load_profile, parse_profile};
pub use model::{Capability, CapabilityConfig, Component, ConfigValue, Extra, Profile};
