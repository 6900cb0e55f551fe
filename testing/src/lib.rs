//! Shared test fixtures for the Faultline workspace.
//!
//! - PostgreSQL testcontainer (port 5432), started lazily once per test
//!   process; `None` when Docker is unavailable so callers can skip
//! - Sample exceptions, groups, occurrences and events
//! - Recording and failing notifiers for dispatch tests

mod fixtures;
mod notifiers;
mod samples;

pub use fixtures::*;
pub use notifiers::*;
pub use samples::*;
