pub mod admission;
pub mod client;
pub mod config;
pub mod controller;
pub mod conversion;
pub mod crd;
pub mod error;
pub mod finalizer;
pub mod logging;
pub mod reconciler;
pub mod resources;
pub mod sync;
pub mod telemetry;
pub mod test_support;
pub mod webhook;

// Re-export commonly used symbols for convenience in binaries/tests.
pub use crd::v1alpha1::{MySQL, MySQLSpec, MySQLStatus};
pub use error::{Error, Result};
pub use reconciler::{Outcome, Reconciler, ResourceId};
