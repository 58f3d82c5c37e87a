//! Shared value types and the error taxonomy for the drover workspace.

pub mod error;
pub mod models;
pub mod version;

pub use error::{DriverError, Result};
pub use models::{BuildContext, CommandLine, Encoding, EnvVars};
pub use version::Version;
