//! Command driving for build integrations: the driver itself, its injected
//! launcher and listener seams, and output collection.

pub mod driver;
pub mod launcher;
pub mod output;

pub use driver::{CommandDriver, DriverBuilder};
pub use launcher::{find_tool, Launcher, SystemLauncher};
pub use output::{BufferListener, ConsoleListener, Listener, NullListener, TeeSink};
