use thiserror::Error;

/// Errors raised while configuring or driving an external command.
#[derive(Error, Debug)]
pub enum DriverError {
    /// A required collaborator was not supplied before the driver was built.
    #[error("Required field absent: {0}")]
    MissingField(&'static str),

    /// The process could not be spawned, or waiting on it was interrupted.
    /// The command is rendered with masked arguments hidden.
    #[error("Execution of command ({command}) failed")]
    LaunchFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran to completion but returned a non-zero exit code and
    /// the driver was not configured to ignore it.
    #[error("Process returned error code {code}")]
    NonZeroExit { code: i32 },
}

pub type Result<T> = std::result::Result<T, DriverError>;
