use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use drover_core::{
    BuildContext, CommandLine, DriverError, Encoding, EnvVars, Result, Version,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::launcher::Launcher;
use crate::output::{Listener, TeeSink};

/// Exit code treated as success.
const NO_ERROR: i32 = 0;

/// Drives external commands for a build: working directory, prepared
/// environment, output routing, and the exit-code policy. Immutable once
/// built; one driver serves any number of sequential launches.
#[derive(Clone)]
pub struct CommandDriver {
    env: EnvVars,
    pwd: PathBuf,
    launcher: Arc<dyn Launcher>,
    listener: Arc<dyn Listener>,
    encoding: Encoding,
    ignore_error_code: bool,
}

impl CommandDriver {
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    /// Builder pre-filled from the build context, rooted at the build's
    /// workspace. The launcher and listener still have to be supplied.
    pub fn workspace_builder(context: &BuildContext) -> DriverBuilder {
        DriverBuilder::new()
            .env(context.env.clone())
            .pwd(context.workspace.clone())
            .encoding(context.encoding.unwrap_or_default())
    }

    /// Builder pre-filled from the build context, rooted at the parent
    /// directory of the build's script. Fails right away when the context
    /// has no script configured, before anything is launched.
    pub fn script_builder(context: &BuildContext) -> Result<DriverBuilder> {
        let script_dir = context
            .script_dir()
            .ok_or(DriverError::MissingField("script"))?;
        Ok(DriverBuilder::new()
            .env(context.env.clone())
            .pwd(script_dir)
            .encoding(context.encoding.unwrap_or_default()))
    }

    /// Runs the command, directing process output to the listener. Blocks
    /// until the process exits and returns its raw exit code.
    pub fn launch(&self, command: &CommandLine) -> Result<i32> {
        let mut sink = self.listener.logger();
        self.launch_to(command, &mut sink)
    }

    /// Runs the command with a caller-supplied sink in place of the
    /// listener's.
    ///
    /// A spawn failure or an interrupted wait raises
    /// [`DriverError::LaunchFailed`] naming the command, whatever the
    /// exit-code policy. A non-zero exit raises
    /// [`DriverError::NonZeroExit`] unless the driver was built with
    /// `ignore_error_code(true)`.
    pub fn launch_to(&self, command: &CommandLine, sink: &mut dyn Write) -> Result<i32> {
        let launch_id = Uuid::new_v4();
        let start = Instant::now();

        info!(
            launch_id = %launch_id,
            command = %command,
            pwd = %self.pwd.display(),
            "Launching command"
        );

        let outcome = self.launcher.run(command, &self.pwd, &self.env, sink);
        let duration_ms = start.elapsed().as_millis() as u64;

        let code = match outcome {
            Ok(code) => code,
            Err(source) => {
                error!(
                    launch_id = %launch_id,
                    command = %command,
                    error = %source,
                    "Command could not be run"
                );
                return Err(DriverError::LaunchFailed {
                    command: command.to_string(),
                    source,
                });
            }
        };

        info!(
            launch_id = %launch_id,
            command = %command,
            exit_code = code,
            duration_ms = duration_ms,
            "Command completed"
        );

        if code != NO_ERROR && !self.ignore_error_code {
            warn!(
                launch_id = %launch_id,
                exit_code = code,
                "Command returned a failing exit code"
            );
            return Err(DriverError::NonZeroExit { code });
        }

        Ok(code)
    }

    /// Runs the command and scans its output for a dotted version, decoding
    /// the captured bytes with the driver's encoding. The output still
    /// reaches the listener. A clean run whose output carries no version
    /// yields `Ok(None)`.
    pub fn query_version(&self, command: &CommandLine) -> Result<Option<Version>> {
        let mut tee = TeeSink::new(self.listener.logger());
        self.launch_to(command, &mut tee)?;
        let text = tee.into_string(self.encoding);
        Ok(Version::find_in(&text))
    }
}

/// Assembles a [`CommandDriver`], validating that every required
/// collaborator is present before the driver can be used.
#[derive(Default)]
pub struct DriverBuilder {
    env: Option<EnvVars>,
    pwd: Option<PathBuf>,
    launcher: Option<Arc<dyn Launcher>>,
    listener: Option<Arc<dyn Listener>>,
    encoding: Option<Encoding>,
    ignore_error_code: bool,
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env(mut self, env: EnvVars) -> Self {
        self.env = Some(env);
        self
    }

    pub fn pwd(mut self, pwd: impl Into<PathBuf>) -> Self {
        self.pwd = Some(pwd.into());
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn ignore_error_code(mut self, ignore: bool) -> Self {
        self.ignore_error_code = ignore;
        self
    }

    /// Fails with the name of the first absent required field. A missing
    /// encoding falls back to the default.
    pub fn build(self) -> Result<CommandDriver> {
        let env = self.env.ok_or(DriverError::MissingField("env"))?;
        let pwd = self.pwd.ok_or(DriverError::MissingField("pwd"))?;
        let launcher = self.launcher.ok_or(DriverError::MissingField("launcher"))?;
        let listener = self.listener.ok_or(DriverError::MissingField("listener"))?;

        Ok(CommandDriver {
            env,
            pwd,
            launcher,
            listener,
            encoding: self.encoding.unwrap_or_default(),
            ignore_error_code: self.ignore_error_code,
        })
    }
}
