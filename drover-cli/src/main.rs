use clap::{Parser, Subcommand, ValueEnum};
use drover_core::{BuildContext, CommandLine, DriverError, Encoding, EnvVars};
use drover_runner::{
    find_tool, CommandDriver, ConsoleListener, Listener, NullListener, SystemLauncher,
};
use serde_json::json;
use std::process;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "drover")]
#[command(about = "Drives external commands with a prepared environment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a command and exit with its exit code
    Run {
        /// Working directory for the command
        #[arg(long, default_value = ".")]
        pwd: String,

        /// Environment entries layered over the inherited ones
        #[arg(long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,

        /// Report any exit code instead of failing on non-zero
        #[arg(long)]
        ignore_exit_code: bool,

        /// Discard process output
        #[arg(long)]
        quiet: bool,

        /// Argument values to hide wherever the command line is rendered
        #[arg(long = "mask", value_name = "VALUE")]
        mask: Vec<String>,

        /// Print a JSON report of the run
        #[arg(long)]
        json: bool,

        /// Program and arguments, after `--`
        #[arg(required = true, last = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Detect the version a tool reports
    Probe {
        /// Encoding of the tool's output
        #[arg(long, default_value = "utf8")]
        encoding: EncodingArg,

        /// Program, optionally followed by the arguments that print its
        /// version (defaults to --version)
        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "COMMAND"
        )]
        command: Vec<String>,
    },

    /// Resolve a tool on PATH
    Check {
        /// Program name to look up
        tool: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    Utf8,
    Latin1,
}

impl From<EncodingArg> for Encoding {
    fn from(value: EncodingArg) -> Self {
        match value {
            EncodingArg::Utf8 => Encoding::Utf8,
            EncodingArg::Latin1 => Encoding::Latin1,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            pwd,
            env,
            ignore_exit_code,
            quiet,
            mask,
            json,
            command,
        } => {
            let context = BuildContext::new(pwd).with_env(prepared_env(&env)?);
            let command_line = to_command_line(&command, &mask);

            let listener: Arc<dyn Listener> = if quiet {
                Arc::new(NullListener)
            } else {
                Arc::new(ConsoleListener)
            };
            let driver = CommandDriver::workspace_builder(&context)
                .launcher(Arc::new(SystemLauncher))
                .listener(listener)
                .ignore_error_code(ignore_exit_code)
                .build()?;

            let code = launch_and_report(&driver, &command_line, json)?;
            process::exit(code);
        }
        Commands::Probe { encoding, command } => {
            let command_line = probe_command_line(&command);
            let driver = CommandDriver::builder()
                .env(std::env::vars().collect())
                .pwd(".")
                .launcher(Arc::new(SystemLauncher))
                .listener(Arc::new(NullListener))
                .encoding(encoding.into())
                .build()?;

            match driver.query_version(&command_line)? {
                Some(version) => println!("{}", version),
                None => {
                    eprintln!("No version detected in output of: {}", command_line);
                    process::exit(1);
                }
            }
        }
        Commands::Check { tool } => match find_tool(&tool) {
            Some(path) => println!("{}", path.display()),
            None => {
                eprintln!("Tool not found on PATH: {}", tool);
                process::exit(1);
            }
        },
    }

    Ok(())
}

/// Launches the command and folds a tolerated non-zero exit into the
/// reported code, so the process can exit the way its child did.
fn launch_and_report(
    driver: &CommandDriver,
    command_line: &CommandLine,
    json: bool,
) -> anyhow::Result<i32> {
    let start = Instant::now();
    let outcome = driver.launch(command_line);
    let duration_ms = start.elapsed().as_millis() as u64;

    let code = match outcome {
        Ok(code) => code,
        Err(DriverError::NonZeroExit { code }) => {
            eprintln!("Process returned error code {}", code);
            code
        }
        Err(err) => return Err(err.into()),
    };

    if json {
        let report = json!({
            "command": command_line.to_string(),
            "exit_code": code,
            "duration_ms": duration_ms,
        });
        println!("{}", report);
    }

    Ok(code)
}

/// The inherited environment with KEY=VALUE overrides applied on top.
fn prepared_env(overrides: &[String]) -> anyhow::Result<EnvVars> {
    let mut env: EnvVars = std::env::vars().collect();
    for entry in overrides {
        let (key, value) = entry
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("Invalid environment entry (expected KEY=VALUE): {}", entry)
            })?;
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}

fn to_command_line(command: &[String], mask: &[String]) -> CommandLine {
    let mut line = CommandLine::new(&command[0]);
    for arg in &command[1..] {
        line = if mask.contains(arg) {
            line.arg_masked(arg)
        } else {
            line.arg(arg)
        };
    }
    line
}

fn probe_command_line(command: &[String]) -> CommandLine {
    let line = CommandLine::new(&command[0]);
    if command.len() == 1 {
        line.arg("--version")
    } else {
        line.args(&command[1..])
    }
}
