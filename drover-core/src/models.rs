use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Prepared environment mapping handed to spawned processes. A `BTreeMap`
/// keeps iteration order deterministic for logs and tests.
pub type EnvVars = BTreeMap<String, String>;

/// Replacement text for masked arguments in rendered command lines.
const MASK: &str = "******";

/// A program name plus its ordered arguments.
///
/// Arguments may be marked as masked: they are passed to the process
/// verbatim but render as `******` wherever the command line is displayed,
/// which covers every log line and error message the driver produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Arg {
    value: String,
    masked: bool,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        CommandLine {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends a plain argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg {
            value: value.into(),
            masked: false,
        });
        self
    }

    /// Appends a masked argument. The value still reaches the process
    /// unchanged; only the rendering hides it.
    pub fn arg_masked(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg {
            value: value.into(),
            masked: true,
        });
        self
    }

    /// Appends a sequence of plain arguments.
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self = self.arg(value);
        }
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The verbatim argument values, masked ones included.
    pub fn arg_values(&self) -> impl Iterator<Item = &str> + '_ {
        self.args.iter().map(|arg| arg.value.as_str())
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            f.write_str(" ")?;
            f.write_str(if arg.masked { MASK } else { &arg.value })?;
        }
        Ok(())
    }
}

/// Character encoding of captured process output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl Encoding {
    /// Decodes captured bytes into text. UTF-8 decodes lossily (invalid
    /// sequences become replacement characters); Latin-1 maps every byte
    /// one-to-one.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// The enclosing build's prepared state: environment, workspace directory,
/// optional script path, and optional output encoding. Drivers are
/// pre-filled from it instead of being wired up field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildContext {
    pub env: EnvVars,
    pub workspace: PathBuf,
    pub script: Option<PathBuf>,
    pub encoding: Option<Encoding>,
}

impl BuildContext {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        BuildContext {
            env: EnvVars::new(),
            workspace: workspace.into(),
            script: None,
            encoding: None,
        }
    }

    pub fn with_env(mut self, env: EnvVars) -> Self {
        self.env = env;
        self
    }

    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Directory containing the configured script. A bare file name has no
    /// parent component and resolves to the current directory.
    pub fn script_dir(&self) -> Option<PathBuf> {
        let script = self.script.as_ref()?;
        let parent = script
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Some(parent.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_display_joins_with_spaces() {
        let command = CommandLine::new("turbo").arg("build").arg("--profile");
        assert_eq!(command.to_string(), "turbo build --profile");
        assert_eq!(CommandLine::new("true").to_string(), "true");
    }

    #[test]
    fn test_masked_arguments_render_hidden() {
        let command = CommandLine::new("turbo")
            .arg("login")
            .arg_masked("hunter2");
        let rendered = command.to_string();
        assert_eq!(rendered, "turbo login ******");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_arg_values_stay_verbatim() {
        let command = CommandLine::new("turbo")
            .arg("login")
            .arg_masked("hunter2")
            .args(["--quiet", "--retry"]);
        let values: Vec<&str> = command.arg_values().collect();
        assert_eq!(values, ["login", "hunter2", "--quiet", "--retry"]);
    }

    #[test]
    fn test_encoding_defaults_to_utf8() {
        assert_eq!(Encoding::default(), Encoding::Utf8);
    }

    #[test]
    fn test_utf8_decodes_lossily() {
        assert_eq!(Encoding::Utf8.decode(b"hello"), "hello");
        let decoded = Encoding::Utf8.decode(&[0x68, 0x69, 0xFF]);
        assert!(decoded.starts_with("hi"));
        assert!(decoded.contains('\u{FFFD}'));
    }

    #[test]
    fn test_latin1_maps_bytes_one_to_one() {
        let decoded = Encoding::Latin1.decode(&[0x63, 0x61, 0x66, 0xE9]);
        assert_eq!(decoded, "café");
    }

    #[test]
    fn test_encoding_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Encoding::Utf8).unwrap(), "\"utf8\"");
        let parsed: Encoding = serde_json::from_str("\"latin1\"").unwrap();
        assert_eq!(parsed, Encoding::Latin1);
    }

    #[test]
    fn test_build_context_fluent_setup() {
        let context = BuildContext::new("/ws/job")
            .with_env_var("CI", "true")
            .with_script("/ws/job/scripts/deploy.sh")
            .with_encoding(Encoding::Latin1);
        assert_eq!(context.env.get("CI").map(String::as_str), Some("true"));
        assert_eq!(context.workspace, PathBuf::from("/ws/job"));
        assert_eq!(context.encoding, Some(Encoding::Latin1));
    }

    #[test]
    fn test_script_dir_is_the_script_parent() {
        let context = BuildContext::new("/ws").with_script("/ws/scripts/deploy.sh");
        assert_eq!(context.script_dir(), Some(PathBuf::from("/ws/scripts")));
    }

    #[test]
    fn test_script_dir_of_bare_file_name() {
        let context = BuildContext::new("/ws").with_script("deploy.sh");
        assert_eq!(context.script_dir(), Some(PathBuf::from(".")));
    }

    #[test]
    fn test_script_dir_without_script() {
        assert_eq!(BuildContext::new("/ws").script_dir(), None);
    }
}
