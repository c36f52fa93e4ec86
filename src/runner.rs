//! Script execution for the filesystem-backed system.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Runs script contents from a temporary file.
#[derive(Debug, Clone, Default)]
pub struct ScriptRunner {
    interpreter: Option<String>,
    working_dir: Option<PathBuf>,
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run scripts through `program` instead of executing them directly
    #[must_use]
    pub fn with_interpreter(mut self, program: impl Into<String>) -> Self {
        self.interpreter = Some(program.into());
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Write `contents` to a temp file named after `name` and run it with
    /// inherited stdio. A non-zero exit status is an error.
    pub fn run(&self, name: &str, contents: &[u8]) -> Result<()> {
        let dir = tempfile::Builder::new()
            .prefix("dotconverge-script")
            .tempdir()
            .context("Failed to create script directory")?;
        let script = dir.path().join(file_name(name));

        fs::write(&script, contents)
            .with_context(|| format!("Failed to write {}", script.display()))?;
        make_executable(&script)?;

        let status = self.command(&script).status().with_context(|| {
            format!("Failed to execute: {}", self.describe(&script))
        })?;
        log::debug!("Script {name} exited with {status}");

        check_status(status)
    }

    fn command(&self, script: &Path) -> Command {
        let mut cmd = match &self.interpreter {
            Some(program) => {
                let mut cmd = Command::new(program);
                cmd.arg(script);
                cmd
            }
            None => Command::new(script),
        };
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }

    fn describe(&self, script: &Path) -> String {
        match &self.interpreter {
            Some(program) => format!("{program} {}", script.display()),
            None => script.display().to_string(),
        }
    }
}

/// Last path component of a script name, or a fixed fallback
fn file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "script".to_string())
}

fn check_status(status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => anyhow::bail!("exit status {code}"),
        None => anyhow::bail!("terminated by signal"),
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("Failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
