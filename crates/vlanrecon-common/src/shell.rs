//! Shell command execution for platform adapters.
//!
//! Adapters build command strings with [`shellquote`]d arguments and run them
//! through a [`CommandRunner`]. In dry-run mode state-changing commands are
//! logged and recorded instead of executed, while read-only queries still run
//! so that inventory results stay accurate.
//!
//! # Example
//!
//! ```ignore
//! use vlanrecon_common::shell::{CommandRunner, IP_CMD, shellquote};
//!
//! let mut runner = CommandRunner::live();
//! let cmd = format!("{} link set dev {} up", IP_CMD, shellquote("eth0"));
//! let result = runner.run(&cmd).await?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{OpKind, ReconcileError, ReconcileResult};

/// Path to the `ip` command for link, address and route configuration.
pub const IP_CMD: &str = "/sbin/ip";

/// Path to the `brctl` command for bridge control.
pub const BRCTL_CMD: &str = "/sbin/brctl";

/// Path to the `iptables` command for isolation rules.
pub const IPTABLES_CMD: &str = "/sbin/iptables";

/// Path to the `ethtool` command for link parameters.
pub const ETHTOOL_CMD: &str = "/sbin/ethtool";

/// Path to the `echo` command.
pub const ECHO_CMD: &str = "/bin/echo";

/// OPX VLAN configuration tool.
pub const CPS_CONFIG_VLAN_CMD: &str = "cps_config_vlan.py";

/// OPX object getter.
pub const CPS_GET_OID_CMD: &str = "cps_get_oid.py";

/// OPX object setter.
pub const CPS_SET_OID_CMD: &str = "cps_set_oid.py";

/// Regex for characters that need escaping in shell double-quotes.
/// Matches: $, `, ", \, and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// ```
/// use vlanrecon_common::shell::shellquote;
///
/// assert_eq!(shellquote("eth0"), "\"eth0\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Result of a shell command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// The trimmed stdout output.
    pub stdout: String,
    /// The trimmed stderr output.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Converts a non-zero exit into the error for the given primitive.
    pub fn check(
        self,
        kind: OpKind,
        operation: &str,
        target: &str,
        command: &str,
    ) -> ReconcileResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(ReconcileError::op_failed(
                kind,
                operation,
                target,
                format!(
                    "'{}' exited with {}: {}",
                    command,
                    self.exit_code,
                    self.combined_output()
                ),
            ))
        }
    }
}

/// Executes a shell command through `/bin/sh -c`.
pub async fn exec(cmd: &str) -> ReconcileResult<ExecResult> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ReconcileError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    let result = ExecResult {
        exit_code,
        stdout,
        stderr,
    };

    if result.success() {
        tracing::trace!(command = %cmd, exit_code = exit_code, "Command succeeded");
    } else {
        tracing::warn!(
            command = %cmd,
            exit_code = exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Whether state-changing commands are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    #[default]
    Live,
    DryRun,
}

/// Runs adapter commands, honouring the execution mode.
#[derive(Debug, Default)]
pub struct CommandRunner {
    mode: ExecMode,
    recorded: Vec<String>,
}

impl CommandRunner {
    pub fn new(mode: ExecMode) -> Self {
        Self {
            mode,
            recorded: Vec::new(),
        }
    }

    pub fn live() -> Self {
        Self::new(ExecMode::Live)
    }

    pub fn dry_run() -> Self {
        Self::new(ExecMode::DryRun)
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == ExecMode::DryRun
    }

    /// State-changing commands seen in dry-run mode, in issue order.
    pub fn recorded(&self) -> &[String] {
        &self.recorded
    }

    /// Runs a state-changing command.
    ///
    /// In dry-run mode the command is recorded and reported as successful
    /// with empty output.
    pub async fn run(&mut self, cmd: &str) -> ReconcileResult<ExecResult> {
        if self.is_dry_run() {
            tracing::info!(command = %cmd, "dry-run");
            self.recorded.push(cmd.to_string());
            return Ok(ExecResult::default());
        }

        exec(cmd).await
    }

    /// Runs a read-only command in every mode.
    pub async fn query(&mut self, cmd: &str) -> ReconcileResult<ExecResult> {
        exec(cmd).await
    }
}
