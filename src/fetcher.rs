//! Per-target fetch: command construction and bounded execution.
//!
//! The fetcher builds the full ipmitool invocation for one target (local or
//! remote), runs it through an injectable [`CommandRunner`] with a wall-clock
//! timeout, and hands the captured output to the parser. Exactly one
//! subprocess is spawned per call; there are no retries.

use async_trait::async_trait;
use chrono::Utc;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::connection::Connection;
use crate::parser;
use crate::sink::Accumulator;

/// Failure of one subprocess invocation.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command timed out after {timeout:?}")]
    TimedOut { timeout: Duration },

    #[error("failed to start process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("process exited with {status}")]
    Exited {
        status: std::process::ExitStatus,
        output: Vec<u8>,
    },
}

impl CommandError {
    /// Output captured before the failure, if any.
    pub fn captured(&self) -> &[u8] {
        match self {
            CommandError::Exited { output, .. } => output,
            _ => &[],
        }
    }
}

/// Failure of one target's fetch. Reported per-target: it never aborts
/// sibling fetches.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to run command {command}: {source} - {output}")]
    Command {
        command: String,
        source: CommandError,
        output: String,
    },

    #[error("failed to scan ipmitool output: {0}")]
    Scan(#[from] std::io::Error),
}

/// Executes a command with combined stdout/stderr capture and a wall-clock
/// timeout. Injectable so tests substitute a fake executor for the real
/// process spawner.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<Vec<u8>, CommandError>;
}

/// Production runner on top of `tokio::process`. Exceeding the timeout is a
/// hard cutoff: the child is killed rather than awaited further.
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<Vec<u8>, CommandError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => return Err(CommandError::TimedOut { timeout }),
        };

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        if output.status.success() {
            Ok(combined)
        } else {
            Err(CommandError::Exited {
                status: output.status,
                output: combined,
            })
        }
    }
}

/// Builds the final `(program, args)` invocation: connection options first,
/// then the fixed `dcmi power reading` subcommand, then the sample-period
/// token verbatim if supplied. With sudo the executable is run through
/// `sudo -n` with the original path as the first elevated argument.
pub fn build_invocation(
    path: &str,
    mut opts: Vec<String>,
    sample_period: &str,
    use_sudo: bool,
) -> (String, Vec<String>) {
    opts.extend(
        ["dcmi", "power", "reading"]
            .iter()
            .map(|s| s.to_string()),
    );

    if !sample_period.is_empty() {
        opts.push(sample_period.to_string());
    }

    let mut program = path.to_string();
    if use_sudo {
        // -n: never prompt for input
        opts.insert(0, program);
        opts.insert(0, "-n".to_string());
        program = "sudo".to_string();
    }

    (program, opts)
}

/// Command line for logging, with the `-P` value masked.
fn display_command(program: &str, args: &[String]) -> String {
    let mut parts = vec![program.to_string()];
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            parts.push("<redacted>".to_string());
            mask_next = false;
        } else {
            if arg == "-P" {
                mask_next = true;
            }
            parts.push(arg.clone());
        }
    }
    parts.join(" ")
}

/// Fetches the power reading for one target and routes it into the parser.
#[derive(Clone)]
pub struct Fetcher {
    pub path: String,
    pub privilege: String,
    pub use_sudo: bool,
    pub sample_period: String,
    pub timeout: Duration,
    pub runner: Arc<dyn CommandRunner>,
}

impl Fetcher {
    /// Runs one fetch-and-parse cycle for `target` (empty = local host).
    ///
    /// The measurement timestamp is taken immediately after the subprocess
    /// returns. On failure the error carries the full command line, the
    /// underlying cause, and any captured output.
    pub async fn fetch(&self, acc: &dyn Accumulator, target: &str) -> Result<(), FetchError> {
        let mut hostname = String::new();
        let mut opts = Vec::new();
        if !target.is_empty() {
            let conn = Connection::new(target, &self.privilege);
            hostname = conn.hostname.clone();
            opts = conn.options();
        }

        let (program, args) = build_invocation(&self.path, opts, &self.sample_period, self.use_sudo);
        debug!("Running {}", display_command(&program, &args));

        let result = self.runner.run(&program, &args, self.timeout).await;
        let measured_at = Utc::now();

        let out = result.map_err(|source| FetchError::Command {
            command: std::iter::once(program.as_str())
                .chain(args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" "),
            output: String::from_utf8_lossy(source.captured()).into_owned(),
            source,
        })?;

        parser::emit_power_reading(acc, &hostname, &out, measured_at)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_invocation_local() {
        let (program, args) = build_invocation("/usr/bin/ipmitool", Vec::new(), "", false);
        assert_eq!(program, "/usr/bin/ipmitool");
        assert_eq!(args, vec!["dcmi", "power", "reading"]);
    }

    #[test]
    fn test_build_invocation_with_connection_options() {
        let conn = Connection::new("root:pw@lan(10.0.0.5)", "");
        let (program, args) = build_invocation("/usr/bin/ipmitool", conn.options(), "", false);
        assert_eq!(program, "/usr/bin/ipmitool");
        assert_eq!(
            args,
            vec![
                "-I", "lan", "-H", "10.0.0.5", "-U", "root", "-P", "pw", "dcmi", "power",
                "reading"
            ]
        );
    }

    #[test]
    fn test_build_invocation_appends_sample_period() {
        let (_, args) = build_invocation("/usr/bin/ipmitool", Vec::new(), "30_sec", false);
        assert_eq!(args, vec!["dcmi", "power", "reading", "30_sec"]);
    }

    #[test]
    fn test_build_invocation_passes_unknown_period_verbatim() {
        // Tokens outside the documented set are not validated here.
        let (_, args) = build_invocation("/usr/bin/ipmitool", Vec::new(), "2_fortnights", false);
        assert_eq!(args.last().unwrap(), "2_fortnights");
    }

    #[test]
    fn test_build_invocation_sudo_rewrite() {
        let (program, args) =
            build_invocation("/usr/bin/ipmitool", Vec::new(), "5_sec", true);
        assert_eq!(program, "sudo");
        assert_eq!(
            args,
            vec!["-n", "/usr/bin/ipmitool", "dcmi", "power", "reading", "5_sec"]
        );
    }

    #[test]
    fn test_display_command_masks_password() {
        let conn = Connection::new("root:secret@lan(10.0.0.5)", "");
        let (program, args) = build_invocation("/usr/bin/ipmitool", conn.options(), "", false);

        let shown = display_command(&program, &args);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("-P <redacted>"));
        assert!(shown.contains("-H 10.0.0.5"));
    }

    #[test]
    fn test_command_error_captured_output() {
        use std::os::unix::process::ExitStatusExt;

        let err = CommandError::Exited {
            status: std::process::ExitStatus::from_raw(256),
            output: b"Unable to establish IPMI v2 / RMCP+ session".to_vec(),
        };
        assert_eq!(err.captured(), b"Unable to establish IPMI v2 / RMCP+ session");

        let timeout = CommandError::TimedOut {
            timeout: Duration::from_secs(20),
        };
        assert!(timeout.captured().is_empty());
    }
}
