// Command executor - hands each file to an external host command
// reason: tokio::process for async child management, env allowlisting

use crate::{current_runtime, display_name};
use porter_core::domain::ImportRequest;
use porter_core::port::{ExecutionError, ImportExecutor, OutcomeReporter, TimeProvider};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

/// Exit code a host command uses when the user cancelled the import (SIGINT convention)
pub const CANCELLED_EXIT_CODE: i32 = 130;

/// Environment always passed to the command
pub const ENV_INTERACTIVE: &str = "PORTER_IMPORT_INTERACTIVE";
pub const ENV_OWNER_ID: &str = "PORTER_OWNER_ID";

/// Variables passed through from the daemon's environment by default
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "USER", "LANG", "TMPDIR"];

/// Longest stderr tail kept in a failure message
const MAX_STDERR_CHARS: usize = 500;

/// Runs `{program} {args..} {source_path}` per import.
///
/// Exit code 0 is a completed import, 130 a cancelled one, anything else
/// (or death by signal) a failure carrying the tail of stderr.
pub struct CommandImportExecutor {
    program: String,
    args: Vec<String>,
    env_allowlist: Vec<String>,
    time_provider: Arc<dyn TimeProvider>,
}

impl CommandImportExecutor {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        env_allowlist: Vec<String>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            env_allowlist,
            time_provider,
        }
    }

    /// Build from a whitespace separated command line such as `"unity-import --batch"`
    pub fn from_command_line(
        command_line: &str,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self, ExecutionError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ExecutionError::SpawnFailed("empty import command".to_string()))?;
        let allowlist = DEFAULT_ENV_ALLOWLIST.iter().map(|v| v.to_string()).collect();
        Ok(Self::new(program, parts.collect(), allowlist, time_provider))
    }

    /// Keep only allow-listed variables
    fn filter_env(&self, env: impl IntoIterator<Item = (String, String)>) -> HashMap<String, String> {
        env.into_iter()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .collect()
    }

    fn build_command(&self, request: &ImportRequest) -> Command {
        let mut env = self.filter_env(std::env::vars());
        env.insert(
            ENV_INTERACTIVE.to_string(),
            if request.interactive { "1" } else { "0" }.to_string(),
        );
        env.insert(ENV_OWNER_ID.to_string(), request.owner_id.clone());

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&request.source_path)
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        command
    }
}

impl ImportExecutor for CommandImportExecutor {
    fn begin_import(
        &self,
        request: &ImportRequest,
        reporter: OutcomeReporter,
    ) -> Result<(), ExecutionError> {
        let runtime = current_runtime()?;
        let name = display_name(std::path::Path::new(&request.source_path));

        // Spawning inside the runtime context; failures surface synchronously
        let _guard = runtime.enter();
        let child = self
            .build_command(request)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(format!("{}: {e}", self.program)))?;

        info!(
            command = %self.program,
            path = %request.source_path,
            pid = ?child.id(),
            interactive = request.interactive,
            "Import command started"
        );

        let time_provider = Arc::clone(&self.time_provider);
        let start_time = time_provider.now_millis();
        runtime.spawn(async move {
            let output = child.wait_with_output().await;
            let duration_ms = time_provider.now_millis() - start_time;

            match output {
                Ok(output) => match output.status.code() {
                    Some(0) => {
                        info!(name = %name, duration_ms = duration_ms, "Import command completed");
                        reporter.completed(name);
                    }
                    Some(CANCELLED_EXIT_CODE) => {
                        info!(name = %name, duration_ms = duration_ms, "Import command cancelled");
                        reporter.cancelled(name);
                    }
                    code => {
                        let stderr = stderr_tail(&output.stderr);
                        let message = match code {
                            Some(code) => format!("exit code {code}: {stderr}"),
                            None => format!("terminated by signal: {stderr}"),
                        };
                        warn!(name = %name, exit_code = ?code, duration_ms = duration_ms, "Import command failed");
                        reporter.failed(name, message.trim_end().to_string());
                    }
                },
                Err(e) => {
                    warn!(name = %name, error = %e, "Import command could not be awaited");
                    reporter.failed(name, ExecutionError::IoError(e.to_string()).to_string());
                }
            }
        });

        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(MAX_STDERR_CHARS);
    text.chars().skip(skip).collect()
}
