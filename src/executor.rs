//! Runs the world generator as a child process.

use std::{future::Future, path::PathBuf, process::Stdio};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
};
use tracing::{debug, info, warn};

use crate::{
    lifecycle::{DispatchError, DispatchRequest, JobExecutor},
    progress::{ProgressReporter, ERROR_MARKER, SUCCESS_MARKER},
};

/// Prefix for generator lines that would otherwise read as terminal markers.
const FORWARDED_PREFIX: &str = "[generator]";

pub struct CommandExecutor {
    program: PathBuf,
    extra_args: Vec<String>,
    reporter: ProgressReporter,
}

impl CommandExecutor {
    pub fn new(
        program: impl Into<PathBuf>,
        extra_args: Vec<String>,
        reporter: ProgressReporter,
    ) -> Self {
        Self {
            program: program.into(),
            extra_args,
            reporter,
        }
    }

    /// Command-line arguments for one job.
    ///
    /// The generator takes `lat,lng,lat,lng`, so the space-joined
    /// `lng lat lng lat` text is swapped pairwise.
    pub fn command_args(&self, request: &DispatchRequest) -> Result<Vec<String>, DispatchError> {
        let coords: Vec<&str> = request.bbox_text.split_whitespace().collect();
        let [lng1, lat1, lng2, lat2] = coords.as_slice() else {
            return Err(DispatchError(format!(
                "invalid bounding box '{}'",
                request.bbox_text
            )));
        };

        let mut args = self.extra_args.clone();
        args.extend([
            "--bbox".to_string(),
            format!("{lat1},{lng1},{lat2},{lng2}"),
            "--path".to_string(),
            request.selected_world.display().to_string(),
            "--scale".to_string(),
            request.world_scale.to_string(),
            "--ground-level".to_string(),
            request.ground_level.to_string(),
            "--timeout".to_string(),
            request.floodfill_timeout.to_string(),
        ]);
        if request.winter_mode {
            args.push("--winter".to_string());
        }
        Ok(args)
    }
}

impl JobExecutor for CommandExecutor {
    fn dispatch(
        &self,
        request: DispatchRequest,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send {
        let args = self.command_args(&request);
        let program = self.program.clone();
        let reporter = self.reporter.clone();
        async move {
            let args = args?;
            debug!(program = %program.display(), ?args, "spawning generator");
            let child = Command::new(&program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .spawn()
                .map_err(|err| {
                    DispatchError(format!("failed to start {}: {err}", program.display()))
                })?;
            tokio::spawn(monitor(child, reporter));
            Ok(())
        }
    }
}

/// Forwards generator output and turns the exit status into a terminal message.
async fn monitor(mut child: Child, reporter: ProgressReporter) {
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        reporter.emit_message(&forwarded_line(line));
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!("failed to read generator output: {err}");
                    break;
                }
            }
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => {
            info!("generator finished");
            reporter.emit_done("World generation completed.");
        }
        Ok(status) => reporter.emit_error(&format!("Generator exited with {status}")),
        Err(err) => reporter.emit_error(&format!("Failed to wait for generator: {err}")),
    }
}

/// Only the exit status may end a job, so marker-prefixed output is wrapped.
fn forwarded_line(line: &str) -> String {
    if line.starts_with(ERROR_MARKER) || line.starts_with(SUCCESS_MARKER) {
        format!("{FORWARDED_PREFIX} {line}")
    } else {
        line.to_string()
    }
}
