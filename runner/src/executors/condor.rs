use super::{ExecutorError, SchedulerOutput};
use crate::config::ExecutorConfig;
use std::{
    io::{self, ErrorKind, Read, Write},
    path::PathBuf,
    process::{Command, Stdio},
    thread,
};
use tracing::{debug, instrument};

/// Executor handing the submit description to `condor_submit` over stdin
#[derive(Debug, Clone)]
pub struct CondorExecutor {
    pub exec: PathBuf,
    pub params: Vec<String>,
}

impl CondorExecutor {
    pub fn load(config: &ExecutorConfig) -> Self {
        Self {
            exec: config.exec.clone(),
            params: config.params.clone(),
        }
    }

    /// Blocks until the scheduler exited, there is no timeout
    #[instrument(skip(self, jdl), level = "debug")]
    pub fn execute(&self, jdl: &str) -> Result<SchedulerOutput, ExecutorError> {
        // stdout and stderr share one pipe to keep the order of the scheduler messages
        let (mut reader, writer) = io::pipe().map_err(ExecutorError::Pipe)?;

        let mut command = Command::new(&self.exec);
        command
            .args(self.params.iter())
            .stdin(Stdio::piped())
            .stdout(writer.try_clone().map_err(ExecutorError::Pipe)?)
            .stderr(writer);

        let mut handle = command
            .spawn()
            .map_err(|error| ExecutorError::Spawn(self.exec.clone(), error))?;
        // the command still holds the write ends, reading would never see EOF
        drop(command);

        let mut stdin = handle
            .stdin
            .take()
            .ok_or(ExecutorError::MissingPipe("stdin"))?;

        debug!("Scheduler waiting on {}", handle.id());

        // stdin is fed from its own thread, a large description would otherwise dead lock
        // against a full output pipe
        let (written, read) = thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let written = stdin.write_all(jdl.as_bytes());
                // Dropping stdin here will close the underlying file descriptor
                // condor_submit reads the description until EOF
                drop(stdin);

                written
            });

            let mut buffer = Vec::new();
            let read = reader.read_to_end(&mut buffer).map(|_| buffer);

            (
                writer
                    .join()
                    .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked"))),
                read,
            )
        });

        let status = handle.wait().map_err(ExecutorError::Wait)?;
        let buffer = read.map_err(ExecutorError::Pipe)?;

        match written {
            Ok(()) => {}
            // the scheduler is allowed to bail out before reading everything
            Err(error) if error.kind() == ErrorKind::BrokenPipe => {
                debug!("Scheduler closed stdin early");
            }
            Err(error) => return Err(ExecutorError::Stdin(error)),
        }

        Ok(SchedulerOutput {
            output: String::from_utf8_lossy(&buffer).into_owned(),
            status: status.code(),
        })
    }
}
