pub mod condor;
pub mod dry;

use crate::config::{ConfigErrors, ExecutorConfig};
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to spawn scheduler {0:?}")]
    Spawn(PathBuf, #[source] io::Error),
    #[error("Failed to set up the output pipe of the scheduler")]
    Pipe(#[source] io::Error),
    #[error("Failed to acquire the {0} pipe of the scheduler")]
    MissingPipe(&'static str),
    #[error("Failed to pass the submit description to the scheduler")]
    Stdin(#[source] io::Error),
    #[error("Failed to wait for the scheduler")]
    Wait(#[source] io::Error),
}

/// Raw result of handing a submit description to the scheduler
#[derive(Debug, Clone, Default)]
pub struct SchedulerOutput {
    /// stdout and stderr, interleaved as written by the scheduler
    pub output: String,
    /// exit code, not interpreted
    pub status: Option<i32>,
}

#[derive(Clone, Debug)]
pub enum Executors {
    Condor(condor::CondorExecutor),
    Dry(dry::DryExecutor),
}

impl Executors {
    pub fn load(config: &ExecutorConfig) -> Result<Self, ConfigErrors> {
        match config.name.to_lowercase().as_str() {
            "condor" => Ok(Self::Condor(condor::CondorExecutor::load(config))),
            "dry" => Ok(Self::Dry(dry::DryExecutor)),
            _ => Err(ConfigErrors::UnsupportedExecutor(config.name.clone())),
        }
    }

    pub fn execute(&self, jdl: &str) -> Result<SchedulerOutput, ExecutorError> {
        match self {
            Self::Condor(executor) => executor.execute(jdl),
            Self::Dry(executor) => Ok(executor.execute(jdl)),
        }
    }
}
