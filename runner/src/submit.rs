pub mod environment;
pub mod jdl;
pub mod logdir;
pub mod manifest;
pub mod response;

#[cfg(test)]
mod submit_test;

use crate::{
    config::{ConfigErrors, JobConfig},
    executors::{ExecutorError, Executors},
};
use environment::Environment;
use jdl::Jdl;
use response::ResponseFormat;
use std::{
    fs::{self, Permissions},
    io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// captured environment, sourced by the launcher on the worker
pub const ENV_FILE: &str = "env.sh";
/// job to argument mapping for bookkeeping
pub const JOBS_FILE: &str = "jobs.dat";
/// launcher used as the condor executable
pub const SHIM_FILE: &str = "csub.exec";
/// the rendered submit description
pub const JDL_FILE: &str = "jdl";

const SHIM: &str = "#!/bin/bash\n\nsource env.sh\nEXECUTABLE=$1\nshift\nARGS=\"$@\"\nexec $EXECUTABLE $ARGS\n";

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Failed to prepare log directory {path:?}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write {path:?}")]
    SubmissionIO {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to invoke the scheduler")]
    SchedulerInvocation(#[from] ExecutorError),
    #[error("No cluster id found in scheduler output")]
    SubmissionRejected { output: String },
}

/// How a single job of a submission is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    /// no per job arguments, a single job (times num_repeats)
    Single,
    /// jobs are addressed by their index in `job_args`
    Indexed,
    /// jobs are addressed by the name at the same position in `job_names`
    Named(Vec<String>),
}

impl Correlation {
    pub fn resolve(config: &JobConfig) -> Self {
        if config.job_args.is_empty() {
            Self::Single
        } else if config.uses_job_names() {
            Self::Named(config.job_names.clone())
        } else {
            Self::Indexed
        }
    }

    /// label of the job at `index` as used in the manifest
    pub fn label(&self, index: usize) -> String {
        match self {
            Self::Named(names) => names[index].clone(),
            Self::Single | Self::Indexed => index.to_string(),
        }
    }

    /// condor macro distinguishing the log files of individual jobs
    pub fn macro_name(&self) -> &'static str {
        match self {
            Self::Named(_) => "$(JobName)",
            Self::Single | Self::Indexed => "$(Process)",
        }
    }
}

/// Everything a submission needs that isn't taken verbatim from the config
#[derive(Debug, Clone)]
pub struct SubmissionPlan {
    pub correlation: Correlation,
    pub log_dir: PathBuf,
    pub executable: PathBuf,
    pub inputs: Vec<String>,
    pub requirements: Vec<String>,
}

impl SubmissionPlan {
    pub fn new(config: &JobConfig, log_dir: PathBuf) -> Result<Self, SubmitError> {
        let executable = resolve_executable(&config.executable)?;

        let inputs = std::iter::once(log_dir.join(ENV_FILE))
            .chain(config.aux_input.iter().cloned())
            .map(|path| path.to_string_lossy().into_owned())
            .collect();

        let mut requirements = vec![format!("Arch == \"{}\"", config.arch)];
        if !config.requirements.is_empty() {
            requirements.push(config.requirements.clone());
        }
        if !config.os.is_empty() {
            // either a native match or a worker able to run the job in a container
            requirements.push(format!(
                "OpSysAndVer == \"{}\" || HasSingularity =?= true",
                config.os
            ));
        }

        Ok(Self {
            correlation: Correlation::resolve(config),
            log_dir,
            executable,
            inputs,
            requirements,
        })
    }

    /// path of an artifact inside the log directory
    pub fn path(&self, file: &str) -> PathBuf {
        self.log_dir.join(file)
    }
}

/// Outcome of the last call to `Submitter::submit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    /// cluster id assigned by the scheduler, 0 if none was found
    pub cluster_id: u64,
    /// (`<cluster>.<index>`, job name), only filled for named jobs
    pub jobs: Vec<(String, String)>,
    pub log_dir: PathBuf,
    /// combined stdout and stderr of the scheduler
    pub output: String,
}

impl SubmissionResult {
    pub fn is_rejected(&self) -> bool {
        self.cluster_id == 0
    }

    /// turn a submission without cluster id into an error
    pub fn accepted(self) -> Result<Self, SubmitError> {
        if self.is_rejected() {
            Err(SubmitError::SubmissionRejected {
                output: self.output,
            })
        } else {
            Ok(self)
        }
    }
}

/// Builds the submission artifacts for a `JobConfig` and hands them to the scheduler
#[derive(Debug)]
pub struct Submitter {
    config: JobConfig,
    environment: Environment,
    executor: Executors,
    last_submit: Option<SubmissionResult>,
}

impl Submitter {
    pub fn new(config: JobConfig, environment: Environment, executor: Executors) -> Self {
        Self {
            config,
            environment,
            executor,
            last_submit: None,
        }
    }

    /// create a submitter with the configured executor and the environment of this process
    pub fn load(config: JobConfig) -> Result<Self, ConfigErrors> {
        let executor = Executors::load(&config.scheduler)?;

        Ok(Self::new(config, Environment::capture(), executor))
    }

    pub fn last_submit(&self) -> Option<&SubmissionResult> {
        self.last_submit.as_ref()
    }

    /// Write all artifacts into the log directory and return the plan with the rendered jdl
    pub fn prepare(&self, name: Option<&str>) -> Result<(SubmissionPlan, String), SubmitError> {
        let log_dir = logdir::resolve(&self.config.logdir, name)?;
        logdir::prepare(&log_dir, self.config.clear_log)?;

        let plan = SubmissionPlan::new(&self.config, log_dir)?;
        debug!(
            correlation = ?plan.correlation,
            variables = self.environment.len(),
            "Resolved submission plan"
        );

        write_artifact(&plan.path(ENV_FILE), &self.environment.render())?;
        write_artifact(
            &plan.path(JOBS_FILE),
            &manifest::render(
                &plan.executable,
                self.config.num_repeats,
                &self.config.job_args,
                &plan.correlation,
            ),
        )?;

        let shim = plan.path(SHIM_FILE);
        write_artifact(&shim, SHIM)?;
        fs::set_permissions(&shim, Permissions::from_mode(0o755)).map_err(|source| {
            SubmitError::SubmissionIO {
                path: shim.clone(),
                source,
            }
        })?;

        let jdl = Jdl::build(&self.config, &plan).to_string();
        write_artifact(&plan.path(JDL_FILE), &jdl)?;

        Ok((plan, jdl))
    }

    /// Build and submit one descriptor, overwriting the previous result
    #[instrument(skip(self), level = "info")]
    pub fn submit(&mut self, name: Option<&str>) -> Result<&SubmissionResult, SubmitError> {
        self.last_submit = None;

        let (plan, jdl) = self.prepare(name)?;
        let output = self.executor.execute(&jdl)?;

        debug!(status = ?output.status, "Scheduler exited");
        info!("{}", output.output.trim());

        let result = match ResponseFormat::V1.cluster_id(&output.output) {
            Some(cluster_id) => SubmissionResult {
                cluster_id,
                jobs: response::job_ids(cluster_id, &plan.correlation),
                log_dir: plan.log_dir,
                output: output.output,
            },
            None => {
                warn!("No cluster id found!");

                SubmissionResult {
                    cluster_id: 0,
                    jobs: Vec::new(),
                    log_dir: plan.log_dir,
                    output: output.output,
                }
            }
        };

        info!("Logdir is {}", result.log_dir.to_string_lossy());

        Ok(self.last_submit.insert(result))
    }
}

fn resolve_executable(executable: &Path) -> Result<PathBuf, SubmitError> {
    // a missing executable can still be valid on the worker
    fs::canonicalize(executable)
        .or_else(|_| std::path::absolute(executable))
        .map_err(|source| SubmitError::SubmissionIO {
            path: executable.to_path_buf(),
            source,
        })
}

fn write_artifact(path: &Path, content: &str) -> Result<(), SubmitError> {
    fs::write(path, content).map_err(|source| SubmitError::SubmissionIO {
        path: path.to_path_buf(),
        source,
    })
}
