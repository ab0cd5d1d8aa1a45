use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::Error,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{error, warn};

// check if a file is executable
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::MetadataNotFound(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Executor not supported: {0}")]
    UnsupportedExecutor(String),
    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),
    #[error("Metadata not found")]
    MetadataNotFound(#[from] Error),
    #[error("Failed to parse job config")]
    InvalidConfig(#[from] serde_yaml::Error),
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    // Executable started on the worker, resolved to an absolute path at submit time
    pub executable: PathBuf,

    // one job (times num_repeats) per argument string
    #[serde(default)]
    pub job_args: Vec<String>,
    // only honored if the names are distinct and as many as job_args
    #[serde(default)]
    pub job_names: Vec<String>,
    #[serde(default)]
    pub pre_args: String,
    #[serde(default)]
    pub post_args: String,

    #[serde(default = "default_num_repeats")]
    pub num_repeats: u32,
    // append $(Step) to the arguments of repeated jobs
    #[serde(default = "default_true")]
    pub append_step: bool,

    #[serde(default = "default_request_cpus")]
    pub request_cpus: u32,
    // in MB, as condor_submit expects without a unit
    #[serde(default = "default_request_memory")]
    pub request_memory: u64,

    #[serde(default = "default_arch")]
    pub arch: String,
    #[serde(default)]
    pub os: String,
    // free form ClassAd expression and-ed into the requirements
    #[serde(default)]
    pub requirements: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_flavour")]
    pub flavour: String,

    #[serde(default)]
    pub aux_input: Vec<PathBuf>,

    #[serde(default)]
    pub hold_on_fail: bool,

    #[serde(default = "default_logdir")]
    pub logdir: PathBuf,
    #[serde(default)]
    pub clear_log: bool,

    #[serde(default)]
    pub scheduler: ExecutorConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    // Name of the selected executor, see Executors::load for the selection proccess
    #[serde(default = "default_executor")]
    pub name: String,
    // submission command, fed the jdl over stdin
    #[serde(default = "default_submit_exec")]
    pub exec: PathBuf,
    #[serde(default)]
    pub params: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: default_executor(),
            exec: default_submit_exec(),
            params: Vec::new(),
        }
    }
}

impl JobConfig {
    /// create a config with the defaults of a plain `condor_submit` setup
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        Self {
            executable: executable.into(),
            job_args: Vec::new(),
            job_names: Vec::new(),
            pre_args: String::new(),
            post_args: String::new(),
            num_repeats: default_num_repeats(),
            append_step: true,
            request_cpus: default_request_cpus(),
            request_memory: default_request_memory(),
            arch: default_arch(),
            os: String::new(),
            requirements: String::new(),
            group: default_group(),
            flavour: default_flavour(),
            aux_input: Vec::new(),
            hold_on_fail: false,
            logdir: default_logdir(),
            clear_log: false,
            scheduler: ExecutorConfig::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        if !path.is_file() {
            return Err(ConfigErrors::FileNotFound(path.to_path_buf()));
        }

        Ok(serde_yaml::from_reader(File::open(path)?)?)
    }

    /// job names are only used if they identify every argument uniquely
    pub fn uses_job_names(&self) -> bool {
        !self.job_args.is_empty() && self.job_names.iter().unique().count() == self.job_args.len()
    }

    pub fn preflight_checks(&self) -> bool {
        // attempt to catch all errors instead of piece-by-piece to make debugging easier for users
        let mut contains_error = false;

        match check_executable(&self.executable) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "executable {} is not executable, this might cause problems",
                    self.executable.to_string_lossy()
                );
            }
            // the path only has to exist on the worker
            Err(e) => {
                warn!(
                    "executable {} not found on the submit host, submitting anyway: {e}",
                    self.executable.to_string_lossy()
                );
            }
        }

        if self.num_repeats == 0 {
            error!("num_repeats cannot be 0, every argument needs at least one job");
            contains_error = true;
        }

        if self.request_cpus == 0 {
            error!("request_cpus cannot be 0");
            contains_error = true;
        }

        for input in self.aux_input.iter().filter(|input| !input.exists()) {
            warn!(
                "aux_input {} does not exist, condor will fail to transfer it",
                input.to_string_lossy()
            );
        }

        if !self.job_names.is_empty() && !self.uses_job_names() {
            warn!(
                names = self.job_names.len(),
                distinct = self.job_names.iter().unique().count(),
                args = self.job_args.len(),
                "job_names are ignored since they don't name every argument uniquely, falling back to indices"
            );
        }

        contains_error
    }
}

fn default_num_repeats() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_request_cpus() -> u32 {
    1
}

fn default_request_memory() -> u64 {
    100
}

fn default_arch() -> String {
    "X86_64".to_string()
}

fn default_group() -> String {
    "group_u_CMS.u_zh".to_string()
}

fn default_flavour() -> String {
    "espresso".to_string()
}

fn default_logdir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_executor() -> String {
    "condor".to_string()
}

fn default_submit_exec() -> PathBuf {
    PathBuf::from("condor_submit")
}
