pub mod config;
pub mod executors;
pub mod submit;

pub use config::JobConfig;
pub use submit::{Correlation, SubmissionResult, SubmitError, Submitter};
