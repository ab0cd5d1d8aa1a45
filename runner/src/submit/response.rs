use super::Correlation;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use tracing_unwrap::ResultExt;

static CLUSTER_V1: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"job\(s\) submitted to cluster ([0-9]+)\.").unwrap_or_log());

/// Known layouts of the `condor_submit` summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// `<n> job(s) submitted to cluster <id>.`
    V1,
}

impl ResponseFormat {
    /// cluster id announced in the scheduler output, if any
    pub fn cluster_id(&self, output: &str) -> Option<u64> {
        match self {
            Self::V1 => {
                let id = CLUSTER_V1.captures(output)?.get(1)?.as_str();

                match id.parse() {
                    Ok(id) => Some(id),
                    Err(error) => {
                        warn!(id = id, "Cluster id is not a valid number: {error}");
                        None
                    }
                }
            }
        }
    }
}

/// `<cluster>.<process>` for every named job, in the order of the names
pub fn job_ids(cluster_id: u64, correlation: &Correlation) -> Vec<(String, String)> {
    match correlation {
        Correlation::Named(names) => names
            .iter()
            .enumerate()
            .map(|(index, name)| (format!("{cluster_id}.{index}"), name.clone()))
            .collect(),
        Correlation::Single | Correlation::Indexed => Vec::new(),
    }
}
