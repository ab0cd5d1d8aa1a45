use clap::Parser;
use csub::{config::JobConfig, submit::JDL_FILE, Submitter};
use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_unwrap::ResultExt;

/// Build a condor submit description for a job config and submit it
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// job config (YAML)
    #[arg(short, long, default_value = "csub.yaml")]
    config: PathBuf,
    /// name of the log directory below `logdir`, defaults to the current unix time
    #[arg(short, long)]
    name: Option<String>,
    /// additional per job argument, appended to `job_args`
    #[arg(short = 'a', long = "arg")]
    job_args: Vec<String>,
    /// additional job name, appended to `job_names`
    #[arg(short = 'j', long = "job-name")]
    job_names: Vec<String>,
    /// write all files but don't call the scheduler
    #[arg(long)]
    dry_run: bool,
    /// write the submit description to stdout
    #[arg(long)]
    print_jdl: bool,
    /// fail if the scheduler output contains no cluster id
    #[arg(long)]
    strict: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match JobConfig::load(&args.config) {
        Ok(config) => config,
        Err(error) => {
            error!(error = ?error, "Failed to load {}: {error}", args.config.to_string_lossy());
            exit(1)
        }
    };

    config.job_args.extend(args.job_args);
    config.job_names.extend(args.job_names);
    if args.dry_run {
        config.scheduler.name = "dry".to_string();
    }

    if config.preflight_checks() {
        error!("Config contains errors, not submitting");
        exit(1)
    }

    let mut submitter = match Submitter::load(config) {
        Ok(submitter) => submitter,
        Err(error) => {
            error!(error = ?error, "Failed to set up submission: {error}");
            exit(1)
        }
    };

    let result = match submitter.submit(args.name.as_deref()) {
        Ok(result) => result.clone(),
        Err(error) => {
            error!(error = ?error, "Submission failed: {error}");
            exit(1)
        }
    };

    if args.print_jdl {
        let jdl = fs::read_to_string(result.log_dir.join(JDL_FILE)).unwrap_or_log();
        io::stdout().write_all(jdl.as_bytes()).unwrap_or_log();
    }

    println!("{}", result.cluster_id);
    for (id, name) in result.jobs.iter() {
        println!("{id} {name}");
    }

    if args.strict && !args.dry_run {
        if let Err(error) = result.accepted() {
            error!("{error}");
            exit(2)
        }
    }

    info!("Done with submission");
}
