use super::{
    environment::Environment, Correlation, SubmitError, Submitter, ENV_FILE, JDL_FILE, JOBS_FILE,
    SHIM_FILE,
};
use crate::{
    config::JobConfig,
    executors::{condor::CondorExecutor, dry::DryExecutor, Executors},
};
use std::{
    collections::BTreeSet,
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use tempfile::{tempdir, TempDir};

fn config(root: &TempDir) -> JobConfig {
    let mut config = JobConfig::new("/bin/echo");
    config.logdir = root.path().to_path_buf();
    config
}

fn scheduler(script: &str) -> Executors {
    Executors::Condor(CondorExecutor {
        exec: PathBuf::from("sh"),
        params: vec!["-c".to_string(), script.to_string()],
    })
}

fn dry(config: JobConfig) -> Submitter {
    Submitter::new(
        config,
        Environment::from_iter([("HOME", "/home/user")]),
        Executors::Dry(DryExecutor),
    )
}

fn files(path: &Path) -> BTreeSet<String> {
    fs::read_dir(path)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

fn read(path: &Path, file: &str) -> String {
    fs::read_to_string(path.join(file)).unwrap()
}

#[test]
pub fn named_jobs_scenario() {
    let root = tempdir().unwrap();
    let mut config = config(&root);
    config.job_args = vec!["a".into(), "b".into()];
    config.job_names = vec!["x".into(), "y".into()];

    let mut submitter = Submitter::new(
        config,
        Environment::default(),
        scheduler("cat > /dev/null; echo 'Submitting job(s)..'; echo '2 job(s) submitted to cluster 4711.'"),
    );
    let result = submitter.submit(Some("run")).unwrap().clone();
    let log_dir = root.path().join("run");

    assert_eq!(result.log_dir, log_dir);
    assert_eq!(result.cluster_id, 4711);
    assert_eq!(
        result.jobs,
        vec![
            ("4711.0".to_string(), "x".to_string()),
            ("4711.1".to_string(), "y".to_string())
        ]
    );
    assert_eq!(submitter.last_submit(), Some(&result));

    let executable = fs::canonicalize("/bin/echo").unwrap();
    assert_eq!(
        read(&log_dir, JOBS_FILE),
        format!(
            "[EXECUTABLE] {}\n[NJOBS_PER_ARG] 1\n[ARGUMENTS]\nx: a\ny: b\n",
            executable.to_string_lossy()
        )
    );
    assert!(read(&log_dir, JDL_FILE).ends_with("queue 1 JobName,JobArgs from (\nx, a\ny, b\n)\n"));
}

#[test]
pub fn all_artifacts_are_written() {
    let root = tempdir().unwrap();
    let mut submitter = dry(config(&root));

    let log_dir = submitter.submit(Some("run")).unwrap().log_dir.clone();

    assert_eq!(
        files(&log_dir),
        BTreeSet::from_iter([ENV_FILE, JOBS_FILE, SHIM_FILE, JDL_FILE].map(String::from))
    );
    assert_eq!(read(&log_dir, ENV_FILE), "export HOME=\"/home/user\"\n");

    let shim = read(&log_dir, SHIM_FILE);
    assert!(shim.starts_with("#!/bin/bash\n"));
    assert!(shim.contains("source env.sh\n"));
    assert!(shim.contains("exec $EXECUTABLE $ARGS\n"));
    let mode = fs::metadata(log_dir.join(SHIM_FILE))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o111, 0o111);
}

#[test]
pub fn single_job_without_arguments() {
    let root = tempdir().unwrap();
    let mut submitter = dry(config(&root));

    let log_dir = submitter.submit(Some("single")).unwrap().log_dir.clone();

    assert!(!read(&log_dir, JOBS_FILE).contains("[ARGUMENTS]"));
    assert!(read(&log_dir, JDL_FILE).ends_with("\nqueue 1\n"));
}

#[test]
pub fn duplicate_names_fall_back_to_indices() {
    let root = tempdir().unwrap();
    let mut config = config(&root);
    config.job_args = vec!["a".into(), "b".into()];
    config.job_names = vec!["x".into(), "x".into()];
    assert_eq!(Correlation::resolve(&config), Correlation::Indexed);

    let mut submitter = Submitter::new(
        config,
        Environment::default(),
        scheduler("cat > /dev/null; echo '2 job(s) submitted to cluster 9.'"),
    );
    let result = submitter.submit(Some("dup")).unwrap();

    assert_eq!(result.cluster_id, 9);
    assert!(result.jobs.is_empty());
    assert!(read(&result.log_dir, JOBS_FILE).ends_with("[ARGUMENTS]\n0: a\n1: b\n"));
}

#[test]
pub fn empty_first_argument() {
    let root = tempdir().unwrap();
    let mut config = config(&root);
    config.job_args = vec![String::new()];

    let mut submitter = dry(config);
    let log_dir = submitter.submit(Some("empty")).unwrap().log_dir.clone();

    assert!(read(&log_dir, JDL_FILE).ends_with("queue 1 JobArgs from (\n_DUMMY_\n)\n"));
    assert!(read(&log_dir, JOBS_FILE).ends_with("[ARGUMENTS]\n0: \n"));
}

#[test]
pub fn clear_log_keeps_only_latest_submission() {
    let root = tempdir().unwrap();
    let mut config = config(&root);
    config.clear_log = true;

    let mut submitter = dry(config);
    let log_dir = submitter.submit(Some("again")).unwrap().log_dir.clone();
    fs::write(log_dir.join("1.0.out"), "old output").unwrap();

    submitter.submit(Some("again")).unwrap();

    assert_eq!(
        files(&log_dir),
        BTreeSet::from_iter([ENV_FILE, JOBS_FILE, SHIM_FILE, JDL_FILE].map(String::from))
    );
}

#[test]
pub fn existing_log_dir_is_reused() {
    let root = tempdir().unwrap();
    let mut submitter = dry(config(&root));

    let log_dir = submitter.submit(Some("again")).unwrap().log_dir.clone();
    fs::write(log_dir.join("1.0.out"), "old output").unwrap();
    submitter.submit(Some("again")).unwrap();

    assert!(log_dir.join("1.0.out").exists());
}

#[test]
pub fn anonymous_submission_uses_timestamp() {
    let root = tempdir().unwrap();
    let mut submitter = dry(config(&root));

    let log_dir = submitter.submit(None).unwrap().log_dir.clone();

    assert_eq!(log_dir.parent(), Some(root.path()));
    assert!(log_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .parse::<i64>()
        .is_ok());
}

#[test]
pub fn scheduler_receives_description() {
    let root = tempdir().unwrap();
    let received = root.path().join("received");
    let mut config = config(&root);
    config.job_args = vec!["a".into()];

    let mut submitter = Submitter::new(
        config,
        Environment::default(),
        scheduler(&format!(
            "cat > '{}'; echo '1 job(s) submitted to cluster 1.' >&2",
            received.to_string_lossy()
        )),
    );
    let result = submitter.submit(Some("stdin")).unwrap();

    assert_eq!(result.cluster_id, 1);
    assert_eq!(
        fs::read_to_string(&received).unwrap(),
        read(&result.log_dir, JDL_FILE)
    );
}

#[test]
pub fn rejected_submission_has_no_job_ids() {
    let root = tempdir().unwrap();
    let mut config = config(&root);
    config.job_args = vec!["a".into(), "b".into()];
    config.job_names = vec!["x".into(), "y".into()];

    let mut submitter = Submitter::new(
        config,
        Environment::default(),
        scheduler("cat > /dev/null; echo 'ERROR: Failed to connect to local queue manager'; exit 1"),
    );
    let result = submitter.submit(Some("rejected")).unwrap().clone();

    assert_eq!(result.cluster_id, 0);
    assert!(result.jobs.is_empty());
    assert!(result.is_rejected());
    assert!(result.output.contains("Failed to connect"));
    assert!(matches!(
        result.accepted(),
        Err(SubmitError::SubmissionRejected { .. })
    ));
}

#[test]
pub fn last_submit_is_overwritten() {
    let root = tempdir().unwrap();
    let marker = root.path().join("submitted");
    let mut config = config(&root);
    config.job_args = vec!["a".into()];
    config.job_names = vec!["x".into()];

    // accept the first submission only
    let mut submitter = Submitter::new(
        config,
        Environment::default(),
        scheduler(&format!(
            "cat > /dev/null; if [ ! -e '{0}' ]; then touch '{0}'; echo '1 job(s) submitted to cluster 3.'; fi",
            marker.to_string_lossy()
        )),
    );

    assert_eq!(submitter.submit(Some("first")).unwrap().jobs.len(), 1);
    assert_eq!(submitter.submit(Some("second")).unwrap().cluster_id, 0);
    assert!(submitter.last_submit().unwrap().jobs.is_empty());
}

#[test]
pub fn missing_scheduler_is_fatal() {
    let root = tempdir().unwrap();
    let mut submitter = Submitter::new(
        config(&root),
        Environment::default(),
        Executors::Condor(CondorExecutor {
            exec: PathBuf::from("/nonexistent/condor_submit"),
            params: Vec::new(),
        }),
    );

    let result = submitter.submit(Some("missing"));

    assert!(matches!(result, Err(SubmitError::SchedulerInvocation(_))));
    assert!(submitter.last_submit().is_none());
    // no rollback of the written artifacts
    assert!(root.path().join("missing").join(JDL_FILE).exists());
}

#[test]
pub fn unusable_log_root_is_fatal() {
    let root = tempdir().unwrap();
    let file = root.path().join("file");
    fs::write(&file, "").unwrap();

    let mut config = config(&root);
    config.logdir = file;
    let mut submitter = dry(config);

    assert!(matches!(
        submitter.submit(Some("run")),
        Err(SubmitError::Directory { .. })
    ));
}

#[test]
pub fn run_name_stays_below_log_root() {
    let root = tempdir().unwrap();
    let other = tempdir().unwrap();
    let precious = other.path().join("precious");
    fs::write(&precious, "keep me").unwrap();

    let mut config = config(&root);
    config.clear_log = true;
    let mut submitter = dry(config);

    let result = submitter.submit(Some(other.path().to_str().unwrap()));

    assert!(matches!(result, Err(SubmitError::Directory { .. })));
    assert!(precious.exists());
    assert!(matches!(
        submitter.submit(Some("..")),
        Err(SubmitError::Directory { .. })
    ));
    assert!(root.path().is_dir());
}
