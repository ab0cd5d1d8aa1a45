use super::Correlation;
use std::path::Path;

/// Render `jobs.dat`, the record of which job ran which argument
pub fn render(
    executable: &Path,
    num_repeats: u32,
    job_args: &[String],
    correlation: &Correlation,
) -> String {
    let mut manifest = format!(
        "[EXECUTABLE] {}\n[NJOBS_PER_ARG] {num_repeats}\n",
        executable.to_string_lossy()
    );

    if !job_args.is_empty() {
        manifest.push_str("[ARGUMENTS]\n");

        for (index, argument) in job_args.iter().enumerate() {
            manifest.push_str(&format!("{}: {argument}\n", correlation.label(index)));
        }
    }

    manifest
}
