use super::SubmitError;
use chrono::Utc;
use std::{
    fs,
    io::{self, ErrorKind},
    path::{Component, Path, PathBuf},
};
use tracing::debug;

/// `<root>/<name>`, or `<root>/<unix seconds>` for anonymous submissions
///
/// The name has to be a single plain path component, the log directory never leaves `root`
pub fn resolve(root: &Path, name: Option<&str>) -> Result<PathBuf, SubmitError> {
    match name.filter(|name| !name.is_empty()) {
        Some(name) => {
            let mut components = Path::new(name).components();

            match (components.next(), components.next()) {
                (Some(Component::Normal(_)), None) => Ok(root.join(name)),
                _ => Err(SubmitError::Directory {
                    path: root.join(name),
                    source: io::Error::new(
                        ErrorKind::InvalidInput,
                        format!("run name {name:?} is not a plain directory name"),
                    ),
                }),
            }
        }
        None => Ok(root.join(Utc::now().timestamp().to_string())),
    }
}

/// Create the log directory, optionally removing everything from a previous submission first
pub fn prepare(path: &Path, clear: bool) -> Result<(), SubmitError> {
    if clear {
        match fs::remove_dir_all(path) {
            Ok(()) => debug!(path = ?path, "Removed previous log directory"),
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SubmitError::Directory {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(_) if path.is_dir() => Ok(()),
        Err(source) => Err(SubmitError::Directory {
            path: path.to_path_buf(),
            source,
        }),
    }
}
