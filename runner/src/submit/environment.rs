use std::{env, ffi::OsString};
use tracing::warn;

/// variables bound to the submitting shell, meaningless on a worker
pub const EXCLUDED: [&str; 3] = ["PWD", "OLDPWD", "TMPDIR"];

/// bash marks exported functions with this prefix in the environment
pub const FUNCTION_PREFIX: &str = "BASH_FUNC_";

/// Snapshot of environment variables in enumeration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    variables: Vec<(String, String)>,
}

impl Environment {
    /// snapshot of the current process environment
    pub fn capture() -> Self {
        Self::from_os(env::vars_os())
    }

    /// invalid unicode is replaced, the variable is kept
    pub fn from_os<I: IntoIterator<Item = (OsString, OsString)>>(variables: I) -> Self {
        variables
            .into_iter()
            .map(|(key, value)| {
                let key = match key.into_string() {
                    Ok(key) => key,
                    Err(key) => {
                        let key = key.to_string_lossy().into_owned();
                        warn!("Environment variable name {key:?} is not valid unicode");
                        key
                    }
                };
                let value = value.into_string().unwrap_or_else(|value| {
                    warn!("Value of environment variable {key} is not valid unicode");
                    value.to_string_lossy().into_owned()
                });

                (key, value)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// render as a script that restores the environment when sourced
    pub fn render(&self) -> String {
        let mut script = String::new();

        for (key, value) in self
            .variables
            .iter()
            .filter(|(key, _)| !EXCLUDED.contains(&key.as_str()))
        {
            match key.strip_prefix(FUNCTION_PREFIX) {
                Some(function) => render_function(&mut script, function, value),
                None => script.push_str(&format!(
                    "export {key}=\"{}\"\n",
                    value.replace('"', "\\\"")
                )),
            }
        }

        script
    }
}

// `BASH_FUNC_name%%=() { body }` (or `BASH_FUNC_name()` before bash 4.3)
fn render_function(script: &mut String, function: &str, value: &str) {
    let name = function
        .strip_suffix("%%")
        .or_else(|| function.strip_suffix("()"))
        .unwrap_or(function);
    let body = value.strip_prefix("()").unwrap_or(value).trim_start();

    script.push_str(&format!("{name}() {body}\nexport -f {name}\n"));
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            variables: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}
