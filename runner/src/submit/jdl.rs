//! Typed model of a condor submit description.
//!
//! A description is an ordered list of `key = value` directives followed by a
//! single queue statement. All quoting happens in the `Display` impls below.

use super::{Correlation, SubmissionPlan, SHIM_FILE};
use crate::config::JobConfig;
use itertools::Itertools;
use std::fmt::{self, Display, Formatter};

/// condor_submit can't parse an empty first line in a `queue ... from (...)` block,
/// the first job receives this literal instead of an empty argument
pub const EMPTY_FIRST_ARGUMENT: &str = "_DUMMY_";

/// rank favouring low slot ids, spreads jobs over machines instead of filling one up
pub const RANK: &str = "32 - TARGET.SlotID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// submit command understood by condor_submit, e.g. `request_cpus`
    Command,
    /// custom ClassAd attribute, rendered with a leading `+`
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// written as is, used for expressions and paths
    Raw(String),
    /// wrapped in double quotes
    Quoted(String),
    Number(u64),
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(value) => write!(f, "{value}"),
            Self::Quoted(value) => write!(f, "\"{value}\""),
            Self::Number(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: &'static str,
    pub value: Value,
    pub kind: DirectiveKind,
}

impl Directive {
    pub fn command(key: &'static str, value: Value) -> Self {
        Self {
            key,
            value,
            kind: DirectiveKind::Command,
        }
    }

    pub fn attribute(key: &'static str, value: Value) -> Self {
        Self {
            key,
            value,
            kind: DirectiveKind::Attribute,
        }
    }
}

impl Display for Directive {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            DirectiveKind::Command => write!(f, "{} = {}", self.key, self.value),
            DirectiveKind::Attribute => write!(f, "+{} = {}", self.key, self.value),
        }
    }
}

/// `queue <count> [JobName,]JobArgs from ( ... )`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    pub count: u32,
    pub names: Option<Vec<String>>,
    pub args: Vec<String>,
}

impl Display for Queue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "queue {}", self.count)?;

        if self.args.is_empty() {
            return Ok(());
        }

        match self.names {
            Some(_) => writeln!(f, " JobName,JobArgs from (")?,
            None => writeln!(f, " JobArgs from (")?,
        }

        for (index, argument) in self.args.iter().enumerate() {
            if let Some(name) = self.names.as_ref().and_then(|names| names.get(index)) {
                write!(f, "{name}, ")?;
            }

            if index == 0 && argument.trim().is_empty() {
                writeln!(f, "{EMPTY_FIRST_ARGUMENT}")?;
            } else {
                writeln!(f, "{argument}")?;
            }
        }

        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jdl {
    pub directives: Vec<Directive>,
    pub queue: Queue,
}

impl Jdl {
    pub fn build(config: &JobConfig, plan: &SubmissionPlan) -> Self {
        let log_dir = plan.log_dir.to_string_lossy();
        let mut directives = vec![
            Directive::command(
                "executable",
                Value::Raw(plan.path(SHIM_FILE).to_string_lossy().into_owned()),
            ),
            Directive::command("universe", Value::Raw("vanilla".into())),
            Directive::command("should_transfer_files", Value::Raw("YES".into())),
            Directive::command("input", Value::Raw("/dev/null".into())),
        ];

        if !config.os.is_empty() {
            directives.push(Directive::attribute(
                "REQUIRED_OS",
                Value::Quoted(config.os.clone()),
            ));
        }

        directives.push(Directive::command(
            "requirements",
            Value::Raw(
                plan.requirements
                    .iter()
                    .map(|requirement| format!("({requirement})"))
                    .join(" && "),
            ),
        ));
        directives.push(Directive::command("rank", Value::Raw(RANK.into())));
        directives.push(Directive::command(
            "transfer_input_files",
            Value::Raw(plan.inputs.join(",")),
        ));
        directives.push(Directive::command(
            "transfer_output_files",
            Value::Quoted(String::new()),
        ));

        // the accounting system only honors the group if both are set
        directives.push(Directive::command(
            "accounting_group",
            Value::Raw(config.group.clone()),
        ));
        directives.push(Directive::attribute(
            "AccountingGroup",
            Value::Raw(config.group.clone()),
        ));
        directives.push(Directive::attribute(
            "JobFlavour",
            Value::Quoted(config.flavour.clone()),
        ));
        directives.push(Directive::command(
            "request_cpus",
            Value::Number(config.request_cpus.into()),
        ));
        directives.push(Directive::command(
            "request_memory",
            Value::Number(config.request_memory),
        ));

        if config.hold_on_fail {
            directives.push(Directive::command(
                "on_exit_hold",
                Value::Raw("(ExitBySignal == True) || (ExitCode != 0)".into()),
            ));
        }

        let job_macro = plan.correlation.macro_name();
        directives.push(Directive::command(
            "log",
            Value::Raw(format!("{log_dir}/$(Cluster).{job_macro}.log")),
        ));
        directives.push(Directive::command(
            "output",
            Value::Raw(format!("{log_dir}/$(Cluster).{job_macro}.out")),
        ));
        directives.push(Directive::command(
            "error",
            Value::Raw(format!("{log_dir}/$(Cluster).{job_macro}.err")),
        ));
        directives.push(Directive::command(
            "arguments",
            Value::Quoted(arguments(config, plan)),
        ));

        let names = match &plan.correlation {
            Correlation::Named(names) => Some(names.clone()),
            Correlation::Single | Correlation::Indexed => None,
        };

        Self {
            directives,
            queue: Queue {
                count: config.num_repeats,
                names,
                args: config.job_args.clone(),
            },
        }
    }

    pub fn get(&self, key: &str) -> Option<&Directive> {
        self.directives.iter().find(|directive| directive.key == key)
    }
}

impl Display for Jdl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for directive in self.directives.iter() {
            writeln!(f, "{directive}")?;
        }

        writeln!(f, "{}", self.queue)
    }
}

// the shim receives the real executable as its first argument
fn arguments(config: &JobConfig, plan: &SubmissionPlan) -> String {
    let executable = plan.executable.to_string_lossy();
    let job_args = if config.job_args.is_empty() {
        ""
    } else {
        "$(JobArgs)"
    };
    let step = if config.num_repeats > 1 && config.append_step {
        "$(Step)"
    } else {
        ""
    };

    let arguments = [
        executable.as_ref(),
        config.pre_args.as_str(),
        job_args,
        config.post_args.as_str(),
        step,
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .join(" ");

    arguments
}
