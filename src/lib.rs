use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;

pub use anyhow::{anyhow, bail, Context, Result};
pub use std::result::Result as StdResult;

pub use posix_cli_utils::*;

/// Environment variable through which a job receives its input file, unless configured otherwise.
pub const DEFAULT_INPUT_VARIABLE: &'static str = "CHAIN_INPUT";

/// Job template submitted for every run, unless configured otherwise.
pub const DEFAULT_TEMPLATE: &'static str = "chain.sbatch";

/// Identifier handed back by the workload manager for a submitted job.
///
/// Never interpreted, only passed back to the workload manager in dependency clauses.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct JobId(String);

impl JobId {
    /// Returns `None` for an empty (or whitespace-only) token.
    pub fn new(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        if s.trim().is_empty() {
            None
        } else {
            Some(JobId(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    Usage,
    TemplateNotFound(PathBuf),
    InputNotFound(PathBuf),
    Submission {
        index: usize,
        input: PathBuf,
        reason: String,
    },
}

impl ChainError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ChainError::Usage => 2,
            _ => 1,
        }
    }
}

impl Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ChainError::*;
        match self {
            Usage => write!(f, "at least one input file is required"),
            TemplateNotFound(p) => write!(f, "job template not found: {}", p.display()),
            InputNotFound(p) => write!(
                f,
                "input file not found: {} (no jobs were submitted)",
                p.display()
            ),
            Submission {
                index,
                input,
                reason,
            } => write!(
                f,
                "submission of run {} ({}) failed, remaining runs were not submitted: {}",
                index,
                input.display(),
                reason
            ),
        }
    }
}

impl std::error::Error for ChainError {}

pub fn read_json<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let f = std::fs::File::open(path).context_read(path)?;
    serde_json::from_reader(f).with_context(|| format!("failed to parse {}", path.display()))
}

pub mod chain;
pub mod sbatch;
pub mod stage;

mod config;
pub use config::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_rejects_blank_tokens() {
        assert_eq!(JobId::new(""), None);
        assert_eq!(JobId::new("  \n"), None);
        assert_eq!(JobId::new("4711").unwrap().as_str(), "4711");
        assert_eq!(JobId::new("4711_3").unwrap().to_string(), "4711_3");
    }

    #[test]
    fn usage_error_has_distinct_exit_code() {
        assert_eq!(ChainError::Usage.exit_code(), 2);
        assert_eq!(
            ChainError::InputNotFound(PathBuf::from("missing.in")).exit_code(),
            1
        );
    }

    #[test]
    fn missing_input_is_named() {
        let msg = ChainError::InputNotFound(PathBuf::from("missing.in")).to_string();
        assert!(msg.contains("missing.in"), "{}", msg);
    }

    #[test]
    fn read_json_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("v.json");
        std::fs::write(&p, r#"["a", "b"]"#).unwrap();
        let v: Vec<String> = read_json(&p).unwrap();
        assert_eq!(v, vec!["a".to_string(), "b".to_string()]);
        assert!(read_json::<Vec<String>, _>(dir.path().join("nope.json")).is_err());
    }
}
