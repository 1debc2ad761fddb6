use std::{
    fmt::Display,
    process::Command,
};

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::chain::{SubmitRequest, Submitter};
use crate::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sbatch {
    Fake,
    Real,
}

impl Sbatch {
    pub fn binary(&self) -> &'static str {
        match self {
            Sbatch::Fake => "sbatch-fake",
            Sbatch::Real => "sbatch",
        }
    }
}

pub fn sbatch() -> Sbatch {
    static SBATCH: Lazy<Sbatch> =
        Lazy::new(|| match Command::new("sbatch").arg("--version").output() {
            Ok(_) => Sbatch::Real,
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    warn!("sbatch was not found on this system, falling back to sbatch-fake.");
                    Sbatch::Fake
                } else {
                    warn!("unable to probe sbatch ({}), using it anyway", e);
                    Sbatch::Real
                }
            }
        });
    *SBATCH
}

#[derive(Clone, Copy)]
pub struct DisplayCmd<'a>(pub &'a Command);

impl<'a> Display for DisplayCmd<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (key, val) in self.0.get_envs() {
            if let Some(val) = val {
                write!(f, "{}={} ", key.to_string_lossy(), val.to_string_lossy())?;
            }
        }
        write!(f, "{}", self.0.get_program().to_string_lossy())?;
        for arg in self.0.get_args() {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Extracts the job ID from sbatch's acknowledgement.
///
/// Understands the `--parsable` forms (`<id>` and `<id>;<cluster>`) as well as the
/// human-readable `Submitted batch job <id>`.  Only the last non-empty line is considered.
pub fn parse_job_id(stdout: &[u8]) -> Option<JobId> {
    lazy_static::lazy_static! {
        static ref ACKNOWLEDGEMENT: Regex =
            Regex::new(r"^(?:Submitted batch job\s+)?(?P<id>[^;\s]+)(?:;\S*)?$").unwrap();
    }
    let s = std::str::from_utf8(stdout).ok()?;
    let line = s.lines().map(str::trim).filter(|l| !l.is_empty()).last()?;
    let captures = ACKNOWLEDGEMENT.captures(line)?;
    JobId::new(captures.name("id")?.as_str())
}

/// Submits jobs by running sbatch (or a stand-in with the same interface).
#[derive(Clone, Debug)]
pub struct SbatchSubmitter {
    /// `None` until the first real submission picks sbatch or sbatch-fake.
    binary: Option<String>,
    job_name: Option<String>,
    kill_on_invalid_dep: bool,
    extra_args: Vec<String>,
    show_command: bool,
}

impl SbatchSubmitter {
    pub fn new(binary: impl Into<String>) -> Self {
        SbatchSubmitter {
            binary: Some(binary.into()),
            job_name: None,
            kill_on_invalid_dep: false,
            extra_args: vec![],
            show_command: false,
        }
    }

    /// Uses the configured binary.  Without one, whichever of sbatch and sbatch-fake exists is
    /// picked on the first submission.
    pub fn from_config(config: &ChainConfig) -> Self {
        SbatchSubmitter {
            binary: config.sbatch.clone(),
            job_name: config.job_name.clone(),
            kill_on_invalid_dep: config.kill_on_invalid_dep,
            extra_args: config.sbatch_args.clone(),
            show_command: false,
        }
    }

    /// Echo each sbatch command line to stdout before running it.
    pub fn show_command(mut self, show: bool) -> Self {
        self.show_command = show;
        self
    }

    /// The configured binary, or `sbatch` if the choice has not been made yet.
    pub fn binary(&self) -> &str {
        self.binary.as_deref().unwrap_or(Sbatch::Real.binary())
    }

    fn resolve_binary(&mut self) -> &str {
        self.binary
            .get_or_insert_with(|| sbatch().binary().to_string())
            .as_str()
    }

    /// The input binding travels in sbatch's own environment and reaches the job via
    /// `--export=ALL`, so paths containing commas are passed through untouched.
    pub fn command(&self, request: &SubmitRequest<'_>) -> Command {
        let mut cmd = Command::new(self.binary());
        cmd.env(request.variable, &request.run.input);
        cmd.arg("--parsable").arg("--export=ALL");

        if let Some(ref name) = self.job_name {
            cmd.arg(format!("--job-name={}-{}", name, request.run.index));
        }
        if self.kill_on_invalid_dep {
            cmd.arg("--kill-on-invalid-dep=yes");
        }
        if let Some(ref d) = request.dependency {
            cmd.arg(format!("--dependency={}", d));
        }
        cmd.args(&self.extra_args);
        cmd.arg(request.template);
        cmd
    }
}

impl Submitter for SbatchSubmitter {
    fn submit(&mut self, request: &SubmitRequest<'_>) -> Result<JobId> {
        let binary = self.resolve_binary().to_string();
        let mut cmd = self.command(request);
        if self.show_command {
            println!("{}", DisplayCmd(&cmd));
        }
        debug!("running: {}", DisplayCmd(&cmd));

        let output = cmd
            .output()
            .with_context(|| format!("failed to run {}", &binary))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            bail!(
                "{} failed with {}: {}",
                &binary,
                output.status,
                stderr.trim()
            )
        }
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            warn!("{}", line);
        }

        parse_job_id(&output.stdout).ok_or_else(|| {
            anyhow!(
                "failed to parse {} output: {:?}",
                &binary,
                String::from_utf8_lossy(&output.stdout)
            )
        })
    }
}

/// Prints the sbatch command for every run instead of running it.
#[derive(Clone, Debug)]
pub struct DryRunSubmitter {
    sbatch: SbatchSubmitter,
}

impl DryRunSubmitter {
    pub fn new(sbatch: SbatchSubmitter) -> Self {
        DryRunSubmitter { sbatch }
    }
}

impl Submitter for DryRunSubmitter {
    fn submit(&mut self, request: &SubmitRequest<'_>) -> Result<JobId> {
        println!("{}", DisplayCmd(&self.sbatch.command(request)));
        let id = format!("dry-run-{}", request.run.index);
        JobId::new(id).ok_or_else(|| anyhow!("empty dry-run job id"))
    }
}
