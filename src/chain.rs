//! Submission of a linear chain of batch jobs.
//!
//! Every run after the first is submitted with a dependency on the run before it, so the
//! workload manager only starts it once its predecessor has completed successfully.  Nothing
//! here waits for jobs, cancels them or retries them: ordering and cancellation are entirely
//! the workload manager's business.
use std::{
    fmt::Display,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::*;

/// One requested run: its position in the chain and the input file it will be handed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunDescriptor {
    /// 1-based position in the chain.
    pub index: usize,
    /// Absolute path to the input file.
    pub input: PathBuf,
}

fn is_readable_file(p: &Path) -> bool {
    p.is_file() && std::fs::File::open(p).is_ok()
}

/// Validates a chain before anything is submitted.
///
/// Every input is checked up front, so a chain which is already known to break further down
/// is never partially submitted.
pub fn plan<P: AsRef<Path>>(
    template: &Path,
    inputs: &[P],
) -> StdResult<Vec<RunDescriptor>, ChainError> {
    if inputs.is_empty() {
        return Err(ChainError::Usage);
    }
    if !is_readable_file(template) {
        return Err(ChainError::TemplateNotFound(template.to_path_buf()));
    }

    inputs
        .iter()
        .enumerate()
        .map(|(k, p)| {
            let p = p.as_ref();
            let not_found = || ChainError::InputNotFound(p.to_path_buf());
            if !is_readable_file(p) {
                return Err(not_found());
            }
            let input = std::fs::canonicalize(p).map_err(|_| not_found())?;
            Ok(RunDescriptor {
                index: k + 1,
                input,
            })
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dependency {
    /// Start only once the job has completed with exit code zero.
    AfterOk(JobId),
}

impl Dependency {
    pub fn predecessor(&self) -> &JobId {
        match self {
            Dependency::AfterOk(id) => id,
        }
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dependency::AfterOk(id) => write!(f, "afterok:{}", id),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SubmitRequest<'a> {
    pub template: &'a Path,
    /// Name of the environment variable bound to the run's input file.
    pub variable: &'a str,
    pub run: &'a RunDescriptor,
    pub dependency: Option<Dependency>,
}

/// Hands a single job to the workload manager.
///
/// Every error counts as a failed submission; the message is only used for diagnostics.
pub trait Submitter {
    fn submit(&mut self, request: &SubmitRequest<'_>) -> Result<JobId>;
}

#[derive(Clone, Debug)]
pub struct ChainSpec<'a> {
    pub template: &'a Path,
    pub variable: &'a str,
    /// Existing job the first run waits on.
    pub after: Option<JobId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainSummary {
    pub submitted: usize,
    pub last: Option<JobId>,
}

impl Display for ChainSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let noun = if self.submitted == 1 { "job" } else { "jobs" };
        write!(f, "{} {} submitted", self.submitted, noun)?;
        if let Some(ref last) = self.last {
            write!(f, ", last job is {}", last)?;
        }
        Ok(())
    }
}

struct StatusLine<'a> {
    run: &'a RunDescriptor,
    id: &'a JobId,
    dependency: Option<&'a Dependency>,
}

impl<'a> Display for StatusLine<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Run {}: job {} for {} ",
            self.run.index,
            self.id,
            self.run.input.display()
        )?;
        match self.dependency {
            None => write!(f, "(starts immediately)"),
            Some(d) => write!(f, "(waiting on job {})", d.predecessor()),
        }
    }
}

/// Submits `runs` in order, each depending on the success of the one before.
///
/// Stops at the first failed submission; jobs submitted before it are left alone.
pub fn submit_chain<S, W>(
    submitter: &mut S,
    spec: &ChainSpec<'_>,
    runs: &[RunDescriptor],
    out: &mut W,
) -> Result<ChainSummary>
where
    S: Submitter + ?Sized,
    W: Write,
{
    let last = runs
        .iter()
        .try_fold(spec.after.clone(), |previous, run| -> Result<Option<JobId>> {
            let request = SubmitRequest {
                template: spec.template,
                variable: spec.variable,
                run,
                dependency: previous.map(Dependency::AfterOk),
            };
            debug!("submitting {:?}", &request);

            let id = submitter
                .submit(&request)
                .map_err(|e| ChainError::Submission {
                    index: run.index,
                    input: run.input.clone(),
                    reason: format!("{:#}", e),
                })?;
            info!("run {} submitted as job {}", run.index, &id);

            let status = StatusLine {
                run,
                id: &id,
                dependency: request.dependency.as_ref(),
            };
            writeln!(out, "{}", status)?;
            Ok(Some(id))
        })?;

    let summary = ChainSummary {
        submitted: runs.len(),
        last,
    };
    writeln!(out, "{}", &summary)?;
    Ok(summary)
}

/// Validates `inputs` and submits them as one chain.  Nothing is submitted if validation fails.
pub fn submit_inputs<S, W, P>(
    submitter: &mut S,
    spec: &ChainSpec<'_>,
    inputs: &[P],
    out: &mut W,
) -> Result<ChainSummary>
where
    S: Submitter + ?Sized,
    W: Write,
    P: AsRef<Path>,
{
    let runs = plan(spec.template, inputs)?;
    submit_chain(submitter, spec, &runs, out)
}
