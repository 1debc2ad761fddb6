use std::time::SystemTime;

use clap::Parser;
use slurm_chain::*;

/// Stand-in for sbatch on machines without Slurm.  Checks the arguments sbatch-chain passes and
/// prints a made-up job ID.
#[derive(Parser)]
#[clap(trailing_var_arg(true))]
struct Args {
    #[clap(long, short = 'A')]
    account: Option<String>,

    #[clap(long, short = 'C')]
    constraint: Option<String>,

    #[clap(long, short = 'c')]
    cpus_per_task: Option<String>,

    #[clap(long, short = 'd')]
    dependency: Option<String>,

    #[clap(long, short = 'e')]
    error: Option<String>,

    #[clap(long)]
    export: Option<String>,

    #[clap(long)]
    gres: Option<String>,

    #[clap(long, short = 'J')]
    job_name: Option<String>,

    #[clap(long)]
    kill_on_invalid_dep: Option<String>,

    #[clap(long)]
    mem: Option<String>,

    #[clap(long, short = 'N')]
    nodes: Option<String>,

    #[clap(long, short = 'n')]
    ntasks: Option<String>,

    #[clap(long, short = 'o')]
    output: Option<String>,

    #[clap(long)]
    parsable: bool,

    #[clap(long, short = 'p')]
    partition: Option<String>,

    #[clap(long, short = 'q')]
    qos: Option<String>,

    #[clap(long)]
    test_only: bool,

    #[clap(long, short = 't')]
    time: Option<String>,

    script: String,

    script_args: Vec<String>,
}

fn get_fake_id() -> u128 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

fn check_dependency(dep: &str) -> Result<()> {
    let ids = dep
        .strip_prefix("afterok:")
        .ok_or_else(|| anyhow!("unsupported dependency type: {}", dep))?;
    if ids.split(':').any(|id| id.is_empty()) {
        bail!("dependency has an empty job id: {}", dep)
    }
    Ok(())
}

fn main() -> Result<()> {
    reset_sigpipe();
    let args = Args::parse();
    {
        let script = std::fs::read_to_string(&args.script).context_read(&args.script)?;
        if script.is_empty() {
            bail!("Batch script is empty!")
        }
        if script.chars().all(char::is_whitespace) {
            bail!("Batch script contains only whitespace!")
        }
        if !script.starts_with("#!") {
            bail!("This does not look like a batch script.  The first line must start with #! followed by the path to an interpreter")
        }
    }

    if let Some(ref dep) = args.dependency {
        check_dependency(dep)?;
    }

    if let Some(ref mode) = args.kill_on_invalid_dep {
        if mode != "yes" && mode != "no" {
            bail!("--kill-on-invalid-dep must be yes or no, not {:?}", mode)
        }
    }

    if args.test_only {
        eprintln!("sbatch-fake: job would be submitted");
        return Ok(());
    }

    if args.parsable {
        println!("{};fake", get_fake_id());
    } else {
        println!("Submitted batch job {}", get_fake_id());
    }

    Ok(())
}
