use clap::Parser;
use env_logger::Env;
use slurm_chain::stage::{stage_input, Staged};
use slurm_chain::*;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

/// Run inside a chained job: copy the input file sbatch-chain bound to this job into place,
/// then optionally replace this process with the workload.
#[derive(Parser, Clone, Debug)]
#[clap(trailing_var_arg(true))]
struct ClArgs {
    /// Environment variable holding the input file.
    #[clap(short = 'x', long, default_value = DEFAULT_INPUT_VARIABLE)]
    variable: String,

    /// File name the workload reads its input from.
    #[clap(parse(from_os_str))]
    dest: PathBuf,

    /// Workload to exec once the input is staged.
    command: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::new().filter_or("SLURM_CHAIN_LOG", "info")).init();
    let args = ClArgs::parse();

    let value = std::env::var_os(&args.variable);
    if let Staged::Unset = stage_input(&args.variable, value.as_deref(), &args.dest)? {
        log::warn!("{} is not set, using {} as is", &args.variable, args.dest.display());
    }

    let (program, rest) = match args.command.split_first() {
        Some(c) => c,
        None => return Ok(()),
    };

    let mut cmd = Command::new(program);
    cmd.args(rest);
    eprint!("running: {}", program);
    for c in rest {
        eprint!(" {}", c);
    }
    eprintln!();

    Err(anyhow::Error::new(cmd.exec()).context(format!("failed to run {}", program)))
}
