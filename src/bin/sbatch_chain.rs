use clap::{CommandFactory, Parser};
use env_logger::Env;
use log::debug;
use slurm_chain::chain::{submit_inputs, ChainSpec, Submitter};
use slurm_chain::sbatch::{DryRunSubmitter, SbatchSubmitter};
use slurm_chain::*;
use std::path::PathBuf;

fn parse_job_id_arg(s: &str) -> Result<JobId> {
    JobId::new(s.trim()).ok_or_else(|| anyhow!("job id must not be empty"))
}

/// Submit one batch job per input file.  Every job after the first only starts once the job
/// before it has completed successfully.
#[derive(Parser, Debug, Clone)]
#[clap(version)]
struct ClArgs {
    /// Job template to submit for every input [default: chain.sbatch]
    #[clap(short, long, parse(from_os_str))]
    template: Option<PathBuf>,

    /// Environment variable through which each job receives its input file [default: CHAIN_INPUT]
    #[clap(short = 'x', long)]
    variable: Option<String>,

    /// Let the first job wait on an existing job, extending a chain already in the queue.
    #[clap(short, long, parse(try_from_str = parse_job_id_arg))]
    after: Option<JobId>,

    /// Name jobs NAME-1, NAME-2, ...
    #[clap(short = 'J', long, value_name = "NAME")]
    job_name: Option<String>,

    /// Have Slurm cancel jobs whose predecessor failed instead of leaving them pending.
    #[clap(short, long)]
    kill_on_invalid_dep: bool,

    /// sbatch binary to run.
    #[clap(long)]
    sbatch: Option<String>,

    /// Config file (JSON).  Defaults to $SLURM_CHAIN_CONFIG, then slurm-chain/config.json in
    /// the user config directory.
    #[clap(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Don't submit, just print the sbatch commands.
    #[clap(short = 'd')]
    dry_run: bool,

    /// Print the sbatch command lines.
    #[clap(short = 'v')]
    show_command: bool,

    /// Input files, in the order the jobs should run.
    #[clap(parse(from_os_str))]
    inputs: Vec<PathBuf>,
}

impl ClArgs {
    fn config(&self) -> Result<ChainConfig> {
        let mut config = match self.config {
            Some(ref p) => ChainConfig::load_from(p)?,
            None => ChainConfig::load()?,
        };
        if let Some(ref t) = self.template {
            config.template = t.clone();
        }
        if let Some(ref v) = self.variable {
            validate_variable(v)?;
            config.variable = v.clone();
        }
        if let Some(ref n) = self.job_name {
            config.job_name = Some(n.clone());
        }
        if let Some(ref s) = self.sbatch {
            config.sbatch = Some(s.clone());
        }
        config.kill_on_invalid_dep |= self.kill_on_invalid_dep;
        Ok(config)
    }
}

/// Runs before the config is read, so a broken config never hides the usage message.
fn check_usage(args: &ClArgs) -> StdResult<(), ChainError> {
    if args.inputs.is_empty() {
        Err(ChainError::Usage)
    } else {
        Ok(())
    }
}

fn run(args: ClArgs) -> Result<()> {
    check_usage(&args)?;
    let config = args.config()?;
    debug!("{:?}", &config);

    let spec = ChainSpec {
        template: &config.template,
        variable: &config.variable,
        after: args.after.clone(),
    };

    let sbatch = SbatchSubmitter::from_config(&config).show_command(args.show_command);
    let mut submitter: Box<dyn Submitter> = if args.dry_run {
        Box::new(DryRunSubmitter::new(sbatch))
    } else {
        Box::new(sbatch)
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    submit_inputs(submitter.as_mut(), &spec, &args.inputs, &mut out)?;
    Ok(())
}

fn main() {
    reset_sigpipe();
    env_logger::Builder::from_env(Env::new().filter_or("SLURM_CHAIN_LOG", "warn")).init();

    if let Err(e) = run(ClArgs::parse()) {
        let chain_error = e.downcast_ref::<ChainError>();
        if let Some(ChainError::Usage) = chain_error {
            let _ = ClArgs::command().print_help();
            println!();
        }
        eprintln!("error: {:#}", e);
        std::process::exit(chain_error.map(ChainError::exit_code).unwrap_or(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn no_inputs_is_a_usage_error() {
        let args = ClArgs::try_parse_from(["sbatch-chain", "-d"]).unwrap();
        assert_eq!(check_usage(&args), Err(ChainError::Usage));

        let args = ClArgs::try_parse_from(["sbatch-chain", "a.in"]).unwrap();
        assert_eq!(check_usage(&args), Ok(()));
    }

    #[test]
    fn usage_error_wins_over_a_broken_config() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let argv = vec![
            OsString::from("sbatch-chain"),
            OsString::from("-c"),
            missing.into_os_string(),
        ];
        let args = ClArgs::try_parse_from(argv).unwrap();

        let err = run(args).unwrap_err();
        let chain_error = err.downcast_ref::<ChainError>();
        assert_eq!(chain_error, Some(&ChainError::Usage));
        assert_eq!(chain_error.map(ChainError::exit_code), Some(2));
    }

    #[test]
    fn bad_variable_flag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        std::fs::write(&config, "{}").unwrap();
        let argv = vec![
            OsString::from("sbatch-chain"),
            OsString::from("-c"),
            config.into_os_string(),
            OsString::from("-x"),
        ];

        let args = ClArgs::try_parse_from(argv.iter().cloned().chain(["A=B".into(), "a.in".into()]))
            .unwrap();
        assert!(args.config().is_err());

        let args = ClArgs::try_parse_from(argv.into_iter().chain(["INPUT".into(), "a.in".into()]))
            .unwrap();
        assert_eq!(args.config().unwrap().variable, "INPUT");
    }
}
