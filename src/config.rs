use crate::*;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Overrides the location of the config file.
pub const CONFIG_ENV_VAR: &'static str = "SLURM_CHAIN_CONFIG";

pub fn config_directory() -> Result<PathBuf> {
    let mut p = dirs::config_dir()
        .ok_or_else(|| anyhow!("unable to determine user config directory"))?;
    p.push("slurm-chain");
    Ok(p)
}

/// The input variable ends up as `NAME=value` in the job's environment.
pub fn validate_variable(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('=') {
        bail!("invalid environment variable name {:?}", name)
    }
    Ok(())
}

fn default_config_file() -> Result<PathBuf> {
    let mut p = config_directory()?;
    p.push("config.json");
    Ok(p)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainConfig {
    /// Job template submitted once per input file.
    pub template: PathBuf,
    /// Environment variable carrying the input file into each job.
    pub variable: String,
    /// Jobs are named `<job_name>-<run index>` when set.
    pub job_name: Option<String>,
    pub kill_on_invalid_dep: bool,
    /// sbatch binary to use instead of the one found on the PATH.
    pub sbatch: Option<String>,
    /// Extra arguments passed to every sbatch call, before the template.
    pub sbatch_args: Vec<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            template: PathBuf::from(DEFAULT_TEMPLATE),
            variable: DEFAULT_INPUT_VARIABLE.to_string(),
            job_name: None,
            kill_on_invalid_dep: false,
            sbatch: None,
            sbatch_args: vec![],
        }
    }
}

impl ChainConfig {
    /// Loads the config named by `SLURM_CHAIN_CONFIG`, or the user's default config file.
    ///
    /// A missing default file is not an error, a missing file named by the variable is.
    pub fn load() -> Result<Self> {
        if let Some(p) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::load_from(p);
        }
        let p = default_config_file()?;
        if p.exists() {
            Self::load_from(p)
        } else {
            debug!("no config file at {}, using defaults", p.display());
            Ok(Default::default())
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("reading config from {}", path.display());
        let config: ChainConfig = read_json(path)?;
        validate_variable(&config.variable).with_context(|| path.display().to_string())?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.json");
        std::fs::write(&p, r#"{ "job_name": "md", "sbatch_args": ["--partition", "gpu"] }"#)
            .unwrap();
        let c = ChainConfig::load_from(&p).unwrap();
        assert_eq!(c.template, PathBuf::from(DEFAULT_TEMPLATE));
        assert_eq!(c.variable, DEFAULT_INPUT_VARIABLE);
        assert_eq!(c.job_name.as_deref(), Some("md"));
        assert_eq!(c.sbatch_args, vec!["--partition", "gpu"]);
        assert!(!c.kill_on_invalid_dep);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.json");
        std::fs::write(&p, r#"{ "templte": "job.sh" }"#).unwrap();
        assert!(ChainConfig::load_from(&p).is_err());
    }

    #[test]
    fn bad_variable_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.json");
        std::fs::write(&p, r#"{ "variable": "A=B" }"#).unwrap();
        assert!(ChainConfig::load_from(&p).is_err());
    }

    #[test]
    fn variable_names() {
        assert!(validate_variable("CHAIN_INPUT").is_ok());
        assert!(validate_variable("").is_err());
        assert!(validate_variable("A=B").is_err());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ChainConfig::load_from(dir.path().join("nope.json")).is_err());
    }
}
