//! The job's side of the chain: copy the input file named by the chain variable to the file
//! name the workload reads.
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged {
    /// The variable was unset or empty, so whatever is already at the destination is used.
    Unset,
    /// The input already is the destination file.
    InPlace(PathBuf),
    Copied { from: PathBuf, bytes: u64 },
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

pub fn stage_input(variable: &str, value: Option<&OsStr>, dest: &Path) -> Result<Staged> {
    let from = match value {
        Some(v) if !v.is_empty() => PathBuf::from(v),
        _ => {
            debug!("{} is not set, nothing to stage", variable);
            return Ok(Staged::Unset);
        }
    };

    if !from.is_file() {
        bail!(
            "{} points to {}, which is not an existing file",
            variable,
            from.display()
        )
    }

    if same_file(&from, dest) {
        info!("{} is already in place", dest.display());
        return Ok(Staged::InPlace(from));
    }

    let bytes = std::fs::copy(&from, dest).with_context(|| {
        format!(
            "failed to copy {} to {}",
            from.display(),
            dest.display()
        )
    })?;
    info!("staged {} as {} ({} bytes)", from.display(), dest.display(), bytes);
    Ok(Staged::Copied { from, bytes })
}
