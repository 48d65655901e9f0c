//! Preflight artifacts dumped next to the transcript for user inspection.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::PreflightReport;
use crate::error::Result;

/// Files written by [`write_artifacts`].
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub diagnostics: PathBuf,
    pub suggested: PathBuf,
    pub final_config: PathBuf,
}

/// Write `value` as pretty JSON via `<path>.tmp` + rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Dump `<base>.preflight.json`, `<base>.autotune.suggested.json` and
/// `<base>.autotune.final.json` into `dir`.
///
/// With `redact_paths` the normalised audio path is nulled in the full report.
pub fn write_artifacts(
    report: &PreflightReport,
    dir: &Path,
    base: &str,
    redact_paths: bool,
) -> Result<ArtifactPaths> {
    let paths = ArtifactPaths {
        diagnostics: dir.join(format!("{base}.preflight.json")),
        suggested: dir.join(format!("{base}.autotune.suggested.json")),
        final_config: dir.join(format!("{base}.autotune.final.json")),
    };

    let mut full = report.clone();
    if redact_paths {
        full.pre_norm.applied_path = None;
    }
    write_json_atomic(&paths.diagnostics, &full)?;
    write_json_atomic(&paths.suggested, &report.suggestion)?;
    write_json_atomic(&paths.final_config, &report.final_config)?;
    Ok(paths)
}
