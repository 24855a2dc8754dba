//! Recording how and where a set of results was produced
use anyhow::{Context, Result};
use chrono::prelude::*;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
pub const METADATA_FILE_NAME: &str = "metadata.toml";

/// Information about the program build via `built` crate
mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// The short git hash of the build, marked if the tree was dirty
fn git_revision() -> String {
    match (built_info::GIT_COMMIT_HASH_SHORT, built_info::GIT_DIRTY) {
        (Some(hash), Some(true)) => format!("{hash}-dirty"),
        (Some(hash), _) => hash.into(),
        (None, _) => "unknown".into(),
    }
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    program: ProgramMetadata,
    platform: Option<PlatformMetadata>,
}

/// Details of the run which produced the results
#[derive(Serialize)]
struct RunMetadata<'a> {
    /// Path to the configuration file
    config_path: &'a Path,
    /// The mode the model was run in
    mode: &'a str,
    /// Seed for the optimiser's random number generator, if fixed
    seed: Option<u64>,
    /// When the results were written
    datetime: String,
}

#[derive(Serialize)]
struct ProgramMetadata {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    is_debug: bool,
    rustc_version: &'static str,
    build_time_utc: &'static str,
    git_commit_hash: String,
}

impl ProgramMetadata {
    fn current() -> Self {
        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            target: built_info::TARGET,
            is_debug: built_info::DEBUG,
            rustc_version: built_info::RUSTC_VERSION,
            build_time_utc: built_info::BUILT_TIME_UTC,
            git_commit_hash: git_revision(),
        }
    }
}

/// The operating system as reported by uname
#[derive(Serialize)]
struct PlatformMetadata {
    sysname: String,
    release: String,
    version: String,
    machine: String,
    osname: String,
}

impl PlatformMetadata {
    /// Query the platform, if the information is available
    fn detect() -> Option<Self> {
        let info = PlatformInfo::new().ok()?;
        Some(Self {
            sysname: info.sysname().to_string_lossy().into(),
            release: info.release().to_string_lossy().into(),
            version: info.version().to_string_lossy().into(),
            machine: info.machine().to_string_lossy().into(),
            osname: info.osname().to_string_lossy().into(),
        })
    }
}

/// Write `metadata.toml` describing the run.
///
/// # Arguments
///
/// * `file_path` - Where to write the file
/// * `config_path` - The configuration file which was run
/// * `mode` - The run mode
/// * `seed` - The optimiser seed, if one was configured
pub fn write_metadata(
    file_path: &Path,
    config_path: &Path,
    mode: &str,
    seed: Option<u64>,
) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata {
            config_path,
            mode,
            seed,
            datetime: Local::now().to_rfc3339(),
        },
        program: ProgramMetadata::current(),
        platform: PlatformMetadata::detect(),
    };
    fs::write(file_path, toml::to_string(&metadata)?)
        .with_context(|| format!("Could not write {}", file_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE_NAME);
        write_metadata(&path, Path::new("model/powermatch.toml"), "summary", Some(7)).unwrap();

        let contents: toml::Table = fs::read_to_string(&path).unwrap().parse().unwrap();
        assert_eq!(contents["run"]["mode"].as_str(), Some("summary"));
        assert_eq!(contents["run"]["seed"].as_integer(), Some(7));
        assert_eq!(
            contents["program"]["name"].as_str(),
            Some(env!("CARGO_PKG_NAME"))
        );
    }
}
