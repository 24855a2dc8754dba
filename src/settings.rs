//! Code for loading program settings.
use crate::get_powermatch_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::Result;
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# Program settings for powermatch.
# Uncomment a line to change the setting from its default.
";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_true() -> bool {
    true
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_powermatch_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings shared by every model run
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether to overwrite results in an existing output folder by default
    #[serde(default)]
    pub overwrite: bool,
    /// Whether to write log files into the output folder
    #[serde(default = "default_true")]
    pub log_files: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            overwrite: false,
            log_files: true,
        }
    }
}

impl Settings {
    /// Read the settings file from the user's config folder, using defaults if there is none
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(file_path)
    }

    /// The contents of the default settings file
    pub fn default_file_contents() -> String {
        let settings_raw =
            toml::to_string(&Settings::default()).expect("Settings are always valid TOML");

        // Comment out each setting, preceded by its documentation
        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.lines() {
            let Some((field, _)) = line.split_once('=') else {
                continue;
            };
            let docs = Settings::get_field_docs(field.trim()).unwrap_or_default();
            for doc_line in docs.lines() {
                let _ = write!(&mut out, "\n# # {}\n", doc_line.trim());
            }
            let _ = writeln!(&mut out, "# {}", line.trim());
        }

        out
    }
}
