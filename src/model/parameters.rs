//! Defines the `ModelConfig` struct, which represents the contents of `powermatch.toml`.
use crate::error::PowermatchError;
use crate::input::{input_err_msg, read_toml};
use crate::optimiser::target::{Target, TargetWeight, Targets};
use crate::year::parse_year_str;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::{Path, PathBuf};
use strum::Display;

/// Name of the section holding the engine parameters
const SECTION: &str = "powermatch";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_generations, u32, 50);
define_param_default!(default_population, u32, 50);
define_param_default!(default_mutation, f64, 0.005);

/// Represents the contents of the entire configuration file.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Input file locations
    pub files: FilePaths,
    /// Engine parameters
    #[serde(default)]
    pub powermatch: ModelParameters,
}

/// Locations of the input files. Relative paths are relative to the configuration file.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FilePaths {
    /// The constraints table
    pub constraints: PathBuf,
    /// The generators table
    pub generators: PathBuf,
    /// The optimisation table
    pub optimisation: Option<PathBuf>,
    /// The hourly data sheet (may contain `$YEAR$`)
    pub data: String,
    /// The batch sheet
    pub batch: Option<PathBuf>,
    /// A per-year load file (may contain `$YEAR$`)
    pub load: Option<String>,
}

/// Which objective the optimiser minimises
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum OptimiseChoice {
    /// System LCOE
    #[default]
    #[string = "LCOE"]
    Lcoe,
    /// Weighted sum of all targets
    #[string = "Multi"]
    Multi,
    /// An LCOE run followed by a weighted run seeded with its best fleet
    #[string = "Both"]
    Both,
}

/// Read an optional "weight,better,worse" target
fn deserialise_target<'de, D>(deserialiser: D) -> Result<Option<TargetWeight>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Deserialize::deserialize(deserialiser)?;
    value
        .map(|s| s.parse::<TargetWeight>())
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// The `[powermatch]` section of the configuration file
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    /// Discount rate for facilities without their own
    #[serde(default)]
    pub discount_rate: f64,
    /// Carbon price ($/tCO₂e)
    #[serde(default)]
    pub carbon_price: f64,
    /// Capacity multipliers by facility name; `Load` scales the load trace
    #[serde(default)]
    pub adjusted_capacities: IndexMap<String, f64>,
    /// The facilities taking part in the simulation, in dispatch order
    #[serde(default)]
    pub dispatch_order: Vec<String>,
    /// Which year's data and load files to use outside transition runs
    pub load_year: Option<u32>,
    /// Years simulated by a transition run, separated by semicolons
    pub transition_years: Option<String>,
    /// The optimiser objective
    #[serde(default)]
    pub optimise_choice: OptimiseChoice,
    /// Maximum number of generations
    #[serde(default = "default_generations")]
    pub optimise_generations: u32,
    /// Number of chromosomes in each generation
    #[serde(default = "default_population")]
    pub optimise_population: u32,
    /// Probability of mutating each gene
    #[serde(default = "default_mutation")]
    pub optimise_mutation: f64,
    /// Stop after this many generations without improvement (0 never stops early)
    #[serde(default)]
    pub optimise_stop: u32,
    /// Random seed, for reproducible optimisation runs
    pub optimise_seed: Option<u64>,
    /// Weight and scoring range for the system LCOE target
    #[serde(default, deserialize_with = "deserialise_target")]
    pub optimise_lcoe: Option<TargetWeight>,
    /// Weight and scoring range for the total cost target
    #[serde(default, deserialize_with = "deserialise_target")]
    pub optimise_cost: Option<TargetWeight>,
    /// Weight and scoring range for the emissions target
    #[serde(default, deserialize_with = "deserialise_target")]
    pub optimise_co2: Option<TargetWeight>,
    /// Weight and scoring range for the renewable fraction target
    #[serde(default, deserialize_with = "deserialise_target")]
    pub optimise_re_pct: Option<TargetWeight>,
    /// Weight and scoring range for the surplus fraction target
    #[serde(default, deserialize_with = "deserialise_target")]
    pub optimise_surplus_pct: Option<TargetWeight>,
    /// Weight and scoring range for the fraction of load served target
    #[serde(default, deserialize_with = "deserialise_target")]
    pub optimise_load_pct: Option<TargetWeight>,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            discount_rate: 0.0,
            carbon_price: 0.0,
            adjusted_capacities: IndexMap::new(),
            dispatch_order: Vec::new(),
            load_year: None,
            transition_years: None,
            optimise_choice: OptimiseChoice::default(),
            optimise_generations: default_generations(),
            optimise_population: default_population(),
            optimise_mutation: default_mutation(),
            optimise_stop: 0,
            optimise_seed: None,
            optimise_lcoe: None,
            optimise_cost: None,
            optimise_co2: None,
            optimise_re_pct: None,
            optimise_surplus_pct: None,
            optimise_load_pct: None,
        }
    }
}

/// Check that a parameter lies within an inclusive range
fn check_range<T>(key: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    ensure!(
        value >= min && value <= max,
        PowermatchError::config(format!(
            "[{SECTION}] {key} must be between {min} and {max}, got {value}"
        ))
    );

    Ok(())
}

impl ModelParameters {
    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_range("discount_rate", self.discount_rate, 0.0, 1.0)?;
        ensure!(
            self.carbon_price.is_finite() && self.carbon_price >= 0.0,
            PowermatchError::config(format!(
                "[{SECTION}] carbon_price must not be negative, got {}",
                self.carbon_price
            ))
        );
        check_range("optimise_generations", self.optimise_generations, 10, 500)?;
        check_range("optimise_population", self.optimise_population, 10, 500)?;
        check_range("optimise_mutation", self.optimise_mutation, 0.0, 1.0)?;
        check_range("optimise_stop", self.optimise_stop, 0, 50)?;
        self.transition_years()?;

        Ok(())
    }

    /// The years simulated by a transition run
    pub fn transition_years(&self) -> Result<Vec<u32>> {
        let Some(years) = &self.transition_years else {
            return Ok(Vec::new());
        };

        parse_year_str(years).map_err(|err| {
            PowermatchError::config(format!("[{SECTION}] transition_years: {err}")).into()
        })
    }

    /// The year whose files are loaded up front.
    ///
    /// This is `load_year` if given, otherwise the first transition year.
    pub fn base_year(&self) -> Result<Option<u32>> {
        match self.load_year {
            Some(year) => Ok(Some(year)),
            None => Ok(self.transition_years()?.first().copied()),
        }
    }

    /// The weight given to each optimisation target
    pub fn targets(&self) -> Targets {
        let mut targets = Targets::default();
        for (target, weight) in [
            (Target::Lcoe, self.optimise_lcoe),
            (Target::Cost, self.optimise_cost),
            (Target::Co2, self.optimise_co2),
            (Target::RePct, self.optimise_re_pct),
            (Target::SurplusPct, self.optimise_surplus_pct),
            (Target::LoadPct, self.optimise_load_pct),
        ] {
            if let Some(weight) = weight {
                targets.set(target, weight);
            }
        }

        targets
    }
}

impl ModelConfig {
    /// Read a configuration file.
    ///
    /// # Arguments
    ///
    /// * `file_path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The file contents as a [`ModelConfig`] struct or an error if the file is invalid
    pub fn from_path(file_path: &Path) -> Result<ModelConfig> {
        let config: ModelConfig = read_toml(file_path)?;
        config
            .powermatch
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, error_kind};
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const FILES: &str = "[files]\nconstraints = \"c.csv\"\ngenerators = \"g.csv\"\ndata = \"d.csv\"\n";

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let file_path = dir.join("powermatch.toml");
        let mut file = File::create(&file_path).unwrap();
        write!(file, "{FILES}{contents}").unwrap();
        file_path
    }

    #[test]
    fn test_config_defaults() {
        let dir = tempdir().unwrap();
        let config = ModelConfig::from_path(&write_config(dir.path(), "")).unwrap();
        assert_eq!(config.files.constraints, PathBuf::from("c.csv"));
        assert_eq!(config.files.optimisation, None);
        assert_eq!(config.powermatch, ModelParameters::default());
        assert_eq!(config.powermatch.targets(), Targets::default());
    }

    #[test]
    fn test_config_full() {
        let dir = tempdir().unwrap();
        let file_path = write_config(
            dir.path(),
            r#"
[powermatch]
discount_rate = 0.07
carbon_price = 25.0
adjusted_capacities = { Solar = 2.0, Load = 1.1 }
dispatch_order = ["Solar", "Battery", "Gas"]
transition_years = "2030;2040"
optimise_choice = "Multi"
optimise_population = 20
optimise_seed = 7
optimise_re_pct = "2,1,0"
"#,
        );
        let config = ModelConfig::from_path(&file_path).unwrap();
        let params = &config.powermatch;
        assert_eq!(params.discount_rate, 0.07);
        assert_eq!(params.adjusted_capacities["Load"], 1.1);
        assert_eq!(params.dispatch_order, ["Solar", "Battery", "Gas"]);
        assert_eq!(params.transition_years().unwrap(), [2030, 2040]);
        assert_eq!(params.base_year().unwrap(), Some(2030));
        assert_eq!(params.optimise_choice, OptimiseChoice::Multi);
        assert_eq!(params.optimise_seed, Some(7));
        assert_eq!(
            params.targets().get(Target::RePct),
            TargetWeight {
                weight: 2.0,
                better: 1.0,
                worse: 0.0
            }
        );
    }

    #[rstest]
    #[case("[powermatch]", None)]
    #[case("[powermatch]\nload_year = 2035\ntransition_years = \"2030;2040\"", Some(2035))]
    #[case("[powermatch]\ntransition_years = \"2030;2040\"", Some(2030))]
    fn test_base_year(#[case] contents: &str, #[case] expected: Option<u32>) {
        let dir = tempdir().unwrap();
        let config = ModelConfig::from_path(&write_config(dir.path(), contents)).unwrap();
        assert_eq!(config.powermatch.base_year().unwrap(), expected);
    }

    #[rstest]
    #[case("[powermatch]\ndiscount_rate = 1.5")]
    #[case("[powermatch]\ncarbon_price = -1.0")]
    #[case("[powermatch]\noptimise_generations = 5")]
    #[case("[powermatch]\noptimise_population = 501")]
    #[case("[powermatch]\noptimise_mutation = 2.0")]
    #[case("[powermatch]\noptimise_stop = 51")]
    #[case("[powermatch]\ntransition_years = \"2040;2030\"")]
    #[case("[powermatch]\noptimise_lcoe = \"1,5,5\"")]
    #[case("[powermatch]\noptimise_choice = \"Fastest\"")]
    #[case("[powermatch]\nunknown_key = 1")]
    #[case("[extra]\nkey = 1")]
    fn test_config_invalid(#[case] contents: &str) {
        let dir = tempdir().unwrap();
        let err = ModelConfig::from_path(&write_config(dir.path(), contents)).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Config);
    }

    #[test]
    fn test_config_missing_file() {
        let dir = tempdir().unwrap();
        let err = ModelConfig::from_path(&dir.path().join("missing.toml")).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Io);
    }
}
