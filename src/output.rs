//! The module responsible for writing results to disk.
use crate::constraint::Category;
use crate::dispatch::DispatchOutcome;
use crate::error::PowermatchError;
use crate::metrics::{FacilityMetrics, SystemMetrics};
use crate::optimiser::target::Targets;
use crate::optimiser::{OptimisationResult, ranking_targets};
use crate::scenario::{ScenarioResult, ScenarioRun};
use crate::trace::TraceMatrix;
use anyhow::{Context, Result, ensure};
use csv::StringRecord;
use itertools::Itertools;
use serde::Serialize;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "powermatch_results";

/// Per-facility results with a total row
const SUMMARY_FILE_NAME: &str = "summary.csv";

/// System results as key/value pairs
const SYSTEM_FILE_NAME: &str = "system.csv";

/// Per-step dispatch
const HOURLY_FILE_NAME: &str = "hourly.csv";

/// One row per batch scenario
const BATCH_FILE_NAME: &str = "batch.csv";

/// One row per transition year
const TRANSITION_FILE_NAME: &str = "transition.csv";

/// The ranked final population of an optimisation run
const OPTIMISATION_FILE_NAME: &str = "optimisation.csv";

/// The representative fleets from an optimisation run
const OPTIMISATION_CHOICES_FILE_NAME: &str = "optimisation_choices.csv";

/// Get the output folder for the model in the specified directory
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create the output directory if it does not already exist.
///
/// # Returns
///
/// Whether the directory already existed and had files in it.
pub fn create_output_directory(output_dir: &Path) -> Result<bool> {
    if output_dir.is_dir() {
        let mut entries = fs::read_dir(output_dir)
            .with_context(|| format!("Could not read output directory {}", output_dir.display()))?;
        return Ok(entries.next().is_some());
    }

    fs::create_dir_all(output_dir).with_context(|| {
        format!("Could not create output directory {}", output_dir.display())
    })?;

    Ok(false)
}

/// A row of the summary file
#[derive(Serialize)]
struct SummaryRow<'a> {
    name: &'a str,
    category: Option<Category>,
    capacity: f64,
    generation: f64,
    to_load: f64,
    capacity_factor: Option<f64>,
    cost: f64,
    cost_share: f64,
    lcoe: f64,
    emissions: f64,
    emissions_cost: f64,
    area: f64,
    reference_lcoe: Option<f64>,
    reference_cf: Option<f64>,
    curtailed: f64,
    charged: f64,
}

impl<'a> From<&'a FacilityMetrics> for SummaryRow<'a> {
    fn from(facility: &'a FacilityMetrics) -> Self {
        Self {
            name: facility.name.as_str(),
            category: Some(facility.category),
            capacity: facility.capacity,
            generation: facility.generation,
            to_load: facility.to_load,
            capacity_factor: Some(facility.capacity_factor),
            cost: facility.cost,
            cost_share: facility.cost_share,
            lcoe: facility.lcoe,
            emissions: facility.emissions,
            emissions_cost: facility.emissions_cost,
            area: facility.area,
            reference_lcoe: Some(facility.reference_lcoe),
            reference_cf: Some(facility.reference_cf),
            curtailed: facility.curtailed,
            charged: facility.charged,
        }
    }
}

impl<'a> SummaryRow<'a> {
    /// The total row
    fn total(facilities: &[FacilityMetrics], system: &SystemMetrics) -> Self {
        Self {
            name: "Total",
            category: None,
            capacity: facilities.iter().map(|f| f.capacity).sum(),
            generation: system.generation,
            to_load: system.served,
            capacity_factor: None,
            cost: system.cost,
            cost_share: if system.cost > 0.0 { 1.0 } else { 0.0 },
            lcoe: system.lcoe,
            emissions: system.co2,
            emissions_cost: system.carbon_cost,
            area: system.area,
            reference_lcoe: None,
            reference_cf: None,
            curtailed: system.curtailed,
            charged: system.charged,
        }
    }
}

/// A key/value row of the system file
#[derive(Serialize)]
struct SystemRow {
    key: String,
    value: String,
}

/// The label column for batch and transition rows
#[derive(Serialize)]
struct ScenarioColumn<'a> {
    scenario: &'a str,
}

/// Serialise a value as a single CSV row and return its header and record
fn to_record<T: Serialize>(value: &T) -> Result<(StringRecord, StringRecord)> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.serialize(value)?;
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let header = reader.headers()?.clone();
    let record = reader
        .records()
        .next()
        .context("Serialised row is empty")??;

    Ok((header, record))
}

/// Writes result files into an output folder, adding a prefix to each file name
pub struct ResultWriter {
    output_dir: PathBuf,
    prefix: String,
}

impl ResultWriter {
    /// Create a writer for the given folder.
    ///
    /// # Arguments
    ///
    /// * `output_dir` - Folder where files will be saved
    /// * `prefix` - Prepended to every file name (separated by an underscore) unless empty
    pub fn new(output_dir: &Path, prefix: &str) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            prefix: prefix.to_string(),
        }
    }

    /// The path to a result file
    pub fn path(&self, file_name: &str) -> PathBuf {
        if self.prefix.is_empty() {
            self.output_dir.join(file_name)
        } else {
            self.output_dir.join(format!("{}_{file_name}", self.prefix))
        }
    }

    fn writer(&self, file_name: &str) -> Result<csv::Writer<File>> {
        let path = self.path(file_name);
        csv::Writer::from_path(&path).with_context(|| format!("Could not create {}", path.display()))
    }

    /// Write per-facility and system results for a single simulation
    pub fn write_summary(&self, result: &ScenarioResult) -> Result<()> {
        let metrics = &result.metrics;
        let mut writer = self.writer(SUMMARY_FILE_NAME)?;
        for facility in &metrics.facilities {
            writer.serialize(SummaryRow::from(facility))?;
        }
        writer.serialize(SummaryRow::total(&metrics.facilities, &metrics.system))?;
        writer.flush()?;

        let (keys, values) = to_record(&metrics.system)?;
        let mut writer = self.writer(SYSTEM_FILE_NAME)?;
        for (key, value) in keys.iter().zip(values.iter()) {
            writer.serialize(SystemRow {
                key: key.into(),
                value: value.into(),
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write the dispatch for every step.
    ///
    /// There is one column per facility giving its delivery to load. Storage facilities also
    /// have columns for charging and opening state of charge.
    pub fn write_hourly(&self, outcome: &DispatchOutcome, traces: &TraceMatrix) -> Result<()> {
        let mut writer = self.writer(HOURLY_FILE_NAME)?;
        let mut header = vec!["step".to_string(), "period".into(), "load".into()];
        for record in &outcome.records {
            header.push(record.id.to_string());
            if record.category == Category::Storage {
                header.push(format!("{} charge", record.id));
                header.push(format!("{} soc", record.id));
            }
        }
        header.push("shortfall".to_string());
        header.push("surplus".to_string());
        writer.write_record(&header)?;

        for step in 0..outcome.load.len() {
            let mut row = vec![
                (step + 1).to_string(),
                traces.period(step).unwrap_or_default().to_string(),
                outcome.load[step].to_string(),
            ];
            for record in &outcome.records {
                row.push(record.dispatched[step].to_string());
                if record.category == Category::Storage {
                    row.push(record.charged[step].to_string());
                    row.push(record.soc[step].to_string());
                }
            }
            row.push(outcome.shortfall[step].to_string());
            row.push(outcome.surplus[step].to_string());
            writer.write_record(&row)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write one row of system results per scenario.
    ///
    /// If the file already exists, its rows are kept and the new rows added after them. With
    /// `replace_last`, the last existing row is dropped first.
    pub fn write_batch(&self, run: &ScenarioRun, replace_last: bool) -> Result<()> {
        let path = self.path(BATCH_FILE_NAME);
        let (header, mut rows) = scenario_records(run)?;
        let mut existing: Vec<StringRecord> = Vec::new();
        if path.is_file() {
            let mut reader = csv::Reader::from_path(&path)?;
            ensure!(
                reader.headers()? == &header,
                PowermatchError::data_shape(format!(
                    "Existing results file {} has different columns",
                    path.display()
                ))
            );
            existing = reader.records().try_collect()?;
            if replace_last {
                existing.pop();
            }
        }
        existing.append(&mut rows);

        let mut writer = self.writer(BATCH_FILE_NAME)?;
        writer.write_record(&header)?;
        for record in &existing {
            writer.write_record(record)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write one row of system results per transition year
    pub fn write_transition(&self, run: &ScenarioRun) -> Result<()> {
        let (header, rows) = scenario_records(run)?;
        let mut writer = self.writer(TRANSITION_FILE_NAME)?;
        writer.write_record(&header)?;
        for record in &rows {
            writer.write_record(record)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write the ranked candidates and the representative choices from an optimisation run
    pub fn write_optimisation(&self, result: &OptimisationResult, targets: &Targets) -> Result<()> {
        let ranking = ranking_targets(targets);
        let mut writer = self.writer(OPTIMISATION_FILE_NAME)?;
        let header = ["front".to_string(), "weighted_score".into()]
            .into_iter()
            .chain(result.facilities.iter().map(ToString::to_string))
            .chain(ranking.iter().map(ToString::to_string))
            .collect_vec();
        writer.write_record(&header)?;
        for candidate in &result.candidates {
            let row = [candidate.front.to_string(), candidate.weighted.to_string()]
                .into_iter()
                .chain(candidate.capacities.iter().map(ToString::to_string))
                .chain(
                    ranking
                        .iter()
                        .map(|target| target.value(&candidate.metrics).to_string()),
                )
                .collect_vec();
            writer.write_record(&row)?;
        }
        writer.flush()?;

        let mut writer = self.writer(OPTIMISATION_CHOICES_FILE_NAME)?;
        let header = ["choice", "weighted_score", "lcoe", "load_multiplier"]
            .map(String::from)
            .into_iter()
            .chain(result.facilities.iter().flat_map(|id| {
                [format!("{id} capacity"), format!("{id} multiplier")]
            }))
            .collect_vec();
        writer.write_record(&header)?;
        for (choice, idx) in &result.choices {
            let candidate = &result.candidates[*idx];
            let row = [
                choice.to_string(),
                candidate.weighted.to_string(),
                candidate.metrics.lcoe.to_string(),
                candidate.adjustments.load().to_string(),
            ]
            .into_iter()
            .chain(
                result
                    .facilities
                    .iter()
                    .zip(&candidate.capacities)
                    .flat_map(|(id, capacity)| {
                        [
                            capacity.to_string(),
                            candidate.adjustments.multiplier(id).to_string(),
                        ]
                    }),
            )
            .collect_vec();
            writer.write_record(&row)?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// The header and rows for a file with one row per scenario.
///
/// Each row holds the system results, then the load multiplier, then the multiplier,
/// capacity, generation and cost of every participating facility.
fn scenario_records(run: &ScenarioRun) -> Result<(StringRecord, Vec<StringRecord>)> {
    let label = ScenarioColumn { scenario: "" };
    let mut header = to_record(&(label, SystemMetrics::default()))?.0;
    header.push_field("load multiplier");
    for id in &run.facilities {
        for column in ["multiplier", "capacity", "generation", "cost"] {
            header.push_field(&format!("{id} {column}"));
        }
    }

    let mut rows = Vec::with_capacity(run.results.len());
    for result in &run.results {
        let label = ScenarioColumn {
            scenario: &result.name,
        };
        let (_, mut record) = to_record(&(label, &result.metrics.system))?;
        record.push_field(&result.adjustments.load().to_string());
        for id in &run.facilities {
            let facility = result
                .metrics
                .facilities
                .iter()
                .find(|facility| facility.name == *id)
                .with_context(|| format!("No results for {id} in scenario {}", result.name))?;
            for value in [
                result.adjustments.multiplier(id),
                facility.capacity,
                facility.generation,
                facility.cost,
            ] {
                record.push_field(&value.to_string());
            }
        }
        rows.push(record);
    }

    Ok((header, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{RecordingProgress, model};
    use crate::model::Model;
    use crate::optimiser::optimise;
    use crate::scenario::run_single;
    use rstest::rstest;
    use tempfile::tempdir;

    fn read_rows(path: &Path) -> Vec<StringRecord> {
        csv::Reader::from_path(path)
            .unwrap()
            .records()
            .try_collect()
            .unwrap()
    }

    fn run_of(model: &Model, names: &[&str]) -> ScenarioRun {
        let (base, _) = run_single(model).unwrap();
        ScenarioRun {
            facilities: model.dispatch_order.clone(),
            results: names
                .iter()
                .map(|name| ScenarioResult {
                    name: (*name).into(),
                    ..base.clone()
                })
                .collect(),
            cancelled: false,
        }
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results");
        assert!(!create_output_directory(&output_dir).unwrap());
        assert!(!create_output_directory(&output_dir).unwrap());
        fs::write(output_dir.join("summary.csv"), "").unwrap();
        assert!(create_output_directory(&output_dir).unwrap());
    }

    #[test]
    fn test_prefix() {
        let dir = Path::new("out");
        assert_eq!(ResultWriter::new(dir, "").path("a.csv"), dir.join("a.csv"));
        assert_eq!(ResultWriter::new(dir, "x").path("a.csv"), dir.join("x_a.csv"));
    }

    #[rstest]
    fn test_write_summary(model: Model) {
        let dir = tempdir().unwrap();
        let (result, _) = run_single(&model).unwrap();
        ResultWriter::new(dir.path(), "")
            .write_summary(&result)
            .unwrap();

        let rows = read_rows(&dir.path().join(SUMMARY_FILE_NAME));
        let names = rows.iter().map(|row| row[0].to_string()).collect_vec();
        assert_eq!(names, ["Solar", "Battery", "Gas", "Total"]);
        assert_eq!(&rows[3][1], "");

        let system = read_rows(&dir.path().join(SYSTEM_FILE_NAME));
        assert_eq!(&system[0][0], "load");
        assert_eq!(system[0][1].parse::<f64>().unwrap(), 40.0 * 8760.0);
        assert!(system.iter().any(|row| &row[0] == "lcoe"));
    }

    #[rstest]
    fn test_write_hourly(model: Model) {
        let dir = tempdir().unwrap();
        let (_, outcome) = run_single(&model).unwrap();
        ResultWriter::new(dir.path(), "p")
            .write_hourly(&outcome, &model.traces)
            .unwrap();

        let path = dir.path().join("p_hourly.csv");
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header = reader.headers().unwrap().iter().map(String::from).collect_vec();
        assert_eq!(
            header,
            [
                "step",
                "period",
                "load",
                "Solar",
                "Battery",
                "Battery charge",
                "Battery soc",
                "Gas",
                "shortfall",
                "surplus"
            ]
        );
        assert_eq!(read_rows(&path).len(), 8760);
    }

    #[rstest]
    fn test_write_batch_append_and_replace(model: Model) {
        let dir = tempdir().unwrap();
        let writer = ResultWriter::new(dir.path(), "");
        let path = dir.path().join(BATCH_FILE_NAME);
        let scenario_names = |path: &Path| {
            read_rows(path)
                .iter()
                .map(|row| row[0].to_string())
                .collect_vec()
        };

        writer.write_batch(&run_of(&model, &["A", "B"]), false).unwrap();
        assert_eq!(scenario_names(&path), ["A", "B"]);

        writer.write_batch(&run_of(&model, &["C"]), false).unwrap();
        assert_eq!(scenario_names(&path), ["A", "B", "C"]);

        writer.write_batch(&run_of(&model, &["D"]), true).unwrap();
        assert_eq!(scenario_names(&path), ["A", "B", "D"]);
    }

    #[rstest]
    fn test_write_batch_replace_without_file(model: Model) {
        let dir = tempdir().unwrap();
        let writer = ResultWriter::new(dir.path(), "");
        writer.write_batch(&run_of(&model, &["A"]), true).unwrap();
        assert_eq!(read_rows(&dir.path().join(BATCH_FILE_NAME)).len(), 1);
    }

    #[rstest]
    fn test_write_batch_mismatched_columns(model: Model) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(BATCH_FILE_NAME), "a,b\n1,2\n").unwrap();
        let err = ResultWriter::new(dir.path(), "")
            .write_batch(&run_of(&model, &["A"]), false)
            .unwrap_err();
        assert_eq!(
            crate::error::error_kind(&err),
            crate::error::ErrorKind::DataShape
        );
    }

    #[rstest]
    fn test_write_transition_empty() {
        let dir = tempdir().unwrap();
        let run = ScenarioRun {
            facilities: vec!["Solar".into(), "Gas".into()],
            results: Vec::new(),
            cancelled: true,
        };
        ResultWriter::new(dir.path(), "")
            .write_transition(&run)
            .unwrap();
        let mut reader = csv::Reader::from_path(dir.path().join(TRANSITION_FILE_NAME)).unwrap();
        let header = reader.headers().unwrap().clone();
        assert_eq!(&header[0], "scenario");
        assert!(header.iter().contains(&"load multiplier"));
        assert_eq!(
            header.iter().skip_while(|h| *h != "load multiplier").skip(1).collect_vec(),
            [
                "Solar multiplier",
                "Solar capacity",
                "Solar generation",
                "Solar cost",
                "Gas multiplier",
                "Gas capacity",
                "Gas generation",
                "Gas cost",
            ]
        );
    }

    #[rstest]
    fn test_write_optimisation(model: Model) {
        let dir = tempdir().unwrap();
        let result = optimise(&model, &RecordingProgress::default()).unwrap();
        let targets = model.parameters().targets();
        ResultWriter::new(dir.path(), "")
            .write_optimisation(&result, &targets)
            .unwrap();

        let rows = read_rows(&dir.path().join(OPTIMISATION_FILE_NAME));
        assert_eq!(rows.len(), result.candidates.len());
        let choices = read_rows(&dir.path().join(OPTIMISATION_CHOICES_FILE_NAME));
        let names = choices.iter().map(|row| row[0].to_string()).collect_vec();
        assert_eq!(names, ["lowest_lcoe", "lowest_weighted", "median"]);
        assert_eq!(choices[0].len(), 4 + 2 * 2);
    }
}
