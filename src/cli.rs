//! The command line interface.
use crate::log;
use crate::error::PowermatchError;
use crate::model::Model;
use crate::optimiser::optimise;
use crate::output::metadata::{METADATA_FILE_NAME, write_metadata};
use crate::output::{ResultWriter, create_output_directory, get_output_dir};
use crate::progress::{LogProgress, ProgressSink};
use crate::scenario::{ScenarioRun, run_batch, run_single, run_transition};
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result, ensure};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use strum::Display;

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// Hourly dispatch simulation and capacity optimisation for electricity grids.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// What a run produces
#[derive(ValueEnum, Display, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum RunMode {
    /// Per-facility and system results for the configured fleet
    #[default]
    Summary,
    /// Summary results plus the dispatch for every step
    Detail,
    /// One row of results per column of the batch sheet
    Batch,
    /// One row of results per transition year
    Transition,
    /// Search for the best fleet
    Optimise,
}

/// Options for the run command
#[derive(Args, Clone, Debug, Default)]
pub struct RunOpts {
    /// What to run
    #[arg(long, value_enum, default_value_t)]
    pub mode: RunMode,
    /// Overwrite the last row of an existing batch results file instead of appending
    #[arg(long)]
    pub replace_last: bool,
    /// Prefix for result file names
    #[arg(long, default_value = "")]
    pub prefix: String,
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to allow writing into an output directory which already has files in it
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a model.
    Run {
        /// Path to the configuration file (or the folder containing powermatch.toml).
        #[arg(long)]
        config: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Load and check a model without running it.
    Validate {
        /// Path to the configuration file (or the folder containing powermatch.toml).
        #[arg(long)]
        config: PathBuf,
    },
    /// Manage example models.
    Example {
        /// The available subcommands for managing example models.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Manage the program settings file.
    Settings {
        /// The available subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { config, opts } => handle_run_command(&config, &opts, None),
            Self::Validate { config } => handle_validate_command(&config, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ powermatch --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// The folder holding the model's input files
fn model_dir(config_path: &Path) -> PathBuf {
    if config_path.is_dir() {
        return config_path.to_path_buf();
    }

    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Set up logging unless an earlier command in this process already has
fn init_logging(settings: &Settings, log_dir: Option<&Path>) -> Result<()> {
    if log::is_logger_initialised() {
        return Ok(());
    }

    let log_dir = log_dir.filter(|_| settings.log_files);
    log::init(Some(&settings.log_level), log_dir).context("Failed to initialise logging.")
}

/// Handle the `run` command.
///
/// # Arguments
///
/// * `config_path` - The configuration file, or the folder containing it
/// * `opts` - Run options
/// * `settings` - Program settings (read from the settings file if not given)
pub fn handle_run_command(
    config_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = match settings {
        Some(settings) => settings,
        None => Settings::load().context("Failed to load settings.")?,
    };

    let output_dir = match &opts.output_dir {
        Some(dir) => dir.clone(),
        None => get_output_dir(&model_dir(config_path))?,
    };
    let had_results = create_output_directory(&output_dir)?;
    let overwrite = opts.overwrite || settings.overwrite;

    // Batch runs add to the results already there
    ensure!(
        !had_results || overwrite || opts.mode == RunMode::Batch,
        PowermatchError::config(format!(
            "Output folder {} already contains files. Use --overwrite to replace them.",
            output_dir.display()
        ))
    );
    init_logging(&settings, Some(&output_dir))?;

    let model = Model::from_path(config_path).context("Failed to load model.")?;
    info!("Loaded model from {}", config_path.display());
    info!("Output folder: {}", output_dir.display());
    if had_results && opts.mode != RunMode::Batch {
        warn!("Existing results in the output folder will be overwritten");
    }

    let writer = ResultWriter::new(&output_dir, &opts.prefix);
    run_model(&model, opts, &writer, &LogProgress)?;

    let seed = match opts.mode {
        RunMode::Optimise => model.parameters().optimise_seed,
        _ => None,
    };
    write_metadata(
        &writer.path(METADATA_FILE_NAME),
        config_path,
        &opts.mode.to_string(),
        seed,
    )?;
    info!("Run complete!");

    Ok(())
}

/// Log a warning if a run was cut short
fn note_cancelled(run: &ScenarioRun) {
    if run.cancelled {
        warn!(
            "Run cancelled: writing the {} completed scenarios",
            run.results.len()
        );
    }
}

/// Run a loaded model in the requested mode and write the results
pub fn run_model(
    model: &Model,
    opts: &RunOpts,
    writer: &ResultWriter,
    progress: &dyn ProgressSink,
) -> Result<()> {
    match opts.mode {
        RunMode::Summary => {
            let (result, _) = run_single(model)?;
            writer.write_summary(&result)?;
        }
        RunMode::Detail => {
            let (result, outcome) = run_single(model)?;
            writer.write_summary(&result)?;
            writer.write_hourly(&outcome, &model.traces)?;
        }
        RunMode::Batch => {
            let run = run_batch(model, progress)?;
            note_cancelled(&run);
            writer.write_batch(&run, opts.replace_last)?;
        }
        RunMode::Transition => {
            let run = run_transition(model, progress)?;
            note_cancelled(&run);
            writer.write_transition(&run)?;
        }
        RunMode::Optimise => {
            let result = optimise(model, progress)?;
            if result.cancelled {
                warn!("Optimisation cancelled: writing the current population");
            }
            writer.write_optimisation(&result, &model.parameters().targets())?;
        }
    }

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(config_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = match settings {
        Some(settings) => settings,
        None => Settings::load().context("Failed to load settings.")?,
    };

    // No log files are written when validating
    init_logging(&settings, None)?;

    Model::from_path(config_path).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}
