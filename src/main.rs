//! Provides the main entry point to the program.
use human_panic::setup_panic;
use powermatch::cli::run_cli;
use powermatch::error::{error_kind, format_error_line};
use powermatch::log::is_logger_initialised;
use std::process::ExitCode;

fn main() -> ExitCode {
    setup_panic!();

    let Err(err) = run_cli() else {
        return ExitCode::SUCCESS;
    };

    if is_logger_initialised() {
        ::log::error!("{err:?}");
    }

    // The last line on stderr is always the machine-readable summary
    eprintln!("{}", format_error_line(&err));
    ExitCode::from(error_kind(&err).exit_code())
}
