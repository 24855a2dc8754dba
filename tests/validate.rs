//! Integration tests for the `validate` command.
use powermatch::cli::handle_validate_command;
use powermatch::error::{ErrorKind, error_kind, format_error_line};
use powermatch::log::is_logger_initialised;
use powermatch::settings::Settings;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

/// Get the path to the example model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

fn settings() -> Option<Settings> {
    unsafe { std::env::set_var("POWERMATCH_LOG_LEVEL", "off") };
    Some(Settings::default())
}

/// Copy the example model, replacing text in one of its files
fn broken_model(file_name: &str, from: &str, to: &str) -> TempDir {
    let dir = tempdir().unwrap();
    for entry in fs::read_dir(get_model_dir()).unwrap() {
        let path = entry.unwrap().path();
        fs::copy(&path, dir.path().join(path.file_name().unwrap())).unwrap();
    }
    let path = dir.path().join(file_name);
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains(from));
    fs::write(&path, contents.replacen(from, to, 1)).unwrap();
    dir
}

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    handle_validate_command(&get_model_dir(), settings()).unwrap();
    assert!(is_logger_initialised());
}

#[rstest]
#[case("powermatch.toml", "carbon_price = 30.0", "carbon_price = -1.0", ErrorKind::Config)]
#[case("powermatch.toml", "\"Wind\", \"Battery\"", "\"Hydro\", \"Battery\"", ErrorKind::Config)]
#[case("powermatch.toml", "dispatch_order = [\"Solar\", \"Wind\", \"Battery\", \"Gas\"]", "dispatch_order = []", ErrorKind::DataShape)]
#[case("constraints.csv", "Gas,Generator,0.2,1", "Gas,Generator,0.9,0.5", ErrorKind::Validation)]
#[case("generators.csv", "Wind,Wind,100", "Wind,Wind,-100", ErrorKind::Validation)]
#[case("data.csv", "Technology,,Load,Solar,Wind", "Technology,,Demand,Solar,Wind", ErrorKind::DataShape)]
#[case("powermatch.toml", "data = \"data.csv\"", "data = \"missing.csv\"", ErrorKind::Io)]
fn test_validate_errors(
    #[case] file_name: &str,
    #[case] from: &str,
    #[case] to: &str,
    #[case] kind: ErrorKind,
) {
    let dir = broken_model(file_name, from, to);
    let err = handle_validate_command(dir.path(), settings()).unwrap_err();
    assert_eq!(error_kind(&err), kind);
    assert!(format_error_line(&err).starts_with(&format!("error kind={kind} message=")));
}

#[test]
fn test_validate_missing_config() {
    let err = handle_validate_command(Path::new("demos/missing"), settings()).unwrap_err();
    assert_eq!(error_kind(&err), ErrorKind::Io);
    assert_eq!(error_kind(&err).exit_code(), 6);
}
