//! Classification of the failures the engine reports at its boundary.
//!
//! Internally every fallible function returns an [`anyhow::Result`]. Where a failure belongs to
//! one of the documented categories, a [`PowermatchError`] is placed at the root of the error
//! chain so that callers (chiefly the CLI) can recover the [`ErrorKind`] with [`error_kind`].
use derive_more::Display;
use strum::Display as StrumDisplay;

/// The abstract category of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum ErrorKind {
    /// Missing or invalid section/property in the configuration
    #[strum(serialize = "ConfigError")]
    Config,
    /// Inconsistent trace lengths, missing facility columns, empty dispatch order
    #[strum(serialize = "DataShape")]
    DataShape,
    /// Constraint bound inversions, negative capacities, unknown references
    #[strum(serialize = "ValidationError")]
    Validation,
    /// Every candidate fleet failed to serve any load
    #[strum(serialize = "Infeasible")]
    Infeasible,
    /// The run was cancelled by the user
    #[strum(serialize = "Cancelled")]
    Cancelled,
    /// Reading or writing files failed
    #[strum(serialize = "IOError")]
    Io,
}

impl ErrorKind {
    /// The process exit code used when a run fails with this kind of error
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Cancelled => 0,
            Self::Config => 2,
            Self::DataShape => 3,
            Self::Validation => 4,
            Self::Infeasible => 5,
            Self::Io => 6,
        }
    }
}

/// An error with a known [`ErrorKind`]
#[derive(Debug, Display)]
#[display("{message}")]
pub struct PowermatchError {
    /// The category of the error
    pub kind: ErrorKind,
    /// A description of what went wrong
    pub message: String,
}

impl std::error::Error for PowermatchError {}

impl PowermatchError {
    /// Create a new error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A [`ErrorKind::Config`] error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// A [`ErrorKind::DataShape`] error
    pub fn data_shape(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataShape, message)
    }

    /// A [`ErrorKind::Validation`] error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// A [`ErrorKind::Infeasible`] error
    pub fn infeasible(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Infeasible, message)
    }
}

/// Work out which [`ErrorKind`] an error belongs to.
///
/// The chain is searched for a [`PowermatchError`] first. Failing that, I/O errors map to
/// [`ErrorKind::Io`], CSV errors are classified by their own kind and TOML parse errors map to
/// [`ErrorKind::Config`]. Anything else is treated as a validation failure.
pub fn error_kind(err: &anyhow::Error) -> ErrorKind {
    if let Some(err) = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<PowermatchError>())
    {
        return err.kind;
    }

    for cause in err.chain() {
        if let Some(csv_err) = cause.downcast_ref::<csv::Error>() {
            return match csv_err.kind() {
                csv::ErrorKind::Io(_) => ErrorKind::Io,
                csv::ErrorKind::UnequalLengths { .. } => ErrorKind::DataShape,
                _ => ErrorKind::Validation,
            };
        }
        if cause.is::<std::io::Error>() {
            return ErrorKind::Io;
        }
        if cause.is::<toml::de::Error>() {
            return ErrorKind::Config;
        }
    }

    ErrorKind::Validation
}

/// Render an error as a single machine-readable line for stderr
pub fn format_error_line(err: &anyhow::Error) -> String {
    let message = err
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ");
    format!("error kind={} message={message:?}", error_kind(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Config, "ConfigError", 2)]
    #[case(ErrorKind::DataShape, "DataShape", 3)]
    #[case(ErrorKind::Validation, "ValidationError", 4)]
    #[case(ErrorKind::Infeasible, "Infeasible", 5)]
    #[case(ErrorKind::Io, "IOError", 6)]
    #[case(ErrorKind::Cancelled, "Cancelled", 0)]
    fn test_error_kind_names_and_codes(
        #[case] kind: ErrorKind,
        #[case] name: &str,
        #[case] code: u8,
    ) {
        assert_eq!(kind.to_string(), name);
        assert_eq!(kind.exit_code(), code);
    }

    #[test]
    fn test_error_kind_found_beneath_context() {
        let err = Err::<(), _>(PowermatchError::data_shape("bad length"))
            .context("Failed to load traces")
            .unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::DataShape);
    }

    #[test]
    fn test_error_kind_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = anyhow::Error::from(io).context("Could not open file");
        assert_eq!(error_kind(&err), ErrorKind::Io);
    }

    #[test]
    fn test_error_kind_fallback() {
        assert_eq!(error_kind(&anyhow!("something odd")), ErrorKind::Validation);
    }

    #[test]
    fn test_format_error_line() {
        let err = anyhow::Error::from(PowermatchError::config("unknown key"))
            .context("Failed to load model");
        assert_eq!(
            format_error_line(&err),
            "error kind=ConfigError message=\"Failed to load model: unknown key\""
        );
    }
}
