//! Error type for field construction, configuration and stepping.

use crate::boundary::BoundaryType;

/// Errors surfaced by a [`FluidField`](crate::FluidField) or its configuration.
#[derive(Debug)]
pub enum FieldError {
    /// Grid side too small to have an interior.
    InvalidSize(usize),
    /// A tunable was out of range or not finite.
    InvalidParameter { name: &'static str, value: f32 },
    /// A coupled boundary regime was selected without a parent flow source.
    MissingParent(BoundaryType),
    /// The parent flow source is in the middle of its own step.
    ParentBusy,
    /// A flow source answered with the wrong number of samples.
    SampleCountMismatch { expected: usize, actual: usize },
    /// A previous step did not run to completion; call `reset()` first.
    StepFaulted,
    Io(std::io::Error),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::InvalidSize(size) => {
                write!(f, "grid size must be at least 3, got {}", size)
            }
            FieldError::InvalidParameter { name, value } => {
                write!(f, "invalid value for {}: {}", name, value)
            }
            FieldError::MissingParent(kind) => {
                write!(f, "boundary type {:?} needs a parent flow source", kind)
            }
            FieldError::ParentBusy => write!(f, "parent flow source is mid-step"),
            FieldError::SampleCountMismatch { expected, actual } => write!(
                f,
                "flow source returned {} samples for {} points",
                actual, expected
            ),
            FieldError::StepFaulted => {
                write!(f, "previous step was interrupted; reset the field before stepping")
            }
            FieldError::Io(e) => write!(f, "config I/O failed: {}", e),
            FieldError::Json(e) => write!(f, "JSON config error: {}", e),
            FieldError::Yaml(e) => write!(f, "YAML config error: {}", e),
        }
    }
}

impl std::error::Error for FieldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FieldError::Io(e) => Some(e),
            FieldError::Json(e) => Some(e),
            FieldError::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FieldError {
    fn from(e: std::io::Error) -> Self {
        FieldError::Io(e)
    }
}

impl From<serde_json::Error> for FieldError {
    fn from(e: serde_json::Error) -> Self {
        FieldError::Json(e)
    }
}

impl From<serde_yaml::Error> for FieldError {
    fn from(e: serde_yaml::Error) -> Self {
        FieldError::Yaml(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_mentions_values() {
        let err = FieldError::InvalidParameter { name: "time_step", value: -1.0 };
        assert_eq!(err.to_string(), "invalid value for time_step: -1");

        let err = FieldError::SampleCountMismatch { expected: 8, actual: 3 };
        assert!(err.to_string().contains("3 samples for 8 points"));
    }

    #[test]
    fn test_io_error_has_source() {
        let err: FieldError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
        assert!(FieldError::ParentBusy.source().is_none());
    }
}
