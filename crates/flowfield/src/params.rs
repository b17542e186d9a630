//! Tunable field parameters and their on-disk form.

use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::boundary::BoundaryType;
use crate::error::FieldError;
use crate::placement::Placement;

/// Everything about a field that can change after construction.
///
/// Grid size is not here; it is fixed when the field is created.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldParams {
    /// Spread rate of velocity and ink. 0 disables diffusion.
    pub diffusion: f32,
    /// Velocity decay rate. 0 disables damping.
    pub damping: f32,
    pub time_step: f32,
    /// Relaxation sweeps per linear solve.
    pub iterations: usize,
    /// Energy kept by a reflection off a `Closed` wall or obstacle.
    pub wall_reflectivity: f32,
    /// Reported with every flow sample; not used by the solver.
    pub viscosity: f32,
    pub boundary_type: BoundaryType,
    pub placement: Placement,
}

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            diffusion: 0.0,
            damping: 0.0,
            time_step: 0.1,
            iterations: 4,
            wall_reflectivity: 1.0,
            viscosity: 1.0,
            boundary_type: BoundaryType::Closed,
            placement: Placement::default(),
        }
    }
}

impl FieldParams {
    /// Reject values the solver cannot run with.
    pub fn validate(&self) -> Result<(), FieldError> {
        non_negative("diffusion", self.diffusion)?;
        non_negative("damping", self.damping)?;
        non_negative("wall_reflectivity", self.wall_reflectivity)?;
        non_negative("viscosity", self.viscosity)?;
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return Err(FieldError::InvalidParameter {
                name: "time_step",
                value: self.time_step,
            });
        }
        if self.iterations == 0 {
            return Err(FieldError::InvalidParameter {
                name: "iterations",
                value: 0.0,
            });
        }
        if self.wall_reflectivity > 1.0 {
            warn!(
                "wall_reflectivity {} > 1 adds energy on every reflection",
                self.wall_reflectivity
            );
        }
        self.placement.validate()
    }

    pub fn from_json(json: &str) -> Result<Self, FieldError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, FieldError> {
        let params: Self = serde_yaml::from_str(yaml)?;
        params.validate()?;
        Ok(params)
    }

    /// Save parameters to a JSON file
    pub fn save_json(&self, path: &Path) -> Result<(), FieldError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("saved field params to {}", path.display());
        Ok(())
    }

    /// Load parameters from a JSON file
    pub fn load_json(path: &Path) -> Result<Self, FieldError> {
        let json = std::fs::read_to_string(path)?;
        let params = Self::from_json(&json)?;
        info!("loaded field params from {}", path.display());
        Ok(params)
    }

    /// Save parameters to a YAML file
    pub fn save_yaml(&self, path: &Path) -> Result<(), FieldError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        info!("saved field params to {}", path.display());
        Ok(())
    }

    /// Load parameters from a YAML file
    pub fn load_yaml(path: &Path) -> Result<Self, FieldError> {
        let yaml = std::fs::read_to_string(path)?;
        let params = Self::from_yaml(&yaml)?;
        info!("loaded field params from {}", path.display());
        Ok(params)
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), FieldError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FieldError::InvalidParameter { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_defaults() {
        let params = FieldParams::default();
        assert_eq!(params.diffusion, 0.0);
        assert_eq!(params.damping, 0.0);
        assert_eq!(params.time_step, 0.1);
        assert_eq!(params.iterations, 4);
        assert_eq!(params.wall_reflectivity, 1.0);
        assert_eq!(params.boundary_type, BoundaryType::Closed);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let params = FieldParams { time_step: 0.0, ..Default::default() };
        assert!(matches!(
            params.validate(),
            Err(FieldError::InvalidParameter { name: "time_step", .. })
        ));

        let params = FieldParams { iterations: 0, ..Default::default() };
        assert!(params.validate().is_err());

        let params = FieldParams { diffusion: f32::NAN, ..Default::default() };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let params = FieldParams::from_yaml("boundary_type: WrapAround\niterations: 12\n").unwrap();
        assert_eq!(params.boundary_type, BoundaryType::WrapAround);
        assert_eq!(params.iterations, 12);
        assert_eq!(params.time_step, 0.1);
    }

    #[test]
    fn test_json_file_round_trip() {
        let params = FieldParams {
            diffusion: 0.01,
            boundary_type: BoundaryType::OpenShared,
            placement: Placement {
                position: Vec3::new(1.0, 2.0, 3.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let path = std::env::temp_dir().join(format!("flowfield_params_{}.json", std::process::id()));
        params.save_json(&path).unwrap();
        let loaded = FieldParams::load_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, params);
    }

    #[test]
    fn test_invalid_json_reports_parse_error() {
        assert!(matches!(FieldParams::from_json("{ nope"), Err(FieldError::Json(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = FieldParams::load_yaml(Path::new("/nonexistent/flowfield.yaml")).unwrap_err();
        assert!(matches!(err, FieldError::Io(_)));
    }
}
