use crate::feature::MapRole;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeomHashError {
    /// A required parameter is absent. Raised before any grid is allocated.
    #[error("Required parameter not found: {key}")]
    ConfigurationMissing { key: String },

    #[error("Invalid value for parameter {key}: {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("Feature map {map:?} is empty")]
    EmptyInput { map: MapRole },

    #[error("Feature {feature_index} in map {map:?} has a non-finite position or intensity")]
    NonFiniteFeature { map: MapRole, feature_index: usize },

    #[error("Feature {feature_index} in map {map:?} has a negative intensity")]
    NegativeIntensity { map: MapRole, feature_index: usize },

    #[error("Failed to write diagnostics to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GeomHashError {
    pub fn missing(key: impl Into<String>) -> Self {
        Self::ConfigurationMissing { key: key.into() }
    }

    pub fn invalid(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidParameter {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}
