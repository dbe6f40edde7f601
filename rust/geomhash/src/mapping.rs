use crate::feature::{
    Feature,
    FeatureLike,
};
use crate::position::{
    Dimension,
    Position,
};
use crate::translation::Translation;
use serde::{
    Deserialize,
    Serialize,
};

/// `y = slope * x + intercept` on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearMapping {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for LinearMapping {
    fn default() -> Self {
        Self::identity()
    }
}

impl LinearMapping {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0)
    }

    /// Pure shift by `offset`.
    pub fn shift(offset: f64) -> Self {
        Self::new(1.0, offset)
    }

    pub fn apply(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Independent RT and MZ mappings that carry image coordinates into the
/// pre-image frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionMapping {
    pub rt: LinearMapping,
    pub mz: LinearMapping,
}

impl PositionMapping {
    /// Undoes `translation`, which points from the pre-image to the image.
    pub fn from_translation(translation: &Translation) -> Self {
        let shift = -translation.position;
        Self {
            rt: LinearMapping::shift(shift.rt),
            mz: LinearMapping::shift(shift.mz),
        }
    }

    pub fn get(&self, dim: Dimension) -> &LinearMapping {
        match dim {
            Dimension::Rt => &self.rt,
            Dimension::Mz => &self.mz,
        }
    }

    pub fn apply(&self, position: Position) -> Position {
        Position::new(self.rt.apply(position.rt), self.mz.apply(position.mz))
    }
}

/// Copy of `features` with every position mapped, intensities kept.
pub fn apply_to_features<F: FeatureLike>(mapping: &PositionMapping, features: &[F]) -> Vec<Feature> {
    features
        .iter()
        .map(|f| Feature::at(mapping.apply(f.position()), f.intensity()))
        .collect()
}
