use crate::position::Position;
use serde::{
    Deserialize,
    Serialize,
};

/// Anything that can be aligned: a 2D position plus an intensity.
///
/// Only the RT/MZ position and the intensity are read; the features
/// themselves are never modified.
pub trait FeatureLike {
    fn position(&self) -> Position;
    fn intensity(&self) -> f64;
}

impl<T: FeatureLike> FeatureLike for &T {
    fn position(&self) -> Position {
        (*self).position()
    }

    fn intensity(&self) -> f64 {
        (*self).intensity()
    }
}

/// Plain feature record, the row format of feature-map files.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Feature {
    pub rt: f64,
    pub mz: f64,
    pub intensity: f64,
}

impl Feature {
    pub fn new(rt: f64, mz: f64, intensity: f64) -> Self {
        Self { rt, mz, intensity }
    }

    pub fn at(position: Position, intensity: f64) -> Self {
        Self {
            rt: position.rt,
            mz: position.mz,
            intensity,
        }
    }
}

impl FeatureLike for Feature {
    fn position(&self) -> Position {
        Position::new(self.rt, self.mz)
    }

    fn intensity(&self) -> f64 {
        self.intensity
    }
}

/// Which of the two input maps a structure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapRole {
    /// Map 0, the reference.
    PreImage,
    /// Map 1, the map being translated onto the reference.
    Image,
}

impl MapRole {
    pub fn index(&self) -> usize {
        match self {
            MapRole::PreImage => 0,
            MapRole::Image => 1,
        }
    }

    /// Suffix appended to per-map dump files.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            MapRole::PreImage => "_preimage",
            MapRole::Image => "_image",
        }
    }
}
