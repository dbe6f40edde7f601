use crate::feature::FeatureLike;
use crate::position::Position;
use serde::{
    Deserialize,
    Serialize,
};
use std::ops::{
    Add,
    AddAssign,
};

/// A candidate displacement between the two maps and how much we trust it.
///
/// `quality` is never negative. When it is exactly zero the position is a
/// placeholder (always the zero vector when produced by this crate) and must
/// not be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Translation {
    pub position: Position,
    pub quality: f64,
}

impl Translation {
    pub fn new(position: Position, quality: f64) -> Self {
        Self { position, quality }
    }

    /// Translation and similarity for a pre-image/image feature pair.
    ///
    /// The position is `right - left`. The quality is the ratio of the two
    /// intensities, taken whichever way round keeps it in `[0, 1]`, so equal
    /// intensities give 1.0. A zero intensity on the image side, or a
    /// negative one on either side, gives 0.
    pub fn between<L: FeatureLike, R: FeatureLike>(left: &L, right: &R) -> Self {
        Self {
            position: right.position() - left.position(),
            quality: intensity_similarity(left.intensity(), right.intensity()),
        }
    }

    /// Zero quality, the position carries no information.
    pub fn is_degenerate(&self) -> bool {
        self.quality == 0.0
    }

    /// Adds `other` as a quality-weighted sample: position scaled by its
    /// quality, quality summed.
    pub fn accumulate_weighted(&mut self, other: &Translation) {
        self.position += other.position * other.quality;
        self.quality += other.quality;
    }

    /// Turns an accumulated weighted sum into a weighted mean.
    ///
    /// Zero total quality leaves the position as accumulated (zero for a
    /// sum of zero-quality samples) instead of dividing.
    pub fn normalized(mut self) -> Self {
        if self.quality != 0.0 {
            self.position /= self.quality;
        }
        self
    }
}

impl Add for Translation {
    type Output = Translation;

    fn add(self, rhs: Translation) -> Translation {
        Translation {
            position: self.position + rhs.position,
            quality: self.quality + rhs.quality,
        }
    }
}

impl AddAssign for Translation {
    fn add_assign(&mut self, rhs: Translation) {
        *self = *self + rhs;
    }
}

/// `min(a/b, b/a)`, with `right == 0` and negative intensities mapping to
/// zero similarity.
pub fn intensity_similarity(left: f64, right: f64) -> f64 {
    if right <= 0.0 || left < 0.0 {
        return 0.0;
    }
    let ratio = left / right;
    if ratio <= 1.0 { ratio } else { 1.0 / ratio }
}
