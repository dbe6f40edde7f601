use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Display;
use std::ops::{
    Add,
    AddAssign,
    Div,
    DivAssign,
    Index,
    IndexMut,
    Mul,
    MulAssign,
    Neg,
    Sub,
    SubAssign,
};

/// The two LC-MS dimensions used for alignment.
///
/// Grids are laid out with RT along the rows and MZ along the columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Rt,
    Mz,
}

impl Dimension {
    pub const ALL: [Dimension; 2] = [Dimension::Rt, Dimension::Mz];

    /// Short name as used in parameter keys, e.g. `feature_map:bucket_size:RT`.
    pub fn short_name(&self) -> &'static str {
        match self {
            Dimension::Rt => "RT",
            Dimension::Mz => "MZ",
        }
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A point (or displacement) on the retention time / m/z plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub rt: f64,
    pub mz: f64,
}

impl Position {
    pub const ZERO: Position = Position { rt: 0.0, mz: 0.0 };

    pub const fn new(rt: f64, mz: f64) -> Self {
        Self { rt, mz }
    }

    /// Same value on both axes.
    pub const fn splat(v: f64) -> Self {
        Self { rt: v, mz: v }
    }

    /// Applies `f` to each component.
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            rt: f(self.rt),
            mz: f(self.mz),
        }
    }

    /// Combines two positions component by component.
    pub fn zip_with(self, other: Self, f: impl Fn(f64, f64) -> f64) -> Self {
        Self {
            rt: f(self.rt, other.rt),
            mz: f(self.mz, other.mz),
        }
    }

    pub fn component_mul(self, other: Self) -> Self {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn component_div(self, other: Self) -> Self {
        self.zip_with(other, |a, b| a / b)
    }

    pub fn component_min(self, other: Self) -> Self {
        self.zip_with(other, f64::min)
    }

    pub fn component_max(self, other: Self) -> Self {
        self.zip_with(other, f64::max)
    }

    pub fn is_finite(&self) -> bool {
        self.rt.is_finite() && self.mz.is_finite()
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.rt, self.mz)
    }
}

impl From<(f64, f64)> for Position {
    fn from((rt, mz): (f64, f64)) -> Self {
        Self { rt, mz }
    }
}

impl Index<Dimension> for Position {
    type Output = f64;

    fn index(&self, dim: Dimension) -> &f64 {
        match dim {
            Dimension::Rt => &self.rt,
            Dimension::Mz => &self.mz,
        }
    }
}

impl IndexMut<Dimension> for Position {
    fn index_mut(&mut self, dim: Dimension) -> &mut f64 {
        match dim {
            Dimension::Rt => &mut self.rt,
            Dimension::Mz => &mut self.mz,
        }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Neg for Position {
    type Output = Position;

    fn neg(self) -> Position {
        self.map(|v| -v)
    }
}

impl Mul<f64> for Position {
    type Output = Position;

    fn mul(self, rhs: f64) -> Position {
        self.map(|v| v * rhs)
    }
}

impl Div<f64> for Position {
    type Output = Position;

    fn div(self, rhs: f64) -> Position {
        self.map(|v| v / rhs)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        *self = *self + rhs;
    }
}

impl SubAssign for Position {
    fn sub_assign(&mut self, rhs: Position) {
        *self = *self - rhs;
    }
}

impl MulAssign<f64> for Position {
    fn mul_assign(&mut self, rhs: f64) {
        *self = *self * rhs;
    }
}

impl DivAssign<f64> for Position {
    fn div_assign(&mut self, rhs: f64) {
        *self = *self / rhs;
    }
}
