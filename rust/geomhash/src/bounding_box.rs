use crate::position::Position;
use serde::Serialize;
use std::ops::{
    Add,
    Sub,
};

/// Coordinates a [`BoundingBox`] can track.
///
/// Implemented for [`Position`] (2D positions) and `f64` (1D, e.g. intensities).
pub trait Corner: Copy + Add<Output = Self> + Sub<Output = Self> {
    fn lower(self, other: Self) -> Self;
    fn upper(self, other: Self) -> Self;
}

impl Corner for f64 {
    fn lower(self, other: Self) -> Self {
        self.min(other)
    }

    fn upper(self, other: Self) -> Self {
        self.max(other)
    }
}

impl Corner for Position {
    fn lower(self, other: Self) -> Self {
        self.component_min(other)
    }

    fn upper(self, other: Self) -> Self {
        self.component_max(other)
    }
}

/// Min/max corners of everything enlarged into it so far.
///
/// A fresh box is empty; the first [`BoundingBox::enlarge`] sets both
/// corners to that point. Queries on an empty box return `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox<P> {
    extent: Option<(P, P)>,
}

impl<P> Default for BoundingBox<P> {
    fn default() -> Self {
        Self { extent: None }
    }
}

impl<P: Corner> BoundingBox<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Box spanning exactly the two given corners.
    pub fn from_corners(a: P, b: P) -> Self {
        let mut out = Self::new();
        out.enlarge(a);
        out.enlarge(b);
        out
    }

    pub fn from_points(points: impl IntoIterator<Item = P>) -> Self {
        let mut out = Self::new();
        points.into_iter().for_each(|p| out.enlarge(p));
        out
    }

    pub fn is_empty(&self) -> bool {
        self.extent.is_none()
    }

    pub fn clear(&mut self) {
        self.extent = None;
    }

    pub fn enlarge(&mut self, point: P) {
        self.extent = match self.extent {
            None => Some((point, point)),
            Some((min, max)) => Some((min.lower(point), max.upper(point))),
        };
    }

    pub fn min(&self) -> Option<P> {
        self.extent.map(|(min, _)| min)
    }

    pub fn max(&self) -> Option<P> {
        self.extent.map(|(_, max)| max)
    }

    /// `max - min`.
    pub fn diagonal(&self) -> Option<P> {
        self.extent.map(|(min, max)| max - min)
    }

    /// Copy grown by `margin` on both ends.
    pub fn expanded(&self, margin: P) -> Self {
        match self.extent {
            None => Self::new(),
            Some((min, max)) => Self::from_corners(min - margin, max + margin),
        }
    }
}
