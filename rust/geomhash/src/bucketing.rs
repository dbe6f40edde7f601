use crate::bounding_box::BoundingBox;
use crate::errors::GeomHashError;
use crate::feature::{
    FeatureLike,
    MapRole,
};
use crate::grid::{
    Matrix,
    checked_grid_shape,
};
use crate::position::Position;
use tracing::{
    debug,
    instrument,
};

/// Added to `diagonal / bucket_size` before truncating, so boundary points
/// are never dropped and there is at least one spare bucket of slack.
const BUCKET_COUNT_MARGIN: f64 = 1.1;

/// Spatial index of one feature map: every feature index sits in the grid
/// cell its position falls into.
///
/// The grid origin is the raw bounding box grown symmetrically until its
/// extent is a whole number of buckets on each axis.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBuckets {
    role: MapRole,
    position_bbox: BoundingBox<Position>,
    intensity_bbox: BoundingBox<f64>,
    enlarged_bbox: BoundingBox<Position>,
    raw_min: Position,
    origin: Position,
    bucket_size: Position,
    buckets: Matrix<Vec<usize>>,
}

impl FeatureBuckets {
    /// Buckets `features` into cells of `bucket_size`.
    ///
    /// # Errors
    /// - [`GeomHashError::EmptyInput`] when `features` is empty.
    /// - [`GeomHashError::NonFiniteFeature`] when a position or intensity is NaN/infinite.
    /// - [`GeomHashError::NegativeIntensity`] when an intensity is below zero.
    /// - [`GeomHashError::InvalidParameter`] when `bucket_size` is too small
    ///   for the grid to be allocated.
    #[instrument(skip_all, level = "debug", fields(map = ?role, num_features = features.len()))]
    pub fn compute<F: FeatureLike>(
        role: MapRole,
        features: &[F],
        bucket_size: Position,
    ) -> Result<Self, GeomHashError> {
        let mut position_bbox = BoundingBox::new();
        let mut intensity_bbox = BoundingBox::new();
        for (feature_index, feature) in features.iter().enumerate() {
            let position = feature.position();
            let intensity = feature.intensity();
            if !position.is_finite() || !intensity.is_finite() {
                return Err(GeomHashError::NonFiniteFeature {
                    map: role,
                    feature_index,
                });
            }
            if intensity < 0.0 {
                return Err(GeomHashError::NegativeIntensity {
                    map: role,
                    feature_index,
                });
            }
            position_bbox.enlarge(position);
            intensity_bbox.enlarge(intensity);
        }

        let (raw_min, raw_max) = match (position_bbox.min(), position_bbox.max()) {
            (Some(min), Some(max)) => (min, max),
            _ => return Err(GeomHashError::EmptyInput { map: role }),
        };
        debug!(
            "Position box: {} - {}, intensity box: {:?} - {:?}",
            raw_min,
            raw_max,
            intensity_bbox.min(),
            intensity_bbox.max()
        );

        let diagonal = raw_max - raw_min;
        let num_buckets = diagonal
            .component_div(bucket_size)
            .map(|v| (BUCKET_COUNT_MARGIN + v).floor());
        let enlarged_diagonal = bucket_size.component_mul(num_buckets);
        let extra_margin = (enlarged_diagonal - diagonal) / 2.0;
        let enlarged_bbox = position_bbox.expanded(extra_margin);
        let origin = raw_min - extra_margin;

        let (rows, cols) = checked_grid_shape("feature_map", (num_buckets.rt, num_buckets.mz), 0)?;
        debug!(
            "Diagonal: {}, enlarged: {}, margin: {}, buckets: {}x{}",
            diagonal, enlarged_diagonal, extra_margin, rows, cols
        );

        let mut out = Self {
            role,
            position_bbox,
            intensity_bbox,
            enlarged_bbox,
            raw_min,
            origin,
            bucket_size,
            buckets: Matrix::new(rows, cols),
        };
        for (feature_index, feature) in features.iter().enumerate() {
            let cell = out.bucket_of(feature.position());
            out.buckets[cell].push(feature_index);
        }

        Ok(out)
    }

    /// `(row, col)` of the bucket containing `position`.
    ///
    /// Positions outside the grid are clamped onto the border buckets. That
    /// never happens for the features the grid was built from.
    pub fn bucket_of(&self, position: Position) -> (usize, usize) {
        let scaled = (position - self.origin).component_div(self.bucket_size);
        let row = (scaled.rt.max(0.0) as usize).min(self.buckets.rows() - 1);
        let col = (scaled.mz.max(0.0) as usize).min(self.buckets.cols() - 1);
        (row, col)
    }

    pub fn role(&self) -> MapRole {
        self.role
    }

    /// Box around the raw feature positions.
    pub fn position_bbox(&self) -> &BoundingBox<Position> {
        &self.position_bbox
    }

    pub fn intensity_bbox(&self) -> &BoundingBox<f64> {
        &self.intensity_bbox
    }

    /// Box covering the whole grid.
    pub fn enlarged_bbox(&self) -> &BoundingBox<Position> {
        &self.enlarged_bbox
    }

    /// Lower corner of the raw feature positions.
    pub fn raw_min(&self) -> Position {
        self.raw_min
    }

    /// Lower corner of the grid.
    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn bucket_size(&self) -> Position {
        self.bucket_size
    }

    pub fn buckets(&self) -> &Matrix<Vec<usize>> {
        &self.buckets
    }

    pub fn bucket(&self, row: usize, col: usize) -> &[usize] {
        &self.buckets[(row, col)]
    }

    /// Non-empty buckets in row-major order.
    pub fn non_empty(&self) -> impl Iterator<Item = ((usize, usize), &[usize])> + '_ {
        self.buckets
            .indexed_iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(cell, bucket)| (cell, bucket.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;

    #[test]
    fn test_single_feature_gets_one_bucket() {
        let features = [Feature::new(5.0, 3.0, 10.0)];
        let fb = FeatureBuckets::compute(MapRole::Image, &features, Position::new(100.0, 100.0))
            .unwrap();
        assert_eq!(fb.buckets().size_pair(), (1, 1));
        assert_eq!(fb.bucket(0, 0), &[0]);
        // The single bucket is centered on the feature.
        assert_eq!(fb.origin(), Position::new(-45.0, -47.0));
        assert_eq!(fb.enlarged_bbox().diagonal(), Some(Position::new(100.0, 100.0)));
    }

    #[test]
    fn test_bucket_counts_follow_margin_rule() {
        // Diagonal (20, 3); 20 / 10 + 1.1 = 3.1 -> 3 rows, 3 / 1 + 1.1 = 4.1 -> 4 cols.
        let features = [
            Feature::new(0.0, 100.0, 1.0),
            Feature::new(20.0, 103.0, 2.0),
            Feature::new(10.0, 101.5, 3.0),
        ];
        let fb = FeatureBuckets::compute(MapRole::PreImage, &features, Position::new(10.0, 1.0))
            .unwrap();
        assert_eq!(fb.buckets().size_pair(), (3, 4));
        let diag = fb.enlarged_bbox().diagonal().unwrap();
        assert!((diag.rt - 30.0).abs() < 1e-9);
        assert!((diag.mz - 4.0).abs() < 1e-9);
        assert_eq!(fb.intensity_bbox().min(), Some(1.0));
        assert_eq!(fb.intensity_bbox().max(), Some(3.0));

        // Every feature lands in exactly one bucket.
        let mut seen: Vec<usize> = fb.non_empty().flat_map(|(_, b)| b.to_vec()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(fb.bucket_of(features[0].position()), (0, 0));
        assert_eq!(fb.bucket_of(features[1].position()), (2, 3));
    }

    #[test]
    fn test_bucketing_is_deterministic() {
        let features: Vec<Feature> = (0..50)
            .map(|i| Feature::new(i as f64 * 1.7, 400.0 + (i % 7) as f64 * 0.3, 1.0 + i as f64))
            .collect();
        let size = Position::new(5.0, 0.5);
        let a = FeatureBuckets::compute(MapRole::Image, &features, size).unwrap();
        let b = FeatureBuckets::compute(MapRole::Image, &features, size).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_map_is_an_error() {
        let features: Vec<Feature> = vec![];
        let res = FeatureBuckets::compute(MapRole::PreImage, &features, Position::splat(1.0));
        assert!(matches!(
            res,
            Err(GeomHashError::EmptyInput {
                map: MapRole::PreImage
            })
        ));
    }

    #[test]
    fn test_negative_intensity_is_an_error() {
        let features = [Feature::new(5.0, 3.0, 10.0), Feature::new(7.0, 3.0, -10.0)];
        let res = FeatureBuckets::compute(MapRole::Image, &features, Position::splat(100.0));
        assert!(matches!(
            res,
            Err(GeomHashError::NegativeIntensity {
                map: MapRole::Image,
                feature_index: 1,
            })
        ));
    }

    #[test]
    fn test_oversized_grid_is_an_error() {
        let features = [Feature::new(0.0, 400.0, 1.0), Feature::new(3600.0, 1500.0, 1.0)];
        let res = FeatureBuckets::compute(MapRole::PreImage, &features, Position::splat(1e-9));
        assert!(matches!(res, Err(GeomHashError::InvalidParameter { .. })));
    }

    #[test]
    fn test_non_finite_feature_is_an_error() {
        let features = [Feature::new(1.0, 1.0, 1.0), Feature::new(f64::NAN, 1.0, 1.0)];
        let res = FeatureBuckets::compute(MapRole::Image, &features, Position::splat(1.0));
        assert!(matches!(
            res,
            Err(GeomHashError::NonFiniteFeature {
                feature_index: 1,
                ..
            })
        ));
    }
}
