use crate::bounding_box::BoundingBox;
use crate::bucketing::FeatureBuckets;
use crate::errors::GeomHashError;
use crate::feature::FeatureLike;
use crate::grid::{
    Matrix,
    checked_grid_shape,
};
use crate::params::BucketWindow;
use crate::position::{
    Dimension,
    Position,
};
use crate::translation::Translation;
use serde::Serialize;
use std::ops::AddAssign;
use tracing::debug;

/// Geometry of the translation histogram.
///
/// Translations are expected around `image.min - preimage.min`, within the
/// reach of the feature bucket window. Histogram cells are grid points
/// `origin + bucket_size * (row, col)`; there is one more point than buckets
/// on each axis so a bilinear vote always has its upper neighbours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationGrid {
    bounding_box: BoundingBox<Position>,
    enlarged_bounding_box: BoundingBox<Position>,
    origin: Position,
    bucket_size: Position,
    num_buckets: (usize, usize),
}

impl TranslationGrid {
    /// Sizes the histogram for the translations reachable through
    /// `feature_bucket_window`.
    ///
    /// Fails with [`GeomHashError::InvalidParameter`] when the window and
    /// bucket sizes need more cells than [`crate::grid::MAX_GRID_CELLS`].
    pub fn new(
        preimage: &FeatureBuckets,
        image: &FeatureBuckets,
        feature_bucket_size: Position,
        feature_bucket_window: BucketWindow,
        requested_bucket_size: Position,
    ) -> Result<Self, GeomHashError> {
        let center = image.raw_min() - preimage.raw_min();
        let window_diff = Position::new(
            feature_bucket_size.rt * (2.0 * feature_bucket_window.rt as f64 + 1.0),
            feature_bucket_size.mz * (2.0 * feature_bucket_window.mz as f64 + 1.0),
        );
        let bounding_box = BoundingBox::from_corners(center - window_diff, center + window_diff);

        let half_bucket = requested_bucket_size / 2.0;
        let lower = center - window_diff - half_bucket;
        let upper = center + window_diff + half_bucket;
        let enlarged_bounding_box = BoundingBox::from_corners(lower, upper);

        // Shrink the bucket count so the corrected size tiles the box exactly.
        let diagonal = upper - lower;
        let num = diagonal
            .component_div(requested_bucket_size)
            .map(|v| v.floor().max(1.0));
        let num_buckets = checked_grid_shape("translation_map", (num.rt, num.mz), 1)?;
        let bucket_size = diagonal.component_div(num);
        debug!(
            "Translation box: {} - {}, bucket size {} -> {}, buckets {}x{}",
            lower, upper, requested_bucket_size, bucket_size, num_buckets.0, num_buckets.1
        );

        Ok(Self {
            bounding_box,
            enlarged_bounding_box,
            origin: lower,
            bucket_size,
            num_buckets,
        })
    }

    /// Box of plausible translations, before the half-bucket margin.
    pub fn bounding_box(&self) -> &BoundingBox<Position> {
        &self.bounding_box
    }

    pub fn enlarged_bounding_box(&self) -> &BoundingBox<Position> {
        &self.enlarged_bounding_box
    }

    /// Translation at histogram cell `(0, 0)`.
    pub fn origin(&self) -> Position {
        self.origin
    }

    /// Corrected bucket size.
    pub fn bucket_size(&self) -> Position {
        self.bucket_size
    }

    pub fn num_buckets(&self) -> (usize, usize) {
        self.num_buckets
    }

    /// Histogram dimensions, `num_buckets + 1` on each axis.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_buckets.0 + 1, self.num_buckets.1 + 1)
    }

    pub fn new_histogram(&self) -> Matrix<f64> {
        let (rows, cols) = self.shape();
        Matrix::from_elem(rows, cols, 0.0)
    }

    /// Translation represented by histogram cell `(row, col)`.
    pub fn cell_position(&self, row: usize, col: usize) -> Position {
        self.origin + self
            .bucket_size
            .component_mul(Position::new(row as f64, col as f64))
    }

    /// Distributes the quality of `translation` over the four surrounding
    /// histogram cells with bilinear weights.
    ///
    /// Returns `false`, leaving the histogram untouched, when the translation
    /// falls outside the histogram.
    pub fn splat(&self, histogram: &mut Matrix<f64>, translation: &Translation) -> bool {
        let scaled = (translation.position - self.origin).component_div(self.bucket_size);
        let floor = scaled.map(f64::floor);
        // Also rejects NaN.
        if !(floor.rt >= 0.0 && floor.mz >= 0.0) {
            return false;
        }
        let fraction = scaled - floor;
        let (row, col) = (floor.rt as usize, floor.mz as usize);
        let (rows, cols) = histogram.size_pair();
        let last_row = if fraction.rt > 0.0 { row + 1 } else { row };
        let last_col = if fraction.mz > 0.0 { col + 1 } else { col };
        if last_row >= rows || last_col >= cols {
            return false;
        }

        let quality = translation.quality;
        if quality == 0.0 {
            return true;
        }
        let weights = bilinear_weights(fraction);
        for ((dr, dc), weight) in [(0, 0), (0, 1), (1, 0), (1, 1)].into_iter().zip(weights) {
            if weight != 0.0 {
                histogram[(row + dr, col + dc)] += quality * weight;
            }
        }
        true
    }
}

/// Weights of the `(0,0)`, `(0,1)`, `(1,0)` and `(1,1)` neighbours for a
/// point at `fraction` inside a cell. They always sum to one.
pub fn bilinear_weights(fraction: Position) -> [f64; 4] {
    let Position { rt: fr, mz: fc } = fraction;
    [
        (1.0 - fr) * (1.0 - fc),
        (1.0 - fr) * fc,
        fr * (1.0 - fc),
        fr * fc,
    ]
}

/// Counters for one round of voting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteStats {
    /// Feature pairs enumerated.
    pub pairs: usize,
    /// Pairs whose translation fell outside the histogram.
    pub dropped: usize,
}

impl AddAssign for VoteStats {
    fn add_assign(&mut self, rhs: VoteStats) {
        self.pairs += rhs.pairs;
        self.dropped += rhs.dropped;
    }
}

/// Enumerates candidate feature pairs and votes their translations into a
/// histogram, one image-bucket column at a time.
pub struct ColumnVoter<'a, F> {
    preimage_features: &'a [F],
    image_features: &'a [F],
    preimage: &'a FeatureBuckets,
    image: &'a FeatureBuckets,
    grid: &'a TranslationGrid,
    window: BucketWindow,
}

impl<'a, F: FeatureLike> ColumnVoter<'a, F> {
    pub fn new(
        preimage_features: &'a [F],
        image_features: &'a [F],
        preimage: &'a FeatureBuckets,
        image: &'a FeatureBuckets,
        grid: &'a TranslationGrid,
        window: BucketWindow,
    ) -> Self {
        Self {
            preimage_features,
            image_features,
            preimage,
            image,
            grid,
            window,
        }
    }

    pub fn num_columns(&self) -> usize {
        self.image.buckets().cols()
    }

    /// Clears `histogram` and fills it with the votes of every pair between
    /// an image bucket in `column` and the pre-image buckets in its window.
    pub fn accumulate_column(&self, column: usize, histogram: &mut Matrix<f64>) -> VoteStats {
        histogram.fill(0.0);
        let mut stats = VoteStats::default();
        let image_buckets = self.image.buckets();
        let preimage_buckets = self.preimage.buckets();

        for row in 0..image_buckets.rows() {
            let image_bucket = &image_buckets[(row, column)];
            if image_bucket.is_empty() {
                continue;
            }
            for k in self
                .window
                .clamped_range(Dimension::Rt, row, preimage_buckets.rows())
            {
                for l in self
                    .window
                    .clamped_range(Dimension::Mz, column, preimage_buckets.cols())
                {
                    for &fb0 in &preimage_buckets[(k, l)] {
                        let left = &self.preimage_features[fb0];
                        for &fb1 in image_bucket {
                            let translation =
                                Translation::between(left, &self.image_features[fb1]);
                            stats.pairs += 1;
                            if !self.grid.splat(histogram, &translation) {
                                stats.dropped += 1;
                            }
                        }
                    }
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{
        Feature,
        MapRole,
    };

    fn grid_for(preimage: &[Feature], image: &[Feature]) -> (FeatureBuckets, FeatureBuckets, TranslationGrid) {
        let fbs = Position::new(10.0, 10.0);
        let pre = FeatureBuckets::compute(MapRole::PreImage, preimage, fbs).unwrap();
        let img = FeatureBuckets::compute(MapRole::Image, image, fbs).unwrap();
        let grid =
            TranslationGrid::new(&pre, &img, fbs, BucketWindow::new(1, 1), Position::new(1.0, 1.0))
                .unwrap();
        (pre, img, grid)
    }

    #[test]
    fn test_bilinear_weights_sum_to_one() {
        for (fr, fc) in [(0.0, 0.0), (0.25, 0.75), (0.5, 0.5), (0.999, 0.001), (0.3, 0.0)] {
            let w = bilinear_weights(Position::new(fr, fc));
            let total: f64 = w.iter().sum();
            assert!((total - 1.0).abs() < 1e-12, "weights {:?} sum to {}", w, total);
            assert!(w.iter().all(|&x| x >= 0.0));
        }
    }

    #[test]
    fn test_grid_geometry() {
        let pre = [Feature::new(0.0, 0.0, 1.0)];
        let img = [Feature::new(5.0, 3.0, 1.0)];
        let (_, _, grid) = grid_for(&pre, &img);
        // window_diff = 10 * 3 = 30, half bucket 0.5 -> box is 61 wide.
        assert_eq!(grid.origin(), Position::new(5.0 - 30.5, 3.0 - 30.5));
        assert_eq!(grid.num_buckets(), (61, 61));
        assert_eq!(grid.shape(), (62, 62));
        assert!((grid.bucket_size().rt - 1.0).abs() < 1e-12);
        assert_eq!(grid.bounding_box().min(), Some(Position::new(-25.0, -27.0)));
        // The corrected size tiles the enlarged box exactly.
        let last = grid.cell_position(61, 61);
        assert!((last.rt - 35.5).abs() < 1e-9);
        assert!((last.mz - 33.5).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_size_is_corrected_to_tile_the_box() {
        let pre = [Feature::new(0.0, 0.0, 1.0)];
        let img = [Feature::new(0.0, 0.0, 1.0)];
        let fbs = Position::new(10.0, 10.0);
        let pre = FeatureBuckets::compute(MapRole::PreImage, &pre, fbs).unwrap();
        let img = FeatureBuckets::compute(MapRole::Image, &img, fbs).unwrap();
        let grid =
            TranslationGrid::new(&pre, &img, fbs, BucketWindow::new(0, 0), Position::new(7.0, 4.0))
                .unwrap();
        // Diagonal is 20 + 7 = 27 and 20 + 4 = 24: 3 and 6 buckets.
        assert_eq!(grid.num_buckets(), (3, 6));
        assert!((grid.bucket_size().rt - 9.0).abs() < 1e-12);
        assert!((grid.bucket_size().mz - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_oversized_histogram_is_an_error() {
        let fbs = Position::new(10.0, 10.0);
        let pre = FeatureBuckets::compute(MapRole::PreImage, &[Feature::new(0.0, 0.0, 1.0)], fbs)
            .unwrap();
        let img = FeatureBuckets::compute(MapRole::Image, &[Feature::new(5.0, 3.0, 1.0)], fbs)
            .unwrap();
        let huge_window = BucketWindow::new(i64::MAX as usize, 1);
        let res = TranslationGrid::new(&pre, &img, fbs, huge_window, Position::new(1.0, 1.0));
        assert!(matches!(res, Err(GeomHashError::InvalidParameter { .. })));
        let tiny_buckets = Position::new(1e-9, 1e-9);
        let res = TranslationGrid::new(&pre, &img, fbs, BucketWindow::new(1, 1), tiny_buckets);
        assert!(matches!(res, Err(GeomHashError::InvalidParameter { .. })));
    }

    #[test]
    fn test_splat_conserves_quality() {
        let pre = [Feature::new(0.0, 0.0, 1.0)];
        let img = [Feature::new(5.0, 3.0, 1.0)];
        let (_, _, grid) = grid_for(&pre, &img);
        let mut hist = grid.new_histogram();
        let t = Translation::new(Position::new(5.3, 2.85), 0.8);
        assert!(grid.splat(&mut hist, &t));
        assert!((hist.sum() - 0.8).abs() < 1e-12);
        let touched = hist.iter().filter(|&&q| q > 0.0).count();
        assert_eq!(touched, 4);
    }

    #[test]
    fn test_splat_on_grid_point_hits_one_cell() {
        let pre = [Feature::new(0.0, 0.0, 1.0)];
        let img = [Feature::new(5.0, 3.0, 1.0)];
        let (_, _, grid) = grid_for(&pre, &img);
        let mut hist = grid.new_histogram();
        let target = grid.cell_position(30, 30);
        assert!(grid.splat(&mut hist, &Translation::new(target, 1.0)));
        assert!((hist[(30, 30)] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_splat_rejects_outside_votes() {
        let pre = [Feature::new(0.0, 0.0, 1.0)];
        let img = [Feature::new(5.0, 3.0, 1.0)];
        let (_, _, grid) = grid_for(&pre, &img);
        let mut hist = grid.new_histogram();
        assert!(!grid.splat(&mut hist, &Translation::new(Position::new(-100.0, 0.0), 1.0)));
        assert!(!grid.splat(&mut hist, &Translation::new(Position::new(0.0, 1000.0), 1.0)));
        assert!(!grid.splat(&mut hist, &Translation::new(Position::new(f64::NAN, 0.0), 1.0)));
        assert_eq!(hist.sum(), 0.0);
    }

    #[test]
    fn test_column_accumulation_counts_pairs() {
        let pre = [Feature::new(0.0, 0.0, 10.0), Feature::new(1.0, 1.0, 5.0)];
        let img = [Feature::new(5.0, 3.0, 10.0)];
        let (pre_b, img_b, grid) = grid_for(&pre, &img);
        let voter = ColumnVoter::new(&pre, &img, &pre_b, &img_b, &grid, BucketWindow::new(1, 1));
        assert_eq!(voter.num_columns(), 1);
        let mut hist = grid.new_histogram();
        hist.fill(3.0);
        let stats = voter.accumulate_column(0, &mut hist);
        assert_eq!(stats, VoteStats { pairs: 2, dropped: 0 });
        // Previous contents are cleared; qualities 1.0 and 0.5 are conserved.
        assert!((hist.sum() - 1.5).abs() < 1e-9);
    }
}
