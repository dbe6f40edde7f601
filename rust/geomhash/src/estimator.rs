use crate::aggregation::{
    TranslationSummary,
    aggregate_translations,
};
use crate::bucketing::FeatureBuckets;
use crate::diagnostics::{
    DiagnosticSink,
    HistogramCell,
    NoDiagnostics,
    TextDumpSink,
};
use crate::errors::GeomHashError;
use crate::feature::{
    Feature,
    FeatureLike,
    MapRole,
};
use crate::grid::Matrix;
use crate::mapping::{
    PositionMapping,
    apply_to_features,
};
use crate::params::{
    BucketWindow,
    EstimatorParams,
    ParamStore,
};
use crate::plotting::format_heatmap;
use crate::position::Position;
use crate::refinement::{
    peak_cell,
    refine_peak,
};
use crate::translation::Translation;
use crate::voting::{
    ColumnVoter,
    TranslationGrid,
    VoteStats,
};
use indicatif::{
    ParallelProgressIterator,
    ProgressBar,
    ProgressIterator,
    ProgressStyle,
};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::{
    Mutex,
    PoisonError,
};
use std::time::Instant;
use tracing::{
    Level,
    debug,
    info,
    instrument,
    trace,
    warn,
};

/// Everything an estimation run produces.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationEstimate {
    /// Quality-weighted mean of the column results. Zero quality means no
    /// translation could be estimated and the position is meaningless.
    pub translation: Translation,
    /// Refined translation of every image-bucket column, `1 x columns`.
    pub column_results: Matrix<Translation>,
    pub by_row: Vec<Translation>,
    pub by_column: Vec<Translation>,
    /// Mappings carrying image coordinates onto the pre-image.
    pub mapping: PositionMapping,
    pub translation_grid: TranslationGrid,
    pub vote_stats: VoteStats,
}

impl TranslationEstimate {
    fn new(
        summary: TranslationSummary,
        column_results: Matrix<Translation>,
        translation_grid: TranslationGrid,
        vote_stats: VoteStats,
    ) -> Self {
        Self {
            mapping: PositionMapping::from_translation(&summary.global),
            translation: summary.global,
            column_results,
            by_row: summary.by_row,
            by_column: summary.by_column,
            translation_grid,
            vote_stats,
        }
    }

    /// Shifts image features back onto the pre-image frame.
    pub fn apply_to_features<F: FeatureLike>(&self, features: &[F]) -> Vec<Feature> {
        apply_to_features(&self.mapping, features)
    }
}

/// Per-column work product, emitted to the sink in column order.
struct ColumnOutcome {
    translation: Translation,
    stats: VoteStats,
    cells: Vec<HistogramCell>,
}

/// Histogram of the strongest column seen so far, kept for the debug
/// heatmap. Ties go to the lowest column.
#[derive(Debug, Default)]
struct BestColumn {
    column: usize,
    quality: f64,
    histogram: Option<Matrix<f64>>,
}

impl BestColumn {
    fn offer(&mut self, column: usize, quality: f64, histogram: &Matrix<f64>) {
        let better = self.histogram.is_none()
            || quality > self.quality
            || (quality == self.quality && column < self.column);
        if better {
            self.column = column;
            self.quality = quality;
            self.histogram = Some(histogram.clone());
        }
    }
}

/// Estimates the translation between two feature maps by geometric
/// hashing.
///
/// Both maps are bucketed on a regular grid. For every column of image
/// buckets, each feature pair with a pre-image feature in the neighbouring
/// buckets votes for its translation in a histogram, weighted by how
/// similar the two intensities are. The histogram peak, averaged over a
/// small window, is that column's translation; the final translation is
/// the quality-weighted mean over all columns.
#[derive(Debug, Clone)]
pub struct TranslationEstimator {
    params: EstimatorParams,
}

impl TranslationEstimator {
    pub fn new(params: EstimatorParams) -> Result<Self, GeomHashError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Reads every option up front, failing on the first missing one.
    #[instrument(skip_all, level = "debug")]
    pub fn from_params(params: &ParamStore) -> Result<Self, GeomHashError> {
        Self::new(EstimatorParams::from_params(params)?)
    }

    pub fn params(&self) -> &EstimatorParams {
        &self.params
    }

    /// Runs the estimation, writing the dump files configured in the
    /// debug parameters.
    ///
    /// Dump files are only created once both maps have been bucketed and
    /// the translation histogram has been sized.
    pub fn run<F: FeatureLike + Sync>(
        &self,
        preimage: &[F],
        image: &[F],
    ) -> Result<TranslationEstimate, GeomHashError> {
        let (preimage_buckets, image_buckets) = self.compute_feature_buckets(preimage, image)?;
        let grid = self.translation_grid(&preimage_buckets, &image_buckets)?;
        if !self.params.debug.writes_dumps() {
            return self.estimate_from_buckets(
                preimage,
                image,
                &preimage_buckets,
                &image_buckets,
                grid,
                &mut NoDiagnostics,
            );
        }

        let mut sink = TextDumpSink::create(&self.params.debug)?;
        let out = self.estimate_from_buckets(
            preimage,
            image,
            &preimage_buckets,
            &image_buckets,
            grid,
            &mut sink,
        )?;
        sink.finish()?;
        Ok(out)
    }

    /// Runs the estimation, reporting diagnostics to `sink` instead of the
    /// configured dump files.
    pub fn run_with_sink<F: FeatureLike + Sync, S: DiagnosticSink>(
        &self,
        preimage: &[F],
        image: &[F],
        sink: &mut S,
    ) -> Result<TranslationEstimate, GeomHashError> {
        let (preimage_buckets, image_buckets) = self.compute_feature_buckets(preimage, image)?;
        let grid = self.translation_grid(&preimage_buckets, &image_buckets)?;
        self.estimate_from_buckets(preimage, image, &preimage_buckets, &image_buckets, grid, sink)
    }

    fn translation_grid(
        &self,
        preimage_buckets: &FeatureBuckets,
        image_buckets: &FeatureBuckets,
    ) -> Result<TranslationGrid, GeomHashError> {
        TranslationGrid::new(
            preimage_buckets,
            image_buckets,
            self.params.feature_bucket_size,
            self.params.feature_bucket_window,
            self.params.translation_bucket_size,
        )
    }

    fn estimate_from_buckets<F: FeatureLike + Sync, S: DiagnosticSink>(
        &self,
        preimage: &[F],
        image: &[F],
        preimage_buckets: &FeatureBuckets,
        image_buckets: &FeatureBuckets,
        grid: TranslationGrid,
        sink: &mut S,
    ) -> Result<TranslationEstimate, GeomHashError> {
        let start = Instant::now();
        emit_feature_buckets(preimage_buckets, preimage, sink)?;
        emit_feature_buckets(image_buckets, image, sink)?;

        let voter = ColumnVoter::new(
            preimage,
            image,
            preimage_buckets,
            image_buckets,
            &grid,
            self.params.feature_bucket_window,
        );
        let (column_results, vote_stats) = self.compute_translation_buckets(&voter, &grid, sink)?;
        let summary = compute_final_translation(&column_results);

        info!(
            "Estimated translation {} with quality {:.4} from {} feature pairs in {:?}",
            summary.global.position,
            summary.global.quality,
            vote_stats.pairs,
            start.elapsed()
        );
        Ok(TranslationEstimate::new(
            summary,
            column_results,
            grid,
            vote_stats,
        ))
    }

    #[instrument(skip_all, fields(preimage = preimage.len(), image = image.len()))]
    fn compute_feature_buckets<F: FeatureLike>(
        &self,
        preimage: &[F],
        image: &[F],
    ) -> Result<(FeatureBuckets, FeatureBuckets), GeomHashError> {
        let size = self.params.feature_bucket_size;
        let preimage_buckets = FeatureBuckets::compute(MapRole::PreImage, preimage, size)?;
        let image_buckets = FeatureBuckets::compute(MapRole::Image, image, size)?;
        debug!(
            "Feature buckets: pre-image {:?}, image {:?}",
            preimage_buckets.buckets().size_pair(),
            image_buckets.buckets().size_pair()
        );
        Ok((preimage_buckets, image_buckets))
    }

    /// Builds and refines one histogram per image-bucket column.
    #[instrument(skip_all, fields(columns = voter.num_columns(), parallel = self.params.parallel_columns))]
    fn compute_translation_buckets<F: FeatureLike + Sync, S: DiagnosticSink>(
        &self,
        voter: &ColumnVoter<'_, F>,
        grid: &TranslationGrid,
        sink: &mut S,
    ) -> Result<(Matrix<Translation>, VoteStats), GeomHashError> {
        let num_columns = voter.num_columns();
        let window = self.params.translation_bucket_window;
        let collect_cells = sink.wants_histogram_cells();
        let (hist_rows, hist_cols) = grid.shape();
        debug!(
            "Translation histogram: {}x{} cells, bucket size {}",
            hist_rows,
            hist_cols,
            grid.bucket_size()
        );

        let best = tracing::enabled!(Level::DEBUG).then(|| Mutex::new(BestColumn::default()));

        let bar = self.progress_bar(num_columns);
        let outcomes: Vec<ColumnOutcome> = if self.params.parallel_columns {
            (0..num_columns)
                .into_par_iter()
                .progress_with(bar.clone())
                .map_init(
                    || grid.new_histogram(),
                    |histogram, column| {
                        process_column(
                            voter,
                            grid,
                            window,
                            column,
                            histogram,
                            collect_cells,
                            best.as_ref(),
                        )
                    },
                )
                .collect()
        } else {
            let mut histogram = grid.new_histogram();
            (0..num_columns)
                .progress_with(bar.clone())
                .map(|column| {
                    process_column(
                        voter,
                        grid,
                        window,
                        column,
                        &mut histogram,
                        collect_cells,
                        best.as_ref(),
                    )
                })
                .collect()
        };
        bar.finish_and_clear();

        let mut results = Matrix::from_elem(1, num_columns, Translation::default());
        let mut stats = VoteStats::default();
        for (column, outcome) in outcomes.into_iter().enumerate() {
            for cell in &outcome.cells {
                sink.histogram_cell(cell)?;
            }
            sink.column_result(column, &outcome.translation)?;
            results[(0, column)] = outcome.translation;
            stats += outcome.stats;
        }

        if stats.dropped > 0 {
            debug!(
                "{} of {} votes fell outside the translation histogram",
                stats.dropped, stats.pairs
            );
        }
        if let Some(best) = best {
            log_best_column(best.into_inner().unwrap_or_else(PoisonError::into_inner));
        }
        Ok((results, stats))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.params.debug.progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} columns ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        ProgressBar::new(len as u64).with_style(style)
    }
}

fn process_column<F: FeatureLike>(
    voter: &ColumnVoter<'_, F>,
    grid: &TranslationGrid,
    window: BucketWindow,
    column: usize,
    histogram: &mut Matrix<f64>,
    collect_cells: bool,
    best: Option<&Mutex<BestColumn>>,
) -> ColumnOutcome {
    let stats = voter.accumulate_column(column, histogram);
    let cells = if collect_cells {
        histogram_cells(grid, column, histogram)
    } else {
        Vec::new()
    };
    let translation = refine_peak(histogram, grid, window);
    if let Some(best) = best {
        best.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .offer(column, translation.quality, histogram);
    }
    trace!(
        "Column {}: {} pairs, translation {} quality {}",
        column, stats.pairs, translation.position, translation.quality
    );
    ColumnOutcome {
        translation,
        stats,
        cells,
    }
}

fn histogram_cells(grid: &TranslationGrid, column: usize, histogram: &Matrix<f64>) -> Vec<HistogramCell> {
    histogram
        .indexed_iter()
        .filter(|(_, &quality)| quality != 0.0)
        .map(|((row, col), &quality)| HistogramCell {
            column,
            row,
            col,
            center: grid.cell_position(row, col),
            quality,
        })
        .collect()
}

fn emit_feature_buckets<F: FeatureLike, S: DiagnosticSink>(
    buckets: &FeatureBuckets,
    features: &[F],
    sink: &mut S,
) -> Result<(), GeomHashError> {
    let mut positions: Vec<Position> = Vec::new();
    for ((row, col), bucket) in buckets.non_empty() {
        positions.clear();
        positions.extend(bucket.iter().map(|&i| features[i].position()));
        sink.feature_bucket(buckets.role(), row, col, &positions)?;
    }
    Ok(())
}

/// Logs the histogram of the strongest column as a heatmap.
fn log_best_column(best: BestColumn) {
    let Some(histogram) = best.histogram else {
        return;
    };
    debug!(
        "Translation histogram of column {}:\n{}",
        best.column,
        format_heatmap(&histogram, peak_cell(&histogram))
    );
}

#[instrument(skip_all)]
fn compute_final_translation(results: &Matrix<Translation>) -> TranslationSummary {
    let summary = aggregate_translations(results);
    if summary.global.is_degenerate() {
        warn!(
            "No feature pair voted with nonzero quality over {} columns, translation is undefined",
            results.cols()
        );
    }
    for (row, t) in summary.by_row.iter().enumerate() {
        debug!("Row {} mean: {} quality {}", row, t.position, t.quality);
    }
    for (column, t) in summary.by_column.iter().enumerate() {
        trace!("Column {} mean: {} quality {}", column, t.position, t.quality);
    }
    summary
}
