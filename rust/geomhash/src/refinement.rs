use crate::grid::Matrix;
use crate::params::BucketWindow;
use crate::position::Dimension;
use crate::translation::Translation;
use crate::voting::TranslationGrid;

/// Locates the histogram maximum and refines it to the quality-weighted
/// mean of the cells within `window` of it.
///
/// Ties go to the first maximum in row-major order. The result's quality is
/// the summed quality of the window. An all-zero histogram yields a zero
/// translation with zero quality.
pub fn refine_peak(
    histogram: &Matrix<f64>,
    grid: &TranslationGrid,
    window: BucketWindow,
) -> Translation {
    let Some(flat) = histogram.argmax() else {
        return Translation::default();
    };
    let (peak_row, peak_col) = histogram.index_pair(flat);
    let (rows, cols) = histogram.size_pair();

    let mut acc = Translation::default();
    for row in window.clamped_range(Dimension::Rt, peak_row, rows) {
        for col in window.clamped_range(Dimension::Mz, peak_col, cols) {
            let quality = histogram[(row, col)];
            acc.accumulate_weighted(&Translation::new(grid.cell_position(row, col), quality));
        }
    }
    acc.normalized()
}

/// Histogram cell holding the peak, if any.
pub fn peak_cell(histogram: &Matrix<f64>) -> Option<(usize, usize)> {
    histogram.argmax().map(|flat| histogram.index_pair(flat))
}
