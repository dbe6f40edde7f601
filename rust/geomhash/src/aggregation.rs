use crate::grid::Matrix;
use crate::translation::Translation;
use serde::Serialize;

/// Global and marginal quality-weighted means of a translation matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationSummary {
    /// Weighted mean over every cell, quality summed.
    pub global: Translation,
    /// One weighted mean per matrix row.
    pub by_row: Vec<Translation>,
    /// One weighted mean per matrix column.
    pub by_column: Vec<Translation>,
}

/// Reduces per-cell translations to weighted means.
///
/// Every mean divides only when its summed quality is nonzero, so an
/// all-zero-quality group yields the zero position with zero quality.
pub fn aggregate_translations(results: &Matrix<Translation>) -> TranslationSummary {
    let mut global = Translation::default();
    let mut by_row = vec![Translation::default(); results.rows()];
    let mut by_column = vec![Translation::default(); results.cols()];

    for ((row, col), t) in results.indexed_iter() {
        global.accumulate_weighted(t);
        by_row[row].accumulate_weighted(t);
        by_column[col].accumulate_weighted(t);
    }

    TranslationSummary {
        global: global.normalized(),
        by_row: by_row.into_iter().map(Translation::normalized).collect(),
        by_column: by_column.into_iter().map(Translation::normalized).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    fn t(rt: f64, mz: f64, q: f64) -> Translation {
        Translation::new(Position::new(rt, mz), q)
    }

    #[test]
    fn test_global_is_quality_weighted() {
        let mut m = Matrix::new(1, 3);
        m[(0, 0)] = t(1.0, 10.0, 1.0);
        m[(0, 1)] = t(3.0, 20.0, 3.0);
        m[(0, 2)] = t(100.0, 100.0, 0.0);
        let s = aggregate_translations(&m);
        assert!((s.global.quality - 4.0).abs() < 1e-12);
        assert!((s.global.position.rt - 2.5).abs() < 1e-12);
        assert!((s.global.position.mz - 17.5).abs() < 1e-12);
        assert_eq!(s.by_row.len(), 1);
        assert_eq!(s.by_row[0], s.global);
    }

    #[test]
    fn test_marginals_guard_zero_quality() {
        let mut m = Matrix::new(2, 2);
        m[(0, 0)] = t(2.0, 4.0, 2.0);
        m[(0, 1)] = t(7.0, 7.0, 0.0);
        m[(1, 1)] = t(9.0, 9.0, 0.0);
        let s = aggregate_translations(&m);

        assert_eq!(s.by_row[0], t(2.0, 4.0, 2.0));
        assert_eq!(s.by_row[1], Translation::default());
        assert_eq!(s.by_column[0], t(2.0, 4.0, 2.0));
        // Nonzero positions with zero weight contribute nothing.
        assert_eq!(s.by_column[1], Translation::default());
    }

    #[test]
    fn test_all_zero_quality_gives_zero_position() {
        let mut m = Matrix::new(1, 2);
        m[(0, 0)] = t(5.0, 5.0, 0.0);
        m[(0, 1)] = t(-5.0, 1.0, 0.0);
        let s = aggregate_translations(&m);
        assert!(s.global.is_degenerate());
        assert_eq!(s.global.position, Position::ZERO);
    }
}
