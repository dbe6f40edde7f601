// ANSI color codes
const COLOR_GRAY: &str = "\x1b[90m";
const COLOR_RED: &str = "\x1b[91m";
const COLOR_RESET: &str = "\x1b[0m";

use crate::grid::Matrix;

/// Formats a translation histogram as a terminal heatmap, RT down and MZ
/// across, downscaled to fit 60x30 characters.
///
/// The block containing `peak` is drawn in red.
pub fn format_heatmap(histogram: &Matrix<f64>, peak: Option<(usize, usize)>) -> String {
    format_heatmap_sized(histogram, peak, (60, 30))
}

/// Same as [`format_heatmap`], fitting within `(max_cols, max_rows)`.
/// Each axis is downscaled by the smallest power of 2 that fits.
pub fn format_heatmap_sized(
    histogram: &Matrix<f64>,
    peak: Option<(usize, usize)>,
    max_sizes: (usize, usize),
) -> String {
    let col_scale = calculate_scale_factor(histogram.cols(), max_sizes.0);
    let row_scale = calculate_scale_factor(histogram.rows(), max_sizes.1);
    format_heatmap_with_scale(histogram, peak, col_scale, row_scale)
}

fn calculate_scale_factor(bins: usize, max_size: usize) -> usize {
    let mut scale = 1;
    while bins / scale > max_size.max(1) {
        scale *= 2;
    }
    scale
}

/// Max-pools `col_scale x row_scale` blocks into one character each.
pub fn format_heatmap_with_scale(
    histogram: &Matrix<f64>,
    peak: Option<(usize, usize)>,
    col_scale: usize,
    row_scale: usize,
) -> String {
    let mut output = String::new();
    let (rows, cols) = histogram.size_pair();

    let max_quality = histogram
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    let total_quality = histogram.sum();

    let display_cols = cols.div_ceil(col_scale);
    let display_rows = rows.div_ceil(row_scale);
    let peak_block = peak.map(|(r, c)| (r / row_scale, c / col_scale));

    output.push('╔');
    output.push_str(&"═".repeat(display_cols));
    output.push_str("╗\n");

    for display_r in 0..display_rows {
        output.push('║');
        for display_c in 0..display_cols {
            let mut block_max = 0.0_f64;
            for r in (display_r * row_scale)..((display_r + 1) * row_scale).min(rows) {
                for c in (display_c * col_scale)..((display_c + 1) * col_scale).min(cols) {
                    let v = histogram[(r, c)];
                    if v > block_max {
                        block_max = v;
                    }
                }
            }

            let intensity = if max_quality > 0.0 {
                block_max / max_quality
            } else {
                0.0
            };
            let block = get_block_char(intensity);
            let color = if peak_block == Some((display_r, display_c)) {
                COLOR_RED
            } else {
                COLOR_GRAY
            };
            output.push_str(&format!("{}{}{}", color, block, COLOR_RESET));
        }
        output.push_str("║\n");
    }

    output.push('╚');
    output.push_str(&"═".repeat(display_cols));
    output.push_str("╝\n");

    let scale_info = if col_scale > 1 || row_scale > 1 {
        format!(" (Scale: {}x × {}y)", col_scale, row_scale)
    } else {
        String::new()
    };
    output.push_str(&format!(
        "\n  Legend: {}█{} = peak, Max: {:.3}, Total: {:.3}, Size: {}×{}{}\n",
        COLOR_RED, COLOR_RESET, max_quality, total_quality, rows, cols, scale_info
    ));

    output
}

/// Maps intensity (0.0 to 1.0) to Unicode block characters
fn get_block_char(intensity: f64) -> &'static str {
    match intensity {
        i if i >= 0.875 => "█",
        i if i >= 0.625 => "▓",
        i if i >= 0.375 => "▒",
        i if i >= 0.125 => "░",
        i if i > 0.0 => "·",
        _ => " ",
    }
}
