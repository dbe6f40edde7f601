//! Optional structured diagnostics emitted while the estimator runs.
//!
//! The estimator reports what it computes through a [`DiagnosticSink`]. All
//! methods default to no-ops, so [`NoDiagnostics`] costs nothing. The
//! [`TextDumpSink`] reproduces the classic whitespace separated dump files.

use crate::errors::GeomHashError;
use crate::feature::MapRole;
use crate::params::DebugParams;
use crate::position::Position;
use crate::translation::Translation;
use serde::Serialize;
use std::fs::File;
use std::io::{
    BufWriter,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};
use tracing::info;

/// One non-empty cell of a column's translation histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramCell {
    /// Image-bucket column the histogram was built for.
    pub column: usize,
    pub row: usize,
    pub col: usize,
    /// Translation at the cell's grid point.
    pub center: Position,
    pub quality: f64,
}

pub trait DiagnosticSink {
    /// Called once per non-empty feature bucket, with the positions it holds.
    fn feature_bucket(
        &mut self,
        _map: MapRole,
        _row: usize,
        _col: usize,
        _positions: &[Position],
    ) -> Result<(), GeomHashError> {
        Ok(())
    }

    /// Whether histogram cells should be collected at all.
    fn wants_histogram_cells(&self) -> bool {
        false
    }

    fn histogram_cell(&mut self, _cell: &HistogramCell) -> Result<(), GeomHashError> {
        Ok(())
    }

    /// The refined translation of one image-bucket column.
    fn column_result(
        &mut self,
        _column: usize,
        _translation: &Translation,
    ) -> Result<(), GeomHashError> {
        Ok(())
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn feature_bucket(
        &mut self,
        map: MapRole,
        row: usize,
        col: usize,
        positions: &[Position],
    ) -> Result<(), GeomHashError> {
        (**self).feature_bucket(map, row, col, positions)
    }

    fn wants_histogram_cells(&self) -> bool {
        (**self).wants_histogram_cells()
    }

    fn histogram_cell(&mut self, cell: &HistogramCell) -> Result<(), GeomHashError> {
        (**self).histogram_cell(cell)
    }

    fn column_result(
        &mut self,
        column: usize,
        translation: &Translation,
    ) -> Result<(), GeomHashError> {
        (**self).column_result(column, translation)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

impl DiagnosticSink for NoDiagnostics {}

/// A captured diagnostic event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DiagnosticRecord {
    FeatureBucket {
        map: MapRole,
        row: usize,
        col: usize,
        positions: Vec<Position>,
    },
    HistogramCell(HistogramCell),
    ColumnResult {
        column: usize,
        translation: Translation,
    },
}

/// Keeps every record in memory, in emission order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub records: Vec<DiagnosticRecord>,
}

impl DiagnosticSink for RecordingSink {
    fn feature_bucket(
        &mut self,
        map: MapRole,
        row: usize,
        col: usize,
        positions: &[Position],
    ) -> Result<(), GeomHashError> {
        self.records.push(DiagnosticRecord::FeatureBucket {
            map,
            row,
            col,
            positions: positions.to_vec(),
        });
        Ok(())
    }

    fn wants_histogram_cells(&self) -> bool {
        true
    }

    fn histogram_cell(&mut self, cell: &HistogramCell) -> Result<(), GeomHashError> {
        self.records.push(DiagnosticRecord::HistogramCell(*cell));
        Ok(())
    }

    fn column_result(
        &mut self,
        column: usize,
        translation: &Translation,
    ) -> Result<(), GeomHashError> {
        self.records.push(DiagnosticRecord::ColumnResult {
            column,
            translation: *translation,
        });
        Ok(())
    }
}

struct DumpFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl DumpFile {
    fn create(path: PathBuf, header: &str) -> Result<Self, GeomHashError> {
        info!("Writing diagnostics to {}", path.display());
        let file = File::create(&path).map_err(|source| GeomHashError::Io {
            path: path.clone(),
            source,
        })?;
        let mut out = Self {
            path,
            writer: BufWriter::new(file),
        };
        let name = out.path.display().to_string();
        out.write_fmt(format_args!("# {}\n# {}\n", name, header))?;
        Ok(out)
    }

    fn write_fmt(&mut self, args: std::fmt::Arguments<'_>) -> Result<(), GeomHashError> {
        self.writer
            .write_fmt(args)
            .map_err(|source| GeomHashError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn finish(mut self) -> Result<(), GeomHashError> {
        let name = self.path.display().to_string();
        self.write_fmt(format_args!("# {} EOF\n", name))?;
        self.writer.flush().map_err(|source| GeomHashError::Io {
            path: self.path,
            source,
        })
    }
}

/// Writes plain-text dumps to the paths named in [`DebugParams`].
///
/// Feature buckets go to `<dump_feature_buckets>_preimage` and
/// `<dump_feature_buckets>_image`: a `row col #bucket` line per non-empty
/// bucket followed by one `rt mz` line per feature. Histogram cells go to
/// `dump_translation_buckets` as `column rt mz quality row col #tb`, and
/// each column's refined translation as `column rt mz quality #result`.
pub struct TextDumpSink {
    feature_buckets: [Option<DumpFile>; 2],
    translation_buckets: Option<DumpFile>,
}

impl TextDumpSink {
    /// Creates (truncating) every configured dump file.
    pub fn create(debug: &DebugParams) -> Result<Self, GeomHashError> {
        let feature_file = |role: MapRole| -> Result<Option<DumpFile>, GeomHashError> {
            debug
                .dump_feature_buckets
                .as_deref()
                .map(|base| {
                    DumpFile::create(
                        suffixed(base, role.file_suffix()),
                        "Positions of features in non-empty feature buckets",
                    )
                })
                .transpose()
        };
        let feature_buckets = [feature_file(MapRole::PreImage)?, feature_file(MapRole::Image)?];
        let translation_buckets = debug
            .dump_translation_buckets
            .clone()
            .map(|path| {
                DumpFile::create(
                    path,
                    "Translation buckets: column rt mz quality row col",
                )
            })
            .transpose()?;
        Ok(Self {
            feature_buckets,
            translation_buckets,
        })
    }

    /// Writes the trailers and flushes.
    pub fn finish(self) -> Result<(), GeomHashError> {
        let Self {
            feature_buckets,
            translation_buckets,
        } = self;
        for file in feature_buckets.into_iter().flatten() {
            file.finish()?;
        }
        if let Some(file) = translation_buckets {
            file.finish()?;
        }
        Ok(())
    }
}

fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl DiagnosticSink for TextDumpSink {
    fn feature_bucket(
        &mut self,
        map: MapRole,
        row: usize,
        col: usize,
        positions: &[Position],
    ) -> Result<(), GeomHashError> {
        let Some(file) = self.feature_buckets[map.index()].as_mut() else {
            return Ok(());
        };
        writeln!(file, "{} {} #bucket", row, col)?;
        for p in positions {
            writeln!(file, "{} {}", p.rt, p.mz)?;
        }
        writeln!(file)
    }

    fn wants_histogram_cells(&self) -> bool {
        self.translation_buckets.is_some()
    }

    fn histogram_cell(&mut self, cell: &HistogramCell) -> Result<(), GeomHashError> {
        let Some(file) = self.translation_buckets.as_mut() else {
            return Ok(());
        };
        writeln!(
            file,
            "{} {} {} {} {} {} #tb",
            cell.column, cell.center.rt, cell.center.mz, cell.quality, cell.row, cell.col
        )
    }

    fn column_result(
        &mut self,
        column: usize,
        translation: &Translation,
    ) -> Result<(), GeomHashError> {
        let Some(file) = self.translation_buckets.as_mut() else {
            return Ok(());
        };
        writeln!(
            file,
            "{} {} {} {} #result",
            column, translation.position.rt, translation.position.mz, translation.quality
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixed_path() {
        let p = suffixed(Path::new("/tmp/dump.txt"), "_image");
        assert_eq!(p, PathBuf::from("/tmp/dump.txt_image"));
    }

    #[test]
    fn test_text_dump_writes_records() {
        let dir = std::env::temp_dir().join(format!("geomhash_dump_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let debug = DebugParams {
            dump_feature_buckets: Some(dir.join("fb")),
            dump_translation_buckets: Some(dir.join("tb")),
            progress: false,
        };
        let mut sink = TextDumpSink::create(&debug).unwrap();
        assert!(sink.wants_histogram_cells());
        sink.feature_bucket(MapRole::Image, 1, 2, &[Position::new(3.0, 4.0)])
            .unwrap();
        sink.histogram_cell(&HistogramCell {
            column: 0,
            row: 5,
            col: 6,
            center: Position::new(1.5, -2.0),
            quality: 0.25,
        })
        .unwrap();
        sink.column_result(0, &Translation::new(Position::new(1.0, 2.0), 0.5))
            .unwrap();
        sink.finish().unwrap();

        let image = std::fs::read_to_string(dir.join("fb_image")).unwrap();
        assert!(image.contains("1 2 #bucket\n3 4\n"));
        let preimage = std::fs::read_to_string(dir.join("fb_preimage")).unwrap();
        assert!(!preimage.contains("#bucket"));
        let tb = std::fs::read_to_string(dir.join("tb")).unwrap();
        assert!(tb.contains("0 1.5 -2 0.25 5 6 #tb"));
        assert!(tb.contains("0 1 2 0.5 #result"));
        assert!(tb.trim_end().ends_with("EOF"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
