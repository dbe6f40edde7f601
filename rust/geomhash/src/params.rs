use crate::errors::GeomHashError;
use crate::position::{
    Dimension,
    Position,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use std::ops::Index;
use std::path::PathBuf;
use tracing::debug;

pub const FEATURE_BUCKET_SIZE: &str = "feature_map:bucket_size:";
pub const TRANSLATION_BUCKET_SIZE: &str = "translation_map:bucket_size:";
pub const FEATURE_BUCKET_WINDOW: &str = "translation_map:feature_bucket_window:";
pub const TRANSLATION_BUCKET_WINDOW: &str = "translation_map:translation_bucket_window:";
pub const DUMP_FEATURE_BUCKETS: &str = "debug:dump_feature_buckets";
pub const DUMP_TRANSLATION_BUCKETS: &str = "debug:dump_translation_buckets";
pub const SHOW_PROGRESS: &str = "debug:progress";
pub const PARALLEL_COLUMNS: &str = "parallel:columns";

/// A single untyped parameter value, as found in a parameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Flat `key -> value` parameter bundle.
///
/// Keys follow the `section:name:AXIS` convention, e.g.
/// `feature_map:bucket_size:RT`. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamStore {
    values: BTreeMap<String, ParamValue>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.values.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    fn require(&self, key: &str) -> Result<&ParamValue, GeomHashError> {
        self.get(key).ok_or_else(|| GeomHashError::missing(key))
    }

    pub fn require_f64(&self, key: &str) -> Result<f64, GeomHashError> {
        match self.require(key)? {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(GeomHashError::invalid(
                key,
                format!("expected a number, got {:?}", other),
            )),
        }
    }

    pub fn require_usize(&self, key: &str) -> Result<usize, GeomHashError> {
        match self.require(key)? {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            // Integral floats such as `2.0` are accepted.
            ParamValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Ok(*v as usize),
            other => Err(GeomHashError::invalid(
                key,
                format!("expected a non-negative integer, got {:?}", other),
            )),
        }
    }

    pub fn optional_path(&self, key: &str) -> Result<Option<PathBuf>, GeomHashError> {
        match self.get(key) {
            None => Ok(None),
            Some(ParamValue::Text(v)) if v.is_empty() => Ok(None),
            Some(ParamValue::Text(v)) => Ok(Some(PathBuf::from(v))),
            Some(other) => Err(GeomHashError::invalid(
                key,
                format!("expected a file path, got {:?}", other),
            )),
        }
    }

    pub fn optional_bool(&self, key: &str) -> Result<bool, GeomHashError> {
        match self.get(key) {
            None => Ok(false),
            Some(ParamValue::Bool(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v != 0),
            Some(other) => Err(GeomHashError::invalid(
                key,
                format!("expected a boolean, got {:?}", other),
            )),
        }
    }

    fn require_position(&self, prefix: &str) -> Result<Position, GeomHashError> {
        let mut out = Position::ZERO;
        for dim in Dimension::ALL {
            let key = format!("{}{}", prefix, dim.short_name());
            out[dim] = self.require_f64(&key)?;
            debug!("{}: {}", key, out[dim]);
        }
        Ok(out)
    }

    fn require_window(&self, prefix: &str) -> Result<BucketWindow, GeomHashError> {
        let rt_key = format!("{}{}", prefix, Dimension::Rt.short_name());
        let mz_key = format!("{}{}", prefix, Dimension::Mz.short_name());
        let window = BucketWindow {
            rt: self.require_usize(&rt_key)?,
            mz: self.require_usize(&mz_key)?,
        };
        debug!("{}: {:?}", prefix, window);
        Ok(window)
    }
}

/// Half-width, in buckets, of a neighbourhood on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BucketWindow {
    pub rt: usize,
    pub mz: usize,
}

impl BucketWindow {
    pub fn new(rt: usize, mz: usize) -> Self {
        Self { rt, mz }
    }

    /// Inclusive index range `center ± half_width`, clamped to `0..len`.
    pub fn clamped_range(
        &self,
        dim: Dimension,
        center: usize,
        len: usize,
    ) -> std::ops::RangeInclusive<usize> {
        let half_width = self[dim];
        let start = center.saturating_sub(half_width);
        let end = center.saturating_add(half_width).min(len.saturating_sub(1));
        start..=end
    }
}

impl Index<Dimension> for BucketWindow {
    type Output = usize;

    fn index(&self, dim: Dimension) -> &usize {
        match dim {
            Dimension::Rt => &self.rt,
            Dimension::Mz => &self.mz,
        }
    }
}

/// Optional diagnostics switches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DebugParams {
    /// Base path for the feature-bucket dumps, one file per map.
    #[serde(default)]
    pub dump_feature_buckets: Option<PathBuf>,
    #[serde(default)]
    pub dump_translation_buckets: Option<PathBuf>,
    #[serde(default)]
    pub progress: bool,
}

impl DebugParams {
    /// Whether any dump file is configured.
    pub fn writes_dumps(&self) -> bool {
        self.dump_feature_buckets.is_some() || self.dump_translation_buckets.is_some()
    }
}

/// Typed, validated estimator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorParams {
    /// Cell size of the feature grids.
    pub feature_bucket_size: Position,
    /// Requested cell size of the translation histogram. The size actually
    /// used is adjusted so the cells tile the translation box exactly.
    pub translation_bucket_size: Position,
    /// Pre-image buckets considered around each image bucket.
    pub feature_bucket_window: BucketWindow,
    /// Histogram cells averaged around the peak.
    pub translation_bucket_window: BucketWindow,
    #[serde(default)]
    pub debug: DebugParams,
    /// Run the per-column accumulation on the rayon pool.
    #[serde(default)]
    pub parallel_columns: bool,
}

impl EstimatorParams {
    /// Reads and validates every option from a [`ParamStore`].
    ///
    /// Fails on the first missing required key, naming it.
    pub fn from_params(params: &ParamStore) -> Result<Self, GeomHashError> {
        let out = Self {
            feature_bucket_size: params.require_position(FEATURE_BUCKET_SIZE)?,
            translation_bucket_size: params.require_position(TRANSLATION_BUCKET_SIZE)?,
            feature_bucket_window: params.require_window(FEATURE_BUCKET_WINDOW)?,
            translation_bucket_window: params.require_window(TRANSLATION_BUCKET_WINDOW)?,
            debug: DebugParams {
                dump_feature_buckets: params.optional_path(DUMP_FEATURE_BUCKETS)?,
                dump_translation_buckets: params.optional_path(DUMP_TRANSLATION_BUCKETS)?,
                progress: params.optional_bool(SHOW_PROGRESS)?,
            },
            parallel_columns: params.optional_bool(PARALLEL_COLUMNS)?,
        };
        out.validate()?;
        Ok(out)
    }

    /// Bucket sizes must be finite and strictly positive.
    pub fn validate(&self) -> Result<(), GeomHashError> {
        for (prefix, size) in [
            (FEATURE_BUCKET_SIZE, self.feature_bucket_size),
            (TRANSLATION_BUCKET_SIZE, self.translation_bucket_size),
        ] {
            for dim in Dimension::ALL {
                let v = size[dim];
                if !v.is_finite() || v <= 0.0 {
                    return Err(GeomHashError::invalid(
                        format!("{}{}", prefix, dim.short_name()),
                        format!("bucket size must be finite and positive, got {}", v),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The equivalent flat parameter bundle.
    pub fn to_params(&self) -> ParamStore {
        let mut out = ParamStore::new();
        for dim in Dimension::ALL {
            let name = dim.short_name();
            out.set(
                format!("{}{}", FEATURE_BUCKET_SIZE, name),
                self.feature_bucket_size[dim],
            );
            out.set(
                format!("{}{}", TRANSLATION_BUCKET_SIZE, name),
                self.translation_bucket_size[dim],
            );
            out.set(
                format!("{}{}", FEATURE_BUCKET_WINDOW, name),
                self.feature_bucket_window[dim] as i64,
            );
            out.set(
                format!("{}{}", TRANSLATION_BUCKET_WINDOW, name),
                self.translation_bucket_window[dim] as i64,
            );
        }
        if let Some(path) = &self.debug.dump_feature_buckets {
            out.set(DUMP_FEATURE_BUCKETS, path.to_string_lossy().to_string());
        }
        if let Some(path) = &self.debug.dump_translation_buckets {
            out.set(DUMP_TRANSLATION_BUCKETS, path.to_string_lossy().to_string());
        }
        if self.debug.progress {
            out.set(SHOW_PROGRESS, true);
        }
        if self.parallel_columns {
            out.set(PARALLEL_COLUMNS, true);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_params() -> ParamStore {
        ParamStore::new()
            .with("feature_map:bucket_size:RT", 10.0)
            .with("feature_map:bucket_size:MZ", 1)
            .with("translation_map:bucket_size:RT", 0.5)
            .with("translation_map:bucket_size:MZ", 0.1)
            .with("translation_map:feature_bucket_window:RT", 2)
            .with("translation_map:feature_bucket_window:MZ", 1)
            .with("translation_map:translation_bucket_window:RT", 3)
            .with("translation_map:translation_bucket_window:MZ", 3)
    }

    #[test]
    fn test_parse_full_params() {
        let parsed = EstimatorParams::from_params(&full_params()).unwrap();
        assert_eq!(parsed.feature_bucket_size, Position::new(10.0, 1.0));
        assert_eq!(parsed.translation_bucket_size, Position::new(0.5, 0.1));
        assert_eq!(parsed.feature_bucket_window, BucketWindow::new(2, 1));
        assert_eq!(parsed.translation_bucket_window, BucketWindow::new(3, 3));
        assert_eq!(parsed.debug, DebugParams::default());
        assert!(!parsed.parallel_columns);
    }

    #[test]
    fn test_missing_key_is_named() {
        let mut params = full_params();
        params.remove("translation_map:bucket_size:RT");
        match EstimatorParams::from_params(&params) {
            Err(GeomHashError::ConfigurationMissing { key }) => {
                assert_eq!(key, "translation_map:bucket_size:RT")
            }
            other => panic!("Expected ConfigurationMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_values() {
        let params = full_params().with("feature_map:bucket_size:MZ", 0.0);
        assert!(matches!(
            EstimatorParams::from_params(&params),
            Err(GeomHashError::InvalidParameter { .. })
        ));

        let params = full_params().with("translation_map:feature_bucket_window:RT", -1);
        assert!(matches!(
            EstimatorParams::from_params(&params),
            Err(GeomHashError::InvalidParameter { .. })
        ));

        let params = full_params().with("translation_map:feature_bucket_window:RT", 1.5);
        assert!(EstimatorParams::from_params(&params).is_err());
    }

    #[test]
    fn test_json_round_trip_through_store() {
        let json = r#"{
            "feature_map:bucket_size:RT": 10.0,
            "feature_map:bucket_size:MZ": 1,
            "translation_map:bucket_size:RT": 0.5,
            "translation_map:bucket_size:MZ": 0.1,
            "translation_map:feature_bucket_window:RT": 2,
            "translation_map:feature_bucket_window:MZ": 1.0,
            "translation_map:translation_bucket_window:RT": 3,
            "translation_map:translation_bucket_window:MZ": 3,
            "debug:dump_translation_buckets": "/tmp/tb.txt",
            "parallel:columns": true
        }"#;
        let store: ParamStore = serde_json::from_str(json).unwrap();
        let parsed = EstimatorParams::from_params(&store).unwrap();
        assert_eq!(parsed.feature_bucket_window, BucketWindow::new(2, 1));
        assert_eq!(
            parsed.debug.dump_translation_buckets,
            Some(PathBuf::from("/tmp/tb.txt"))
        );
        assert!(parsed.parallel_columns);

        let reparsed = EstimatorParams::from_params(&parsed.to_params()).unwrap();
        assert_eq!(reparsed, parsed);
    }

    #[test]
    fn test_clamped_window_range() {
        let w = BucketWindow::new(2, 0);
        assert_eq!(w.clamped_range(Dimension::Rt, 1, 10), 0..=3);
        assert_eq!(w.clamped_range(Dimension::Rt, 9, 10), 7..=9);
        assert_eq!(w.clamped_range(Dimension::Mz, 4, 10), 4..=4);
    }
}
