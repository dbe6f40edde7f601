//! Translation estimation between two LC-MS feature maps by geometric
//! hashing.
//!
//! Feature pairs from neighbouring buckets of the two maps vote, weighted by
//! intensity similarity, for the translation separating them. The densest
//! region of the vote histogram gives the translation.
//!
//! ```
//! use geomhash::{
//!     Feature,
//!     ParamStore,
//!     estimate_translation,
//! };
//!
//! let preimage = vec![Feature::new(0.0, 0.0, 10.0)];
//! let image = vec![Feature::new(5.0, 3.0, 10.0)];
//! let params = ParamStore::new()
//!     .with("feature_map:bucket_size:RT", 100.0)
//!     .with("feature_map:bucket_size:MZ", 100.0)
//!     .with("translation_map:bucket_size:RT", 1.0)
//!     .with("translation_map:bucket_size:MZ", 1.0)
//!     .with("translation_map:feature_bucket_window:RT", 1)
//!     .with("translation_map:feature_bucket_window:MZ", 1)
//!     .with("translation_map:translation_bucket_window:RT", 1)
//!     .with("translation_map:translation_bucket_window:MZ", 1);
//! let estimate = estimate_translation(&preimage, &image, &params).unwrap();
//! assert_eq!(estimate.translation.quality, 1.0);
//! ```

pub mod aggregation;
pub mod bounding_box;
pub mod bucketing;
pub mod diagnostics;
pub mod errors;
pub mod estimator;
pub mod feature;
pub mod grid;
pub mod mapping;
pub mod params;
pub mod plotting;
pub mod position;
pub mod refinement;
pub mod translation;
pub mod voting;

pub use errors::GeomHashError;
pub use estimator::{
    TranslationEstimate,
    TranslationEstimator,
};
pub use feature::{
    Feature,
    FeatureLike,
    MapRole,
};
pub use params::{
    BucketWindow,
    EstimatorParams,
    ParamStore,
};
pub use position::Position;
pub use translation::Translation;

/// One-shot estimation with a flat parameter bundle.
///
/// Every required parameter is checked before either map is touched.
pub fn estimate_translation<F: FeatureLike + Sync>(
    preimage: &[F],
    image: &[F],
    params: &ParamStore,
) -> Result<TranslationEstimate, GeomHashError> {
    TranslationEstimator::from_params(params)?.run(preimage, image)
}
