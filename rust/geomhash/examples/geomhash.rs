use geomhash::{
    BucketWindow,
    EstimatorParams,
    Feature,
    Position,
    TranslationEstimator,
};
use rand::Rng;
use tracing_subscriber;

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_thread_ids(true)
        .with_thread_names(true)
        .try_init();
}

fn main() {
    println!("Running geometric hashing translation example");
    setup_tracing();

    // 1. Generate a synthetic pre-image map
    let mut rng = rand::thread_rng();
    let preimage: Vec<Feature> = (0..2000)
        .map(|_| {
            Feature::new(
                rng.gen_range(0.0..3600.0),
                rng.gen_range(400.0..1200.0),
                rng.gen_range(1e3..1e6),
            )
        })
        .collect();

    // 2. Shift it, jitter positions and intensities, drop some features and add noise
    let true_shift = Position::new(42.0, 0.25);
    let mut image: Vec<Feature> = preimage
        .iter()
        .filter_map(|f| {
            if !rng.gen_bool(0.8) {
                return None;
            }
            Some(Feature::new(
                f.rt + true_shift.rt + rng.gen_range(-1.0..1.0),
                f.mz + true_shift.mz + rng.gen_range(-0.005..0.005),
                f.intensity * rng.gen_range(0.8..1.2),
            ))
        })
        .collect();
    for _ in 0..200 {
        image.push(Feature::new(
            rng.gen_range(0.0..3600.0),
            rng.gen_range(400.0..1200.0),
            rng.gen_range(1e3..1e6),
        ));
    }
    println!(
        "Generated {} pre-image and {} image features.",
        preimage.len(),
        image.len()
    );

    // 3. Configure and run the estimator
    let params = EstimatorParams {
        feature_bucket_size: Position::new(120.0, 10.0),
        translation_bucket_size: Position::new(1.0, 0.01),
        feature_bucket_window: BucketWindow::new(1, 1),
        translation_bucket_window: BucketWindow::new(2, 2),
        debug: Default::default(),
        parallel_columns: true,
    };
    let estimator = match TranslationEstimator::new(params) {
        Ok(x) => x,
        Err(e) => {
            eprintln!("Invalid parameters: {}", e);
            return;
        }
    };

    match estimator.run(&preimage, &image) {
        Ok(estimate) => {
            println!("Estimation successful!");
            println!(
                "Translation: {} (quality {:.3}); expect {}",
                estimate.translation.position, estimate.translation.quality, true_shift
            );
            println!("Mapping: {:?}", estimate.mapping);
            println!(
                "Votes: {} pairs, {} outside the histogram",
                estimate.vote_stats.pairs, estimate.vote_stats.dropped
            );
        }
        Err(e) => {
            eprintln!("Estimation failed: {:?}", e);
        }
    }

    // Example with an empty map
    println!("\n--- Testing error case (empty image) ---");
    let empty: Vec<Feature> = vec![];
    match estimator.run(&preimage, &empty) {
        Ok(_) => println!("This should have failed!"),
        Err(e) => eprintln!("Correctly failed with error: {}", e),
    }
}
