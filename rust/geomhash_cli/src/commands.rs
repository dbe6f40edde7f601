use std::fs::File;
use std::io::{
    BufReader,
    BufWriter,
    Write,
};
use std::path::Path;

use geomhash::{
    Feature,
    ParamStore,
    TranslationEstimator,
};
use tracing::{
    info,
    instrument,
    warn,
};

use crate::cli::{
    AlignArgs,
    SerializationFormat,
    WriteTemplateArgs,
};
use crate::error::CliError;

const PARAMS_TEMPLATE: &str = r#"{
    "feature_map:bucket_size:RT": 150.0,
    "feature_map:bucket_size:MZ": 4.0,
    "translation_map:bucket_size:RT": 5.0,
    "translation_map:bucket_size:MZ": 0.1,
    "translation_map:feature_bucket_window:RT": 1,
    "translation_map:feature_bucket_window:MZ": 1,
    "translation_map:translation_bucket_window:RT": 2,
    "translation_map:translation_bucket_window:MZ": 2,
    "debug:dump_feature_buckets": "",
    "debug:dump_translation_buckets": "",
    "debug:progress": true,
    "parallel:columns": true
}
"#;

/// Main function for the 'align' subcommand.
#[instrument]
pub fn main_align(args: AlignArgs) -> Result<(), CliError> {
    let params: ParamStore = serde_json::from_str(&std::fs::read_to_string(&args.params)?)?;
    let estimator = TranslationEstimator::from_params(&params)?;
    info!("Using parameters: {:#?}", estimator.params());

    let preimage = read_features(&args.preimage)?;
    let image = read_features(&args.image)?;
    info!(
        "Loaded {} pre-image and {} image features",
        preimage.len(),
        image.len()
    );

    let estimate = estimator.run(&preimage, &image)?;
    if estimate.translation.is_degenerate() {
        warn!("Translation quality is zero, the reported translation is not meaningful");
    }

    if let Some(parent) = args.output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(&args.output_path)?);
    match args.format {
        SerializationFormat::Json => serde_json::to_writer(&mut writer, &estimate)?,
        SerializationFormat::PrettyJson => serde_json::to_writer_pretty(&mut writer, &estimate)?,
    }
    writer.flush()?;
    info!("Wrote estimate to {}", args.output_path.display());

    if let Some(apply_path) = &args.apply {
        let moved = estimate.apply_to_features(&image);
        write_features(apply_path, &moved)?;
        info!("Wrote {} aligned features to {}", moved.len(), apply_path.display());
    }
    Ok(())
}

pub fn main_write_template(args: WriteTemplateArgs) -> Result<(), CliError> {
    let target = args.output_path;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, PARAMS_TEMPLATE)?;
    println!("Wrote parameter template to: {}", target.display());
    Ok(())
}

/// Reads a feature map, choosing the format from the file extension.
///
/// Delimited files need `rt`, `mz` and `intensity` columns; json files hold
/// an array of `{"rt", "mz", "intensity"}` objects.
pub fn read_features(path: &Path) -> Result<Vec<Feature>, CliError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    info!("Reading features from {}", path.display());
    match extension.as_deref() {
        Some("json") => {
            let reader = BufReader::new(File::open(path)?);
            Ok(serde_json::from_reader(reader)?)
        }
        Some("csv") => read_delimited(path, b','),
        Some("tsv") | Some("txt") => read_delimited(path, b'\t'),
        other => Err(CliError::DataReading(format!(
            "Unsupported feature file extension {:?} for {}",
            other,
            path.display()
        ))),
    }
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Vec<Feature>, CliError> {
    let file_handle = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(file_handle);
    let mut out = Vec::new();
    for record in rdr.deserialize() {
        let feature: Feature = record?;
        out.push(feature);
    }
    Ok(out)
}

fn write_features(path: &Path, features: &[Feature]) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    for feature in features {
        wtr.serialize(feature)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geomhash::EstimatorParams;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("geomhash_cli_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_template_parses() {
        let params: ParamStore = serde_json::from_str(PARAMS_TEMPLATE).unwrap();
        let parsed = EstimatorParams::from_params(&params).unwrap();
        assert!(parsed.parallel_columns);
        assert!(!parsed.debug.writes_dumps());
    }

    #[test]
    fn test_feature_files_roundtrip() {
        let dir = scratch_dir("features");
        let features = vec![Feature::new(1.5, 400.25, 1000.0), Feature::new(2.0, 401.0, 0.0)];

        let csv_path = dir.join("features.csv");
        write_features(&csv_path, &features).unwrap();
        assert_eq!(read_features(&csv_path).unwrap(), features);

        let json_path = dir.join("features.json");
        std::fs::write(&json_path, serde_json::to_string(&features).unwrap()).unwrap();
        assert_eq!(read_features(&json_path).unwrap(), features);

        let tsv_path = dir.join("features.tsv");
        std::fs::write(&tsv_path, "rt\tmz\tintensity\n1.5\t400.25\t1000\n2\t401\t0\n").unwrap();
        assert_eq!(read_features(&tsv_path).unwrap(), features);

        assert!(matches!(
            read_features(&dir.join("features.parquet")),
            Err(CliError::DataReading(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_align_writes_outputs() {
        let dir = scratch_dir("align");
        let preimage = vec![Feature::new(0.0, 0.0, 10.0)];
        let image = vec![Feature::new(5.0, 3.0, 10.0)];
        write_features(&dir.join("pre.csv"), &preimage).unwrap();
        write_features(&dir.join("img.csv"), &image).unwrap();
        std::fs::write(
            dir.join("params.json"),
            r#"{
                "feature_map:bucket_size:RT": 100.0,
                "feature_map:bucket_size:MZ": 100.0,
                "translation_map:bucket_size:RT": 1.0,
                "translation_map:bucket_size:MZ": 1.0,
                "translation_map:feature_bucket_window:RT": 1,
                "translation_map:feature_bucket_window:MZ": 1,
                "translation_map:translation_bucket_window:RT": 2,
                "translation_map:translation_bucket_window:MZ": 2
            }"#,
        )
        .unwrap();

        main_align(AlignArgs {
            preimage: dir.join("pre.csv"),
            image: dir.join("img.csv"),
            params: dir.join("params.json"),
            output_path: dir.join("out").join("estimate.json"),
            format: SerializationFormat::Json,
            apply: Some(dir.join("aligned.csv")),
        })
        .unwrap();

        let out: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("out").join("estimate.json")).unwrap())
                .unwrap();
        assert_eq!(out["translation"]["quality"].as_f64(), Some(1.0));
        let aligned = read_features(&dir.join("aligned.csv")).unwrap();
        assert!(aligned[0].rt.abs() < 1e-9);
        assert!(aligned[0].mz.abs() < 1e-9);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
