use geomhash::GeomHashError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Alignment error: {0}")]
    Alignment(#[from] GeomHashError),

    #[error("Data reading error: {0}")]
    DataReading(String),
}
