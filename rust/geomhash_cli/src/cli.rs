use clap::{
    Parser,
    Subcommand,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate the translation between two feature maps.
    Align(AlignArgs),
    /// Write a template parameter file.
    WriteTemplate(WriteTemplateArgs),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum SerializationFormat {
    Json,
    #[default]
    PrettyJson,
}

#[derive(Parser, Debug, Clone)]
pub struct AlignArgs {
    /// The reference feature map (csv, tsv or json).
    #[arg(short, long)]
    pub preimage: PathBuf,

    /// The feature map to align onto the reference (csv, tsv or json).
    #[arg(short, long)]
    pub image: PathBuf,

    /// The path to the json file with the estimator parameters.
    #[arg(short = 'c', long)]
    pub params: PathBuf,

    /// The path to the output json file.
    #[arg(short, long)]
    pub output_path: PathBuf,

    /// The format to use for the output
    #[arg(short, long, default_value_t, value_enum)]
    pub format: SerializationFormat,

    /// Also write the image map, moved onto the reference, to this csv file.
    #[arg(short, long)]
    pub apply: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct WriteTemplateArgs {
    /// The path to the output file.
    #[arg(short, long)]
    pub output_path: PathBuf,
}
