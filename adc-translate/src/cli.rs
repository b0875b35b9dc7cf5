use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "adc-translate")]
#[command(about = "Translate ADC declarations into appliance config objects")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Translate one declaration for a target appliance.
    Translate(TranslateArgs),
    /// List the declaration classes this tool understands.
    Classes,
    /// Show which version-gated features a target supports.
    Features(FeaturesArgs),
}

#[derive(Parser, Debug)]
pub struct TranslateArgs {
    /// Declaration file (JSON or YAML).
    pub declaration: PathBuf,
    #[arg(long, default_value = "17.1")]
    pub target_version: String,
    /// Provisioned module (asm, afm, apm, gtm, ...). Repeatable.
    #[arg(long = "provision")]
    pub provision: Vec<String>,
    /// Inventory snapshot (JSON) describing objects already on the target.
    #[arg(long)]
    pub inventory: Option<PathBuf>,
    /// Override the built-in feature matrix.
    #[arg(long)]
    pub features_file: Option<PathBuf>,
    /// Override the built-in property alias table.
    #[arg(long)]
    pub aliases_file: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Write the result (JSON) to this file instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Print only summary counts.
    #[arg(long)]
    pub summary: bool,
}

#[derive(Parser, Debug)]
pub struct FeaturesArgs {
    #[arg(long, default_value = "17.1")]
    pub target_version: String,
    #[arg(long)]
    pub features_file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
