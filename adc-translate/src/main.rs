use adc_translate::report::render_features;
use adc_translate::version::{FeatureMatrix, Version};
use adc_translate::{Context as TranslationContext, EmptyInventory, ObjectKind};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod translate_cmd;

use cli::{Cli, Command, FeaturesArgs};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Translate(args) => translate_cmd::run_translate(args),
        Command::Classes => run_classes(),
        Command::Features(args) => run_features(args),
    }
}

fn run_classes() -> Result<()> {
    for kind in ObjectKind::ALL {
        println!("{}", kind.class_name());
    }
    Ok(())
}

fn run_features(args: FeaturesArgs) -> Result<()> {
    let matrix = match &args.features_file {
        Some(path) => FeatureMatrix::load(path)
            .with_context(|| format!("failed to load feature matrix {}", path.display()))?,
        None => FeatureMatrix::embedded(),
    };
    let ctx = TranslationContext::new(Version::parse(&args.target_version), &EmptyInventory)
        .with_features(matrix);
    println!("{}", render_features(&ctx));
    Ok(())
}
