use adc_translate::normalize::AliasTable;
use adc_translate::report::{render_problems, render_summary, render_text};
use adc_translate::version::{FeatureMatrix, Version};
use adc_translate::{translate_declaration, Context as TranslationContext, StaticInventory};
use anyhow::{bail, Context, Result};
use decl_core::{format_json, parse_file, write_file};
use tracing::info;

use crate::cli::{OutputFormat, TranslateArgs};

pub fn run_translate(args: TranslateArgs) -> Result<()> {
    let decl = parse_file(&args.declaration)
        .with_context(|| format!("failed to parse {}", args.declaration.display()))?;

    let inventory = match &args.inventory {
        Some(path) => StaticInventory::load(path)
            .with_context(|| format!("failed to load inventory {}", path.display()))?,
        None => StaticInventory::default(),
    };

    let mut ctx = TranslationContext::new(Version::parse(&args.target_version), &inventory)
        .with_modules(args.provision.iter().chain(inventory.provisioned.iter()));
    if let Some(path) = &args.features_file {
        let matrix = FeatureMatrix::load(path)
            .with_context(|| format!("failed to load feature matrix {}", path.display()))?;
        ctx = ctx.with_features(matrix);
    }
    if let Some(path) = &args.aliases_file {
        let aliases = AliasTable::load(path)
            .with_context(|| format!("failed to load alias table {}", path.display()))?;
        ctx = ctx.with_aliases(aliases);
    }

    info!(
        declaration = %args.declaration.display(),
        target = %ctx.target(),
        "translating declaration"
    );
    let outcome = translate_declaration(&ctx, &decl);

    if let Some(out_path) = &args.output {
        write_file(&outcome.result, out_path)
            .with_context(|| format!("failed to write output {}", out_path.display()))?;
        println!("{}", render_summary(&outcome));
    } else if args.summary {
        println!("{}", render_summary(&outcome));
    } else {
        match args.format {
            OutputFormat::Text => {
                println!("{}", render_text(&outcome));
                println!();
                println!("{}", render_summary(&outcome));
            }
            OutputFormat::Json => println!("{}", format_json(&outcome.result)),
        }
    }

    if !outcome.failures.is_empty() || !outcome.skipped.is_empty() {
        eprintln!("{}", render_problems(&outcome));
    }
    if !outcome.is_success() {
        bail!("translate failed: {} items could not be translated", outcome.failures.len());
    }
    Ok(())
}
