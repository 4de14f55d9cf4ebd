use clap::Args;
use sender_compliance::error::AppError;
use sender_compliance::workflows::briefs::DocumentMergeEngine;
use sender_compliance::workflows::placeholders::Bindings;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct MergeArgs {
    /// Path to the DOCX template
    #[arg(long)]
    pub(crate) template: PathBuf,
    /// JSON object mapping placeholder names to strings (null renders blank)
    #[arg(long)]
    pub(crate) bindings: PathBuf,
    /// Where to write the merged DOCX
    #[arg(long)]
    pub(crate) out: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct PlaceholdersArgs {
    /// Path to the DOCX template
    #[arg(long)]
    pub(crate) template: PathBuf,
}

pub(crate) fn run_merge(args: MergeArgs) -> Result<(), AppError> {
    let template = std::fs::read(&args.template)?;
    let bindings = parse_bindings(&std::fs::read_to_string(&args.bindings)?)?;

    let merged = DocumentMergeEngine::new().merge(&template, &bindings)?;
    std::fs::write(&args.out, &merged)?;

    println!(
        "Merged {} placeholder values into {} ({} bytes)",
        bindings.len(),
        args.out.display(),
        merged.len()
    );
    Ok(())
}

pub(crate) fn run_placeholders(args: PlaceholdersArgs) -> Result<(), AppError> {
    let template = std::fs::read(&args.template)?;
    let tokens = DocumentMergeEngine::new()
        .placeholders(&template)
        .map_err(sender_compliance::workflows::numbering::LifecycleError::from)?;

    if tokens.is_empty() {
        println!("No placeholders found in {}", args.template.display());
    }
    for token in tokens {
        println!("{token}");
    }
    Ok(())
}

fn parse_bindings(raw: &str) -> Result<Bindings, AppError> {
    let values: BTreeMap<String, Option<String>> = serde_json::from_str(raw)?;
    let mut bindings = Bindings::new();
    for (token, value) in values {
        match value {
            Some(value) => bindings.insert(token, value),
            None => bindings.insert_default(token),
        }
    }
    Ok(bindings)
}
