//! Discover command implementation

use miette::{IntoDiagnostic, Result};
use serde_json::json;
use wpbridge_core::TransformerLoader;
use wpbridge_manifest::{DeclarationSource, InstalledExtension, TransformerConfig};

use super::load_config;
use crate::cli::Cli;

pub fn run_discover(cli: &Cli, as_json: bool) -> Result<()> {
    let config = load_config(cli)?;
    let loader = TransformerLoader::new(config.plugins_dir(), config.config_dir());
    let discovery = loader.discover_all().into_diagnostic()?;

    if as_json {
        let output = discovery_json(&discovery.extensions, &discovery.transformers);
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
    } else {
        output_text(&discovery.extensions, &discovery.transformers);
    }
    Ok(())
}

fn output_text(extensions: &[InstalledExtension], transformers: &[TransformerConfig]) {
    println!("Extensions:");
    for extension in extensions {
        println!(
            "  {} {} ({})",
            extension.slug,
            extension.version,
            extension.entry_file.display()
        );
    }

    println!("\nTransformers:");
    for transformer in transformers {
        let state = if transformer.enabled { "" } else { " [disabled]" };
        let scope = transformer
            .extension
            .as_deref()
            .map(|slug| format!(" for {slug}"))
            .unwrap_or_default();
        println!(
            "  {} ({}, {}){}{}",
            transformer.id,
            transformer.kind.as_deref().unwrap_or("?"),
            source_name(transformer.source),
            scope,
            state
        );
    }
}

fn source_name(source: DeclarationSource) -> &'static str {
    match source {
        DeclarationSource::Builtin => "builtin",
        DeclarationSource::Registry => "registry",
        DeclarationSource::User => "user",
    }
}

fn discovery_json(
    extensions: &[InstalledExtension],
    transformers: &[TransformerConfig],
) -> serde_json::Value {
    let extensions: Vec<serde_json::Value> = extensions
        .iter()
        .map(|e| {
            json!({
                "slug": e.slug,
                "name": e.name,
                "version": e.version,
                "path": e.path,
                "entry_file": e.entry_file,
            })
        })
        .collect();

    json!({
        "extensions": extensions,
        "transformers": transformers,
    })
}
