pub mod cli;
pub mod compiler;
pub mod config;
pub mod display;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod normalizer;
pub mod selector;
pub mod token;

use crate::config::CompilerConfig;
use anyhow::Context;
use serde_json::Value;
use std::path::Path;

pub use cli::{Cli, ColorMode, Commands, OutputFormat, cli_parse};
pub use compiler::{CompiledExpression, Compiler, IMPLICIT_OPERATOR, OperatorPriority};
pub use error::{QueryError, Result};
pub use extractor::{EntityExtractor, MAX_ENTITIES};
pub use filter::{
    FilterFragment, FilterMode, FilterSerializer, SearchScope, build_destination_value,
    build_fragment,
};
pub use normalizer::{OperatorNormalizer, OperatorStrategy};
pub use selector::EntitySelector;
pub use token::{
    Category, MAX_DEPTH_CEILING, OperatorKind, RawToken, Token, TokenKind, TreeLimits,
    decode_forest,
};

/// Repository searched when a filter names none.
pub const DEFAULT_REPOSITORY: &str = "NewsWire";

/// Parse a forest document: an array of tokens or a single token, JSON or JSON5.
pub fn parse_forest(text: &str) -> anyhow::Result<Vec<RawToken>> {
    let value = json5::from_str::<Value>(text).context("Invalid JSON5 document")?;
    let tokens = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|token| vec![token])
    };
    tokens.context("Document is not a token or a list of tokens")
}

/// Read and decode a forest file through the profile's category table.
pub fn load_forest(path: &Path, config: &CompilerConfig) -> anyhow::Result<Vec<Token>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read forest file '{}'", path.display()))?;
    let raw = parse_forest(&text)
        .with_context(|| format!("Failed to parse forest file '{}'", path.display()))?;
    let tokens = decode_forest(&raw, &config.categories, &config.limits.tree())
        .with_context(|| format!("Failed to decode forest file '{}'", path.display()))?;
    Ok(tokens)
}

fn write_output_file(path: &Path, content: &str) -> anyhow::Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file '{}'", path.display()))
}

fn apply_color_mode(mode: ColorMode) {
    match mode {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::load_config(cli.config.as_deref()).context("Failed to load config")?;
    apply_color_mode(cli.color);
    // Files never get escape codes.
    if cli.output.is_some() && cli.color == ColorMode::Auto {
        colored::control::set_override(false);
    }

    tracing::debug!(
        profile = %config.profile_name,
        format = ?cli.format,
        "starting command"
    );

    let limits = config.limits.tree();
    let format = cli.format;

    let rendered = match &cli.command {
        Commands::Compile {
            forest,
            strategy,
            priority,
            raw,
        } => {
            let tokens = load_forest(forest, &config)?;
            let compiler = Compiler::new(limits);
            let forest = if *raw {
                tokens
            } else {
                OperatorNormalizer::new(limits).normalize_forest(&tokens, (*strategy).into())?
            };
            let compiled = compiler.compile(&forest, (*priority).into())?;
            match format {
                OutputFormat::Text => display::format_tree_text(compiled.root()),
                OutputFormat::Json => display::format_json(&compiled)?,
            }
        }
        Commands::Extract {
            forest,
            category,
            limit,
        } => {
            let target = config.categories.resolve(category)?;
            let tokens = load_forest(forest, &config)?;
            let compiled = Compiler::new(limits).compile(&tokens, OperatorPriority::Boolean)?;
            let max_entities = limit.unwrap_or(config.limits.max_entities);
            let entities =
                EntityExtractor::new(limits, max_entities).extract(target, compiled.root())?;
            match format {
                OutputFormat::Text => display::format_entities_text(&entities),
                OutputFormat::Json => display::format_json(&entities)?,
            }
        }
        Commands::Filter {
            forest,
            name,
            scope,
            mode,
            repositories,
        } => {
            let tokens = load_forest(forest, &config)?;
            let forest = OperatorNormalizer::new(limits)
                .normalize_forest(&tokens, OperatorStrategy::Smart)?;
            let compiled = Compiler::new(limits).compile(&forest, OperatorPriority::Boolean)?;
            let repositories: Vec<&str> = if repositories.is_empty() {
                vec![DEFAULT_REPOSITORY]
            } else {
                repositories.iter().map(String::as_str).collect()
            };
            let fragment = build_fragment(
                &config,
                compiled.root(),
                name,
                (*scope).into(),
                (*mode).into(),
                &repositories,
            )?;
            match format {
                OutputFormat::Text => display::format_fragment_text(&fragment),
                OutputFormat::Json => display::format_json(&fragment)?,
            }
        }
        Commands::Destination { repositories } => {
            let destination = build_destination_value(repositories, &config.destinations)?;
            match format {
                OutputFormat::Text => format!("{destination}\n"),
                OutputFormat::Json => {
                    display::format_json(&serde_json::json!({ "destination": destination }))?
                }
            }
        }
        Commands::Select { forest } => {
            let tokens = load_forest(forest, &config)?;
            let selected = EntitySelector::from_config(&config)
                .public_organisation_and_language_tokens(&tokens)?;
            match format {
                OutputFormat::Text => display::format_tree_text(&selected),
                OutputFormat::Json => display::format_json(&selected)?,
            }
        }
    };

    if !cli.quiet {
        print!("{rendered}");
    }
    if let Some(path) = &cli.output {
        write_output_file(path, &rendered)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forest_accepts_single_token() {
        let raw = parse_forest(r#"{ id: "o1", category: "organisation" }"#).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].id, "o1");
    }

    #[test]
    fn test_parse_forest_accepts_json5_array() {
        let raw = parse_forest(
            r#"[
                // trailing commas and comments are fine
                { id: "o1", category: "organisation", },
                { id: "m", category: "operator", operator: "or" },
                { id: "o2", category: "organisation" },
            ]"#,
        )
        .unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[1].operator.as_deref(), Some("or"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_pipeline_types_are_send_and_sync() {
        assert_send_sync::<Token>();
        assert_send_sync::<Compiler>();
        assert_send_sync::<OperatorNormalizer>();
        assert_send_sync::<EntityExtractor>();
        assert_send_sync::<EntitySelector>();
        assert_send_sync::<FilterSerializer>();
        assert_send_sync::<CompilerConfig>();
        assert_send_sync::<QueryError>();
    }

    #[test]
    fn test_parse_forest_rejects_garbage() {
        assert!(parse_forest("[{ id: ").is_err());
    }
}
