use crate::filter::FilterFragment;
use crate::token::{Token, TokenKind};
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use serde::Serialize;
use std::fmt::Write as _;

pub fn create_styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|header| Cell::new(header)));
    table
}

/// Render a tree one node per line, children indented under their parent.
pub fn format_tree_text(root: &Token) -> String {
    let mut out = String::new();
    write_tree_node(&mut out, root, 0);
    out
}

fn write_tree_node(out: &mut String, token: &Token, depth: usize) {
    let indent = "  ".repeat(depth);
    match token.kind() {
        TokenKind::Empty => {
            let _ = writeln!(out, "{indent}{}", "<empty>".dimmed());
        }
        TokenKind::Entity(category) => {
            let _ = writeln!(
                out,
                "{indent}{} {} {}",
                category.element_name().cyan(),
                token.label().bold(),
                format!("[{}]", token.id()).dimmed()
            );
        }
        TokenKind::Group { category, children } => {
            let _ = writeln!(
                out,
                "{indent}{} {} {}",
                category.element_name().magenta(),
                token.label().bold(),
                format!("[{}]", token.id()).dimmed()
            );
            for child in children {
                write_tree_node(out, child, depth + 1);
            }
        }
        TokenKind::Operator { kind, children } => {
            let _ = writeln!(
                out,
                "{indent}{} {}",
                kind.canonical_name().yellow().bold(),
                format!("[{}]", token.id()).dimmed()
            );
            for child in children {
                write_tree_node(out, child, depth + 1);
            }
        }
    }
}

/// Extracted entities as a table, in extraction order.
pub fn format_entities_text(entities: &[Token]) -> String {
    if entities.is_empty() {
        return format!("{}\n", "No matching entities".dimmed());
    }

    let mut table = create_styled_table(&["#", "Id", "Label", "Category"]);
    for (idx, entity) in entities.iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(entity.id()),
            Cell::new(entity.label()),
            Cell::new(
                entity
                    .category()
                    .map(|category| category.canonical_name())
                    .unwrap_or("-"),
            ),
        ]);
    }
    format!("{table}\n{} entities\n", entities.len().to_string().green().bold())
}

pub fn format_fragment_text(fragment: &FilterFragment) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "FILTER".bold().bright_white());
    let _ = writeln!(out, "{}", fragment.markup);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} {}",
        "Destination:".bold(),
        if fragment.destination.is_empty() {
            "(none)".dimmed().to_string()
        } else {
            fragment.destination.green().to_string()
        }
    );
    let _ = writeln!(out, "{} {}", "Search in:  ".bold(), fragment.scope);
    let _ = writeln!(out, "{} {}", "Mode:       ".bold(), fragment.mode);
    out
}

/// Pretty JSON for anything serializable, newline-terminated.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}
