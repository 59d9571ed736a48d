use super::escape::{check_xml_name, escape_attribute};
use crate::config::MarkupRules;
use crate::error::Result;
use crate::token::{Token, TokenKind, TreeLimits};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

/// Which part of a story the filter searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchScope {
    #[default]
    HeadlineOnly,
    FullText,
}

impl SearchScope {
    pub fn wire_name(&self) -> &'static str {
        match self {
            SearchScope::HeadlineOnly => "HeadlineOnly",
            SearchScope::FullText => "FullText",
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Provider match mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    Normal,
    Significant,
}

impl FilterMode {
    pub fn wire_name(&self) -> &'static str {
        match self {
            FilterMode::Normal => "Normal",
            FilterMode::Significant => "Significant",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Renders compiled trees as filter markup.
#[derive(Debug, Clone)]
pub struct FilterSerializer {
    prefix: String,
    root_element: String,
    limits: TreeLimits,
}

impl Default for FilterSerializer {
    fn default() -> Self {
        let rules = MarkupRules::default();
        Self {
            prefix: rules.prefix,
            root_element: rules.root_element,
            limits: TreeLimits::default(),
        }
    }
}

impl FilterSerializer {
    /// Fails with `EncodingError` when the configured names are not XML names.
    pub fn new(rules: &MarkupRules, limits: TreeLimits) -> Result<Self> {
        if !rules.prefix.is_empty() {
            check_xml_name(&rules.prefix, "markup prefix")?;
        }
        check_xml_name(&rules.root_element, "markup root element")?;
        Ok(Self {
            prefix: rules.prefix.clone(),
            root_element: rules.root_element.clone(),
            limits,
        })
    }

    /// Render `root` wrapped in the root element carrying `filter_name`,
    /// `scope` and `mode` as attributes.
    ///
    /// Operators become `<And>`, `<Or>`, `<Not>`; entities and groups are
    /// tagged by category with `id` and `label` attributes.
    pub fn compile_filter(
        &self,
        root: &Token,
        filter_name: &str,
        scope: SearchScope,
        mode: FilterMode,
    ) -> Result<String> {
        check_xml_name(filter_name, "filter name")?;
        let shape = self.limits.check(root.measure())?;
        root.validate()?;

        let mut out = String::with_capacity(shape.nodes * 48);
        let wrapper = self.qualified(&self.root_element);
        let _ = write!(
            out,
            r#"<{wrapper} name="{filter_name}" searchIn="{scope}" mode="{mode}">"#
        );
        self.write_node(&mut out, root)?;
        let _ = write!(out, "</{wrapper}>");

        tracing::debug!(nodes = shape.nodes, bytes = out.len(), "rendered filter markup");
        Ok(out)
    }

    fn write_node(&self, out: &mut String, token: &Token) -> Result<()> {
        match token.kind() {
            TokenKind::Empty => {}
            TokenKind::Entity(category) => {
                let element = self.qualified(category.element_name());
                let _ = write!(out, "<{element}");
                self.write_identity(out, token)?;
                out.push_str("/>");
            }
            TokenKind::Group { category, children } => {
                let element = self.qualified(category.element_name());
                let _ = write!(out, "<{element}");
                self.write_identity(out, token)?;
                if children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for child in children {
                        self.write_node(out, child)?;
                    }
                    let _ = write!(out, "</{element}>");
                }
            }
            TokenKind::Operator { kind, children } => {
                let element = self.qualified(kind.element_name());
                let _ = write!(out, "<{element}>");
                for child in children {
                    self.write_node(out, child)?;
                }
                let _ = write!(out, "</{element}>");
            }
        }
        Ok(())
    }

    fn write_identity(&self, out: &mut String, token: &Token) -> Result<()> {
        let context = format!("token '{}'", token.id());
        let _ = write!(
            out,
            r#" id="{}" label="{}""#,
            escape_attribute(token.id(), &context)?,
            escape_attribute(token.label(), &context)?
        );
        Ok(())
    }

    fn qualified(&self, local: &str) -> String {
        if self.prefix.is_empty() {
            local.to_string()
        } else {
            format!("{}:{local}", self.prefix)
        }
    }
}
