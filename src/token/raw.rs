use super::entities::{Category, OperatorKind, Token, TokenKind, TreeLimits, TreeNode};
use crate::config::CategoryTable;
use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};

/// Token as sent by the upstream producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawToken {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawToken>,
}

impl TreeNode for RawToken {
    fn child_nodes(&self) -> &[Self] {
        &self.children
    }
}

impl From<Token> for RawToken {
    fn from(token: Token) -> Self {
        let children = token.children().iter().cloned().map(RawToken::from).collect();
        let (category, operator) = match token.kind() {
            TokenKind::Empty => (None, None),
            TokenKind::Entity(category) | TokenKind::Group { category, .. } => {
                (Some(category.canonical_name().to_string()), None)
            }
            TokenKind::Operator { kind, .. } => (
                Some(Category::Operator.canonical_name().to_string()),
                Some(kind.canonical_name().to_lowercase()),
            ),
        };
        RawToken {
            id: token.id().to_string(),
            label: (!token.is_empty()).then(|| token.label().to_string()),
            category,
            operator,
            children,
        }
    }
}

/// Decode an upstream forest into typed tokens.
///
/// The raw forest is measured before any recursion so pathological input
/// fails with `OversizeTree` instead of exhausting the stack.
pub fn decode_forest(
    raw: &[RawToken],
    table: &CategoryTable,
    limits: &TreeLimits,
) -> Result<Vec<Token>> {
    let shape = limits.check_forest(raw)?;
    tracing::debug!(
        tokens = raw.len(),
        nodes = shape.nodes,
        depth = shape.depth,
        "decoding token forest"
    );
    raw.iter().map(|token| decode_token(token, table)).collect()
}

fn decode_token(raw: &RawToken, table: &CategoryTable) -> Result<Token> {
    let label = raw.label.clone().unwrap_or_else(|| raw.id.clone());

    let Some(name) = raw.category.as_deref() else {
        if raw.operator.is_some() {
            return Err(QueryError::malformed(
                &raw.id,
                "operator kind given without operator category",
            ));
        }
        if raw.children.is_empty() {
            return Ok(Token::empty());
        }
        let children = decode_children(raw, table)?;
        return Ok(Token::group(&raw.id, label, Category::Group, children));
    };

    let category = table.resolve(name)?;

    if category == Category::Operator {
        let kind: OperatorKind = raw
            .operator
            .as_deref()
            .ok_or_else(|| QueryError::malformed(&raw.id, "operator token without kind"))?
            .parse()
            .map_err(|_| {
                QueryError::malformed(
                    &raw.id,
                    format!("unknown operator kind '{}'", raw.operator.as_deref().unwrap_or("")),
                )
            })?;
        let children = decode_children(raw, table)?;
        return Ok(Token::operator(&raw.id, label, kind, children));
    }

    if raw.operator.is_some() {
        return Err(QueryError::malformed(
            &raw.id,
            format!("{category} token cannot carry an operator kind"),
        ));
    }

    if category.is_leaf() {
        if !raw.children.is_empty() {
            return Err(QueryError::malformed(
                &raw.id,
                format!("{category} tokens cannot have children"),
            ));
        }
        return Ok(Token::entity(&raw.id, label, category));
    }

    let children = decode_children(raw, table)?;
    Ok(Token::group(&raw.id, label, category, children))
}

fn decode_children(raw: &RawToken, table: &CategoryTable) -> Result<Vec<Token>> {
    raw.children
        .iter()
        .map(|child| decode_token(child, table))
        .collect()
}
