//! Operator-precedence compilation of a token forest into one boolean tree.
//!
//! Inside a forest, a childless operator token is a marker: AND/OR are infix,
//! NOT is prefix. Adjacent operands without a marker between them are joined
//! by an implicit AND. Operator tokens that already carry children are
//! operands and are validated, never repaired.

use crate::error::{QueryError, Result};
use crate::token::{OperatorKind, Token, TokenKind, TreeLimits};
use serde::{Deserialize, Serialize};
use std::iter::Peekable;
use std::slice::Iter;

/// Operator joining adjacent operands that have no marker between them,
/// under every priority.
pub const IMPLICIT_OPERATOR: OperatorKind = OperatorKind::And;

/// Relative binding of the boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperatorPriority {
    /// NOT binds tighter than AND, AND tighter than OR
    #[default]
    Boolean,
    /// AND and OR share one level and associate left
    LeftToRight,
}

impl OperatorPriority {
    fn binding_power(&self, kind: OperatorKind) -> u8 {
        match (self, kind) {
            (_, OperatorKind::Not) => 3,
            (OperatorPriority::Boolean, OperatorKind::And) => 2,
            (OperatorPriority::Boolean, OperatorKind::Or) => 1,
            (OperatorPriority::LeftToRight, _) => 1,
        }
    }
}

/// Root produced by the compiler plus the priority used to structure it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledExpression {
    pub root: Token,
    pub priority: OperatorPriority,
}

impl CompiledExpression {
    pub fn root(&self) -> &Token {
        &self.root
    }

    pub fn into_root(self) -> Token {
        self.root
    }
}

/// The single entry point every caller routes through to get a boolean tree.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    limits: TreeLimits,
}

impl Compiler {
    pub fn new(limits: TreeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &TreeLimits {
        &self.limits
    }

    /// Compile a forest into one tree.
    ///
    /// Idempotent: compiling `[compile(x).root]` again yields a tree-equal root.
    pub fn compile(
        &self,
        tokens: &[Token],
        priority: OperatorPriority,
    ) -> Result<CompiledExpression> {
        let input = self.limits.check_forest(tokens)?;
        let parsed = parse_sequence(tokens, priority)?;

        // Prefix chains and implicit joins add nodes the input never had.
        self.limits.check(parsed.measure())?;
        let root = canonicalize(&parsed)?;

        tracing::debug!(
            ?priority,
            input_nodes = input.nodes,
            output_nodes = root.measure().nodes,
            "compiled token forest"
        );
        Ok(CompiledExpression { root, priority })
    }
}

enum Item<'a> {
    Operand(&'a Token),
    Marker(&'a Token, OperatorKind),
}

/// Resolve a flat forest of operands and markers into one tree by precedence.
///
/// Operands are cloned as-is; the caller canonicalizes the result.
fn parse_sequence(tokens: &[Token], priority: OperatorPriority) -> Result<Token> {
    let items: Vec<Item<'_>> = tokens
        .iter()
        .filter(|token| !token.is_empty())
        .map(|token| match token.kind() {
            TokenKind::Operator { kind, children } if children.is_empty() => {
                Item::Marker(token, *kind)
            }
            _ => Item::Operand(token),
        })
        .collect();

    if items.is_empty() {
        return Ok(Token::empty());
    }

    let mut parser = SequenceParser {
        items: items.iter().peekable(),
        priority,
        implicit_count: 0,
    };
    let root = parser.expression(0)?;

    if let Some(item) = parser.items.next() {
        let id = match item {
            Item::Operand(token) | Item::Marker(token, _) => token.id(),
        };
        return Err(QueryError::malformed(id, "unexpected token after expression"));
    }
    Ok(root)
}

struct SequenceParser<'s, 'a> {
    items: Peekable<Iter<'s, Item<'a>>>,
    priority: OperatorPriority,
    implicit_count: usize,
}

impl SequenceParser<'_, '_> {
    fn expression(&mut self, min_power: u8) -> Result<Token> {
        let mut lhs = self.prefixed()?;

        loop {
            let (kind, marker) = match self.items.peek() {
                None => break,
                Some(Item::Marker(marker, kind)) if kind.is_binary() => (*kind, Some(*marker)),
                // An operand or NOT right after an operand is a juxtaposition.
                Some(_) => (IMPLICIT_OPERATOR, None),
            };

            let power = self.priority.binding_power(kind);
            if power < min_power {
                break;
            }
            if let Some(marker) = marker {
                self.items.next();
                if self.items.peek().is_none() {
                    return Err(QueryError::malformed(
                        marker.id(),
                        format!("{kind} is missing its right operand"),
                    ));
                }
            }

            let rhs = self.expression(power + 1)?;
            let (id, label) = match marker {
                Some(marker) => (marker.id().to_string(), marker.label().to_string()),
                None => {
                    self.implicit_count += 1;
                    let id = format!(
                        "implicit-{}-{}",
                        kind.element_name().to_lowercase(),
                        self.implicit_count
                    );
                    (id, kind.canonical_name().to_string())
                }
            };
            lhs = Token::operator(id, label, kind, vec![lhs, rhs]);
        }

        Ok(lhs)
    }

    /// Operand with any number of NOT markers in front of it.
    fn prefixed(&mut self) -> Result<Token> {
        let mut negations: Vec<&Token> = Vec::new();

        loop {
            match self.items.next() {
                Some(Item::Marker(marker, OperatorKind::Not)) => negations.push(*marker),
                Some(Item::Marker(marker, kind)) => {
                    return Err(QueryError::malformed(
                        marker.id(),
                        format!("{kind} is missing its left operand"),
                    ));
                }
                Some(Item::Operand(operand)) => {
                    let mut token = (*operand).clone();
                    for marker in negations.into_iter().rev() {
                        token = Token::operator(
                            marker.id(),
                            marker.label(),
                            OperatorKind::Not,
                            vec![token],
                        );
                    }
                    return Ok(token);
                }
                None => {
                    let id = negations.last().map(|marker| marker.id()).unwrap_or_default();
                    return Err(QueryError::malformed(id, "expression ends without an operand"));
                }
            }
        }
    }
}

/// Validate arity and flatten nested same-kind AND/OR nodes.
///
/// Callers must have checked the tree against `TreeLimits` first.
fn canonicalize(token: &Token) -> Result<Token> {
    match token.kind() {
        TokenKind::Empty | TokenKind::Entity(_) => {
            token.validate()?;
            Ok(token.clone())
        }
        TokenKind::Group { category, children } => {
            if category.is_leaf() && !children.is_empty() {
                return Err(QueryError::malformed(
                    token.id(),
                    format!("{category} tokens cannot have children"),
                ));
            }
            let children = children
                .iter()
                .map(canonicalize)
                .collect::<Result<Vec<_>>>()?;
            let rebuilt = token.with_children(children);
            rebuilt.validate()?;
            Ok(rebuilt)
        }
        TokenKind::Operator { kind, children } => {
            kind.check_arity(token.id(), children.len())?;

            let mut flattened = Vec::with_capacity(children.len());
            for child in children {
                let child = canonicalize(child)?;
                if kind.is_binary() && child.operator_kind() == Some(*kind) {
                    flattened.extend(child.children().iter().cloned());
                } else {
                    flattened.push(child);
                }
            }
            Ok(token.with_children(flattened))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Category;

    fn org(id: &str) -> Token {
        Token::entity(id, id, Category::Organisation)
    }

    fn marker(id: &str, kind: OperatorKind) -> Token {
        Token::marker(id, kind)
    }

    fn compile(tokens: &[Token], priority: OperatorPriority) -> Token {
        Compiler::default()
            .compile(tokens, priority)
            .expect("compiles")
            .into_root()
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let root = compile(
            &[
                org("a"),
                marker("m1", OperatorKind::Or),
                org("b"),
                marker("m2", OperatorKind::And),
                org("c"),
            ],
            OperatorPriority::Boolean,
        );
        assert_eq!(root.to_string(), "OR(a, AND(b, c))");
        assert_eq!(root.id(), "m1");
    }

    #[test]
    fn test_left_to_right_ignores_precedence() {
        let root = compile(
            &[
                org("a"),
                marker("m1", OperatorKind::Or),
                org("b"),
                marker("m2", OperatorKind::And),
                org("c"),
            ],
            OperatorPriority::LeftToRight,
        );
        assert_eq!(root.to_string(), "AND(OR(a, b), c)");
    }

    #[test]
    fn test_not_binds_to_next_operand() {
        let root = compile(
            &[
                marker("n", OperatorKind::Not),
                org("a"),
                marker("m", OperatorKind::Or),
                org("b"),
            ],
            OperatorPriority::Boolean,
        );
        assert_eq!(root.to_string(), "OR(NOT(a), b)");
    }

    #[test]
    fn test_juxtaposition_uses_implicit_and() {
        let root = compile(&[org("a"), org("b"), org("c")], OperatorPriority::Boolean);
        assert_eq!(root.to_string(), "AND(a, b, c)");
        assert_eq!(root.children().len(), 3);
    }

    #[test]
    fn test_juxtaposition_ignores_priority() {
        for priority in [OperatorPriority::Boolean, OperatorPriority::LeftToRight] {
            let root = compile(
                &[org("a"), org("b"), marker("m", OperatorKind::Or), org("c")],
                priority,
            );
            assert_eq!(root.to_string(), "OR(AND(a, b), c)");
            assert_eq!(root.children()[0].id(), "implicit-and-1");
            assert_eq!(root.children()[0].operator_kind(), Some(IMPLICIT_OPERATOR));
        }
    }

    #[test]
    fn test_same_kind_nesting_is_flattened() {
        let nested = Token::operator(
            "outer",
            "AND",
            OperatorKind::And,
            vec![
                org("a"),
                Token::operator("inner", "AND", OperatorKind::And, vec![org("b"), org("c")]),
            ],
        );
        let root = compile(&[nested], OperatorPriority::Boolean);
        assert_eq!(root.id(), "outer");
        assert_eq!(root.to_string(), "AND(a, b, c)");
    }

    #[test]
    fn test_dangling_marker_is_malformed() {
        let err = Compiler::default()
            .compile(&[org("a"), marker("m", OperatorKind::And)], OperatorPriority::Boolean)
            .unwrap_err();
        assert_eq!(err, QueryError::malformed("m", "AND is missing its right operand"));

        let err = Compiler::default()
            .compile(&[marker("m", OperatorKind::Or), org("a")], OperatorPriority::Boolean)
            .unwrap_err();
        assert!(matches!(err, QueryError::MalformedTree { .. }));
    }

    #[test]
    fn test_invalid_subtree_is_rejected_not_repaired() {
        let bad = Token::operator("x", "OR", OperatorKind::Or, vec![org("a")]);
        let err = Compiler::default()
            .compile(&[bad], OperatorPriority::Boolean)
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::MalformedTree {
                id: "x".to_string(),
                reason: "OR needs at least 2 children, found 1".to_string()
            }
        );
    }

    #[test]
    fn test_empty_forest_compiles_to_empty() {
        assert!(compile(&[], OperatorPriority::Boolean).is_empty());
        assert!(compile(&[Token::empty()], OperatorPriority::Boolean).is_empty());
    }

    #[test]
    fn test_oversize_forest_is_rejected() {
        let compiler = Compiler::new(TreeLimits {
            max_nodes: 2,
            max_depth: 8,
        });
        let err = compiler
            .compile(&[org("a"), org("b"), org("c")], OperatorPriority::Boolean)
            .unwrap_err();
        assert!(matches!(err, QueryError::OversizeTree { .. }));
    }
}
