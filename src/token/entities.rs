use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Organisation,
    Instrument,
    Language,
    Topic,
    Keyword,
    Portfolio,
    /// Anonymous grouping node (upstream token with children but no category)
    Group,
    Operator,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Organisation,
        Category::Instrument,
        Category::Language,
        Category::Topic,
        Category::Keyword,
        Category::Portfolio,
        Category::Group,
        Category::Operator,
    ];

    /// Get the canonical name of this category
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Category::Organisation => "organisation",
            Category::Instrument => "instrument",
            Category::Language => "language",
            Category::Topic => "topic",
            Category::Keyword => "keyword",
            Category::Portfolio => "portfolio",
            Category::Group => "group",
            Category::Operator => "operator",
        }
    }

    /// Element name used in filter markup
    pub fn element_name(&self) -> &'static str {
        match self {
            Category::Organisation => "Organisation",
            Category::Instrument => "Instrument",
            Category::Language => "Language",
            Category::Topic => "Topic",
            Category::Keyword => "Keyword",
            Category::Portfolio => "Portfolio",
            Category::Group => "Group",
            Category::Operator => "Operator",
        }
    }

    /// Leaf categories never carry children.
    pub fn is_leaf(&self) -> bool {
        match self {
            Category::Organisation
            | Category::Instrument
            | Category::Language
            | Category::Topic
            | Category::Keyword => true,
            Category::Portfolio | Category::Group | Category::Operator => false,
        }
    }
}

impl FromStr for Category {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.canonical_name() == lower)
            .ok_or_else(|| QueryError::UnknownCategory(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorKind {
    And,
    Or,
    Not,
}

impl OperatorKind {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            OperatorKind::And => "AND",
            OperatorKind::Or => "OR",
            OperatorKind::Not => "NOT",
        }
    }

    pub fn element_name(&self) -> &'static str {
        match self {
            OperatorKind::And => "And",
            OperatorKind::Or => "Or",
            OperatorKind::Not => "Not",
        }
    }

    /// AND and OR are n-ary and associative; NOT is unary.
    pub fn is_binary(&self) -> bool {
        !matches!(self, OperatorKind::Not)
    }

    /// Check the child count against this operator's arity.
    pub fn check_arity(&self, id: &str, count: usize) -> Result<()> {
        match self {
            OperatorKind::Not if count != 1 => Err(QueryError::malformed(
                id,
                format!("NOT needs exactly 1 child, found {count}"),
            )),
            OperatorKind::And | OperatorKind::Or if count < 2 => Err(QueryError::malformed(
                id,
                format!(
                    "{} needs at least 2 children, found {count}",
                    self.canonical_name()
                ),
            )),
            _ => Ok(()),
        }
    }
}

impl FromStr for OperatorKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "and" | "&&" => Ok(OperatorKind::And),
            "or" | "||" => Ok(OperatorKind::Or),
            "not" | "!" => Ok(OperatorKind::Not),
            _ => Err(QueryError::malformed(s, "unknown operator kind")),
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Shape of a token node.
#[derive(Debug, Clone)]
pub enum TokenKind {
    /// "No query"
    Empty,
    /// Leaf entity reference
    Entity(Category),
    /// Grouping node such as a portfolio
    Group {
        category: Category,
        children: Vec<Token>,
    },
    /// Boolean operator. A childless operator is an infix/prefix marker and
    /// is only meaningful inside a forest handed to the compiler.
    Operator {
        kind: OperatorKind,
        children: Vec<Token>,
    },
}

/// Node of the query expression tree.
///
/// Fields are private: construction is the only way to produce a token, every
/// later stage builds new nodes instead of mutating existing ones.
#[derive(Debug, Clone, Serialize)]
#[serde(into = "super::RawToken")]
pub struct Token {
    id: String,
    label: String,
    kind: TokenKind,
}

impl Token {
    pub fn empty() -> Self {
        Token {
            id: String::new(),
            label: String::new(),
            kind: TokenKind::Empty,
        }
    }

    pub fn entity(id: impl Into<String>, label: impl Into<String>, category: Category) -> Self {
        Token {
            id: id.into(),
            label: label.into(),
            kind: TokenKind::Entity(category),
        }
    }

    pub fn group(
        id: impl Into<String>,
        label: impl Into<String>,
        category: Category,
        children: Vec<Token>,
    ) -> Self {
        Token {
            id: id.into(),
            label: label.into(),
            kind: TokenKind::Group { category, children },
        }
    }

    pub fn operator(
        id: impl Into<String>,
        label: impl Into<String>,
        kind: OperatorKind,
        children: Vec<Token>,
    ) -> Self {
        Token {
            id: id.into(),
            label: label.into(),
            kind: TokenKind::Operator { kind, children },
        }
    }

    /// Childless operator used as an infix or prefix marker in a forest.
    pub fn marker(id: impl Into<String>, kind: OperatorKind) -> Self {
        let id = id.into();
        Token::operator(id, kind.canonical_name(), kind, Vec::new())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    /// Category of the node; `None` only for the Empty token.
    pub fn category(&self) -> Option<Category> {
        match &self.kind {
            TokenKind::Empty => None,
            TokenKind::Entity(category) | TokenKind::Group { category, .. } => Some(*category),
            TokenKind::Operator { .. } => Some(Category::Operator),
        }
    }

    pub fn operator_kind(&self) -> Option<OperatorKind> {
        match &self.kind {
            TokenKind::Operator { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Token] {
        match &self.kind {
            TokenKind::Group { children, .. } | TokenKind::Operator { children, .. } => children,
            TokenKind::Empty | TokenKind::Entity(_) => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, TokenKind::Empty)
    }

    pub fn is_marker(&self) -> bool {
        matches!(&self.kind, TokenKind::Operator { children, .. } if children.is_empty())
    }

    /// New node with the same identity and kind but different children.
    /// Leaves and the Empty token are returned as-is.
    pub(crate) fn with_children(&self, children: Vec<Token>) -> Token {
        let kind = match &self.kind {
            TokenKind::Group { category, .. } => TokenKind::Group {
                category: *category,
                children,
            },
            TokenKind::Operator { kind, .. } => TokenKind::Operator {
                kind: *kind,
                children,
            },
            other => other.clone(),
        };
        Token {
            id: self.id.clone(),
            label: self.label.clone(),
            kind,
        }
    }

    /// Node count and depth of this tree.
    pub fn measure(&self) -> TreeShape {
        measure(std::slice::from_ref(self))
    }

    /// Check arity and leaf invariants over the whole tree.
    ///
    /// Iterative, so it is safe on trees that have not been size-checked yet.
    pub fn validate(&self) -> Result<()> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match &node.kind {
                TokenKind::Empty => {}
                TokenKind::Entity(Category::Operator) => {
                    return Err(QueryError::malformed(
                        &node.id,
                        "operator category without operator kind",
                    ));
                }
                TokenKind::Entity(_) => {}
                TokenKind::Group { category, children } => {
                    if *category == Category::Operator {
                        return Err(QueryError::malformed(
                            &node.id,
                            "operator category without operator kind",
                        ));
                    }
                    if category.is_leaf() && !children.is_empty() {
                        return Err(QueryError::malformed(
                            &node.id,
                            format!("{category} tokens cannot have children"),
                        ));
                    }
                    stack.extend(children.iter());
                }
                TokenKind::Operator { kind, children } => {
                    kind.check_arity(&node.id, children.len())?;
                    stack.extend(children.iter());
                }
            }
        }
        Ok(())
    }
}

/// Structural equality: category, operator kind, id and children. Labels are
/// display-only and do not participate.
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        if self.id != other.id {
            return false;
        }
        match (&self.kind, &other.kind) {
            (TokenKind::Empty, TokenKind::Empty) => true,
            (TokenKind::Entity(a), TokenKind::Entity(b)) => a == b,
            (
                TokenKind::Group {
                    category: a,
                    children: ca,
                },
                TokenKind::Group {
                    category: b,
                    children: cb,
                },
            ) => a == b && ca == cb,
            (
                TokenKind::Operator {
                    kind: a,
                    children: ca,
                },
                TokenKind::Operator {
                    kind: b,
                    children: cb,
                },
            ) => a == b && ca == cb,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl fmt::Display for Token {
    /// Compact one-line rendering, e.g. `OR(Apple, NOT(English))`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Empty => f.write_str("<empty>"),
            TokenKind::Entity(_) => f.write_str(&self.label),
            TokenKind::Group { children, .. } | TokenKind::Operator { children, .. } => {
                let head = match self.operator_kind() {
                    Some(kind) => kind.canonical_name(),
                    None => self.label.as_str(),
                };
                write!(f, "{head}(")?;
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Anything shaped like a tree of owned children.
pub trait TreeNode {
    fn child_nodes(&self) -> &[Self]
    where
        Self: Sized;
}

impl TreeNode for Token {
    fn child_nodes(&self) -> &[Self] {
        self.children()
    }
}

/// Total node count and maximum depth of a forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeShape {
    pub nodes: usize,
    pub depth: usize,
}

/// Measure a forest without recursion.
pub fn measure<T: TreeNode>(roots: &[T]) -> TreeShape {
    let mut shape = TreeShape::default();
    let mut stack: Vec<(&T, usize)> = roots.iter().map(|root| (root, 1)).collect();
    while let Some((node, depth)) = stack.pop() {
        shape.nodes += 1;
        shape.depth = shape.depth.max(depth);
        stack.extend(node.child_nodes().iter().map(|child| (child, depth + 1)));
    }
    shape
}

/// Hard upper bound on `max_depth`. Deeper trees would overflow the stack of
/// the recursive stages whatever a profile asks for.
pub const MAX_DEPTH_CEILING: usize = 512;

/// Safety bounds applied by every pipeline stage before it recurses.
///
/// `max_depth` is clamped to [`MAX_DEPTH_CEILING`] when checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeLimits {
    pub max_nodes: usize,
    pub max_depth: usize,
}

impl Default for TreeLimits {
    fn default() -> Self {
        Self {
            max_nodes: 10_000,
            max_depth: 128,
        }
    }
}

impl TreeLimits {
    /// Depth actually enforced.
    pub fn depth_limit(&self) -> usize {
        self.max_depth.min(MAX_DEPTH_CEILING)
    }

    pub fn check(&self, shape: TreeShape) -> Result<TreeShape> {
        if shape.nodes > self.max_nodes {
            return Err(QueryError::OversizeTree {
                measure: "node count",
                actual: shape.nodes,
                limit: self.max_nodes,
            });
        }
        let max_depth = self.depth_limit();
        if shape.depth > max_depth {
            return Err(QueryError::OversizeTree {
                measure: "depth",
                actual: shape.depth,
                limit: max_depth,
            });
        }
        Ok(shape)
    }

    pub fn check_forest<T: TreeNode>(&self, roots: &[T]) -> Result<TreeShape> {
        self.check(measure(roots))
    }
}
