//! Canonicalizes a raw token forest before it reaches the compiler.
//!
//! Runs of adjacent operands are combined by strategy and deduplicated.
//! Explicit AND/OR markers between runs are left in place, so operator
//! precedence is only ever decided by the compiler.

use crate::compiler::{Compiler, OperatorPriority};
use crate::error::{QueryError, Result};
use crate::token::{Category, OperatorKind, Token, TokenKind, TreeLimits};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How adjacent top-level tokens are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorStrategy {
    /// OR within a category, AND across categories
    #[default]
    Smart,
    /// AND everything
    All,
    /// OR everything
    Any,
}

impl OperatorStrategy {
    fn id_prefix(&self) -> &'static str {
        match self {
            OperatorStrategy::Smart => "smart",
            OperatorStrategy::All => "all",
            OperatorStrategy::Any => "any",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OperatorNormalizer {
    limits: TreeLimits,
}

impl OperatorNormalizer {
    pub fn new(limits: TreeLimits) -> Self {
        Self { limits }
    }

    /// Normalize a forest into one tree.
    ///
    /// - no tokens gives the Empty token
    /// - a single token comes back unchanged
    /// - duplicate leaves (same id, same polarity) keep their first occurrence
    /// - nested AND/OR of the same kind are flattened
    ///
    /// A forest that still holds AND/OR markers is structured with the
    /// default priority. Use [`Self::normalize_forest`] and compile the result
    /// to pick another one.
    pub fn normalize(&self, tokens: &[Token], strategy: OperatorStrategy) -> Result<Token> {
        let mut forest = self.normalize_forest(tokens, strategy)?;
        if forest.len() <= 1 {
            return Ok(forest.pop().unwrap_or_else(Token::empty));
        }
        Compiler::new(self.limits)
            .compile(&forest, OperatorPriority::default())
            .map(|compiled| compiled.into_root())
    }

    /// Normalize every run of operands, keeping AND/OR markers between runs.
    ///
    /// The result alternates operand, marker, operand. NOT markers are bound
    /// to their operand. An operand that dedup removes entirely takes the
    /// marker in front of it along.
    pub fn normalize_forest(
        &self,
        tokens: &[Token],
        strategy: OperatorStrategy,
    ) -> Result<Vec<Token>> {
        self.limits.check_forest(tokens)?;

        let tokens: Vec<&Token> = tokens.iter().filter(|token| !token.is_empty()).collect();
        match tokens.as_slice() {
            [] => return Ok(Vec::new()),
            [single] if !single.is_marker() => {
                single.validate()?;
                return Ok(vec![(*single).clone()]);
            }
            _ => {}
        }

        for token in tokens.iter().filter(|token| !token.is_marker()) {
            token.validate()?;
        }

        let sequence = combine_runs(&bind_negations(&tokens)?, strategy);
        check_alternation(&sequence)?;
        let combined = self.limits.check_forest(&sequence)?;

        let forest = dedup_sequence(&sequence);
        let remaining = self.limits.check_forest(&forest)?;

        tracing::debug!(
            ?strategy,
            inputs = tokens.len(),
            removed_nodes = combined.nodes.saturating_sub(remaining.nodes),
            "normalized token forest"
        );
        Ok(forest)
    }
}

/// Attach NOT markers to the operand that follows them so a negated token
/// takes part in combination as one unit.
fn bind_negations(tokens: &[&Token]) -> Result<Vec<Token>> {
    let mut bound = Vec::with_capacity(tokens.len());
    let mut negations: Vec<&Token> = Vec::new();

    for token in tokens {
        match token.kind() {
            TokenKind::Operator {
                kind: OperatorKind::Not,
                children,
            } if children.is_empty() => negations.push(*token),
            _ if !negations.is_empty() && token.is_marker() => {
                return Err(QueryError::malformed(
                    token.id(),
                    "binary operator directly after NOT",
                ));
            }
            _ if token.is_marker() => bound.push((*token).clone()),
            _ => {
                let mut operand = (*token).clone();
                for marker in negations.drain(..).rev() {
                    operand = Token::operator(
                        marker.id(),
                        marker.label(),
                        OperatorKind::Not,
                        vec![operand],
                    );
                }
                bound.push(operand);
            }
        }
    }

    if let Some(marker) = negations.last() {
        return Err(QueryError::malformed(
            marker.id(),
            "expression ends without an operand",
        ));
    }
    Ok(bound)
}

/// Combine every run of adjacent operands into one operand; markers between
/// runs are kept for the compiler.
fn combine_runs(tokens: &[Token], strategy: OperatorStrategy) -> Vec<Token> {
    let mut ids = SynthIds::default();
    let mut sequence = Vec::new();
    let mut run: Vec<&Token> = Vec::new();

    for token in tokens {
        if token.is_marker() {
            if !run.is_empty() {
                sequence.push(combine(&run, strategy, &mut ids));
                run.clear();
            }
            sequence.push(token.clone());
        } else {
            run.push(token);
        }
    }
    if !run.is_empty() {
        sequence.push(combine(&run, strategy, &mut ids));
    }
    sequence
}

/// Markers must sit between two operands once NOT is bound.
fn check_alternation(sequence: &[Token]) -> Result<()> {
    let mut expect_operand = true;
    for token in sequence {
        if token.is_marker() && expect_operand {
            return Err(QueryError::malformed(
                token.id(),
                format!("{} is missing its left operand", marker_name(token)),
            ));
        }
        expect_operand = token.is_marker();
    }
    match sequence.last() {
        Some(last) if last.is_marker() => Err(QueryError::malformed(
            last.id(),
            format!("{} is missing its right operand", marker_name(last)),
        )),
        _ => Ok(()),
    }
}

fn marker_name(token: &Token) -> &'static str {
    token
        .operator_kind()
        .map(|kind| kind.canonical_name())
        .unwrap_or("operator")
}

/// Dedup across the whole sequence in order, dropping the marker in front of
/// any operand that disappears.
fn dedup_sequence(sequence: &[Token]) -> Vec<Token> {
    let mut seen = HashSet::new();
    let mut forest = Vec::with_capacity(sequence.len());
    let mut pending: Option<&Token> = None;

    for token in sequence {
        if token.is_marker() {
            pending = Some(token);
            continue;
        }
        let Some(operand) = rewrite(token, &mut seen, false) else {
            continue;
        };
        match pending.take() {
            Some(marker) if !forest.is_empty() => forest.push(marker.clone()),
            _ => {}
        }
        forest.push(operand);
    }
    forest
}

/// Ids for synthesized operators, unique within one normalization.
///
/// The first use of a name is bare; later uses get `-2`, `-3`, ...
#[derive(Default)]
struct SynthIds {
    used: HashMap<String, usize>,
}

impl SynthIds {
    fn next(&mut self, prefix: &str, name: &str) -> String {
        let base = format!("{prefix}-{name}");
        let count = self.used.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}-{count}")
        }
    }
}

fn combine(run: &[&Token], strategy: OperatorStrategy, ids: &mut SynthIds) -> Token {
    if let [single] = run {
        return (*single).clone();
    }

    let kind = match strategy {
        OperatorStrategy::Smart => return smart_combine(run, ids),
        OperatorStrategy::All => OperatorKind::And,
        OperatorStrategy::Any => OperatorKind::Or,
    };
    let id = ids.next(strategy.id_prefix(), &kind.canonical_name().to_lowercase());
    join(kind, id, run.iter().map(|token| (*token).clone()).collect())
}

/// OR consecutive tokens of one category, then AND the groups in order.
fn smart_combine(run: &[&Token], ids: &mut SynthIds) -> Token {
    let mut groups: Vec<(Option<Category>, Vec<Token>)> = Vec::new();

    for token in run {
        let category = uniform_category(token);
        match groups.last_mut() {
            Some((last, members)) if category.is_some() && *last == category => {
                members.push((*token).clone())
            }
            _ => groups.push((category, vec![(*token).clone()])),
        }
    }

    let mut conjuncts = Vec::with_capacity(groups.len());
    for (category, mut members) in groups {
        match category {
            Some(category) if members.len() > 1 => {
                let id = ids.next("smart-or", category.canonical_name());
                conjuncts.push(join(OperatorKind::Or, id, members));
            }
            _ => conjuncts.append(&mut members),
        }
    }

    if conjuncts.len() == 1 {
        conjuncts.remove(0)
    } else {
        join(OperatorKind::And, ids.next("smart", "and"), conjuncts)
    }
}

/// Category shared by a token, looking through OR nodes only.
fn uniform_category(token: &Token) -> Option<Category> {
    match token.kind() {
        TokenKind::Empty => None,
        TokenKind::Entity(category) | TokenKind::Group { category, .. } => Some(*category),
        TokenKind::Operator {
            kind: OperatorKind::Or,
            children,
        } => {
            let first = uniform_category(children.first()?)?;
            children[1..]
                .iter()
                .all(|child| uniform_category(child) == Some(first))
                .then_some(first)
        }
        TokenKind::Operator { .. } => None,
    }
}

fn join(kind: OperatorKind, id: String, members: Vec<Token>) -> Token {
    Token::operator(id, kind.canonical_name(), kind, members)
}

/// Dedup leaves and flatten same-kind nesting, building a new tree.
///
/// Dedup is keyed by (id, negated) so `A AND NOT A` keeps both sides. Returns
/// `None` when nothing of the subtree survives.
fn rewrite(token: &Token, seen: &mut HashSet<(String, bool)>, negated: bool) -> Option<Token> {
    match token.kind() {
        TokenKind::Empty => None,
        TokenKind::Entity(_) => seen
            .insert((token.id().to_string(), negated))
            .then(|| token.clone()),
        TokenKind::Group { children, .. } => {
            if !seen.insert((token.id().to_string(), negated)) {
                return None;
            }
            let children = children
                .iter()
                .filter_map(|child| rewrite(child, seen, negated))
                .collect();
            Some(token.with_children(children))
        }
        TokenKind::Operator {
            kind: OperatorKind::Not,
            children,
        } => {
            let child = rewrite(children.first()?, seen, !negated)?;
            Some(token.with_children(vec![child]))
        }
        TokenKind::Operator { kind, children } => {
            let mut survivors = Vec::with_capacity(children.len());
            for child in children {
                let Some(child) = rewrite(child, seen, negated) else {
                    continue;
                };
                if child.operator_kind() == Some(*kind) {
                    survivors.extend(child.children().iter().cloned());
                } else {
                    survivors.push(child);
                }
            }
            match survivors.len() {
                0 => None,
                1 => survivors.pop(),
                _ => Some(token.with_children(survivors)),
            }
        }
    }
}
