//! Collects the tokens of one category from a compiled tree.

use crate::error::Result;
use crate::token::{Category, Token, TreeLimits};
use std::collections::HashSet;

/// Default cap on extracted entities.
pub const MAX_ENTITIES: usize = 100;

/// What the visitor does with a node that is not the target category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descent {
    /// Never looked into
    Opaque,
    /// Children are visited
    Transparent,
    /// Contributes nothing
    Leaf,
}

/// Descent policy per category. A new category needs one line here.
pub fn descent_policy(category: Category) -> Descent {
    match category {
        Category::Instrument => Descent::Opaque,
        Category::Operator => Descent::Transparent,
        Category::Portfolio => Descent::Transparent,
        Category::Group => Descent::Transparent,
        Category::Organisation => Descent::Leaf,
        Category::Language => Descent::Leaf,
        Category::Topic => Descent::Leaf,
        Category::Keyword => Descent::Leaf,
    }
}

#[derive(Debug, Clone)]
pub struct EntityExtractor {
    limits: TreeLimits,
    max_entities: usize,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new(TreeLimits::default(), MAX_ENTITIES)
    }
}

impl EntityExtractor {
    pub fn new(limits: TreeLimits, max_entities: usize) -> Self {
        Self {
            limits,
            max_entities,
        }
    }

    /// Collect tokens of `target` depth-first, then dedup by id (first wins),
    /// sort by label and cap.
    ///
    /// A matching node is collected without looking at its children. The Empty
    /// token and childless groups yield nothing.
    pub fn extract(&self, target: Category, root: &Token) -> Result<Vec<Token>> {
        self.limits.check(root.measure())?;

        let mut found = Vec::new();
        collect(target, root, &mut found);

        let mut seen = HashSet::new();
        let mut entities: Vec<Token> = found
            .into_iter()
            .filter(|token| seen.insert(token.id()))
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.label().cmp(b.label()));

        let total = entities.len();
        entities.truncate(self.max_entities);
        tracing::debug!(
            %target,
            found = total,
            returned = entities.len(),
            "extracted entities"
        );
        Ok(entities)
    }
}

fn collect<'t>(target: Category, node: &'t Token, found: &mut Vec<&'t Token>) {
    let Some(category) = node.category() else {
        return;
    };
    if category == target {
        found.push(node);
        return;
    }
    match descent_policy(category) {
        Descent::Transparent => {
            for child in node.children() {
                collect(target, child, found);
            }
        }
        Descent::Opaque | Descent::Leaf => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::OperatorKind;

    #[test]
    fn test_every_category_has_a_policy() {
        for category in Category::ALL {
            let descent = descent_policy(category);
            assert_eq!(
                descent == Descent::Transparent,
                !category.is_leaf(),
                "{category} policy disagrees with leaf-ness"
            );
        }
        assert_eq!(descent_policy(Category::Instrument), Descent::Opaque);
    }

    #[test]
    fn test_matching_group_is_collected_without_descending() {
        let inner = Token::group("p2", "Inner", Category::Portfolio, vec![]);
        let outer = Token::group("p1", "Outer", Category::Portfolio, vec![inner]);
        let found = EntityExtractor::default()
            .extract(Category::Portfolio, &outer)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "p1");
    }

    #[test]
    fn test_instruments_are_collected_when_targeted() {
        let tree = Token::operator(
            "x",
            "OR",
            OperatorKind::Or,
            vec![
                Token::entity("r2", "VOD.L", Category::Instrument),
                Token::entity("r1", "AAPL.O", Category::Instrument),
            ],
        );
        let labels: Vec<String> = EntityExtractor::default()
            .extract(Category::Instrument, &tree)
            .unwrap()
            .iter()
            .map(|t| t.label().to_string())
            .collect();
        assert_eq!(labels, vec!["AAPL.O", "VOD.L"]);
    }

    #[test]
    fn test_cap_is_configurable() {
        let tree = Token::group(
            "p",
            "P",
            Category::Portfolio,
            (0..5)
                .map(|i| Token::entity(format!("o{i}"), format!("Org {i}"), Category::Organisation))
                .collect(),
        );
        let found = EntityExtractor::new(TreeLimits::default(), 2)
            .extract(Category::Organisation, &tree)
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].label(), "Org 1");
    }
}
