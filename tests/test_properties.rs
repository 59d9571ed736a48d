use proptest::prelude::*;
use query_compiler::config::DestinationTable;
use query_compiler::{
    Category, Compiler, EntityExtractor, FilterMode, FilterSerializer, OperatorKind,
    OperatorNormalizer, OperatorPriority, OperatorStrategy, SearchScope, Token, TreeLimits,
    build_destination_value,
};

const LEAF_CATEGORIES: [Category; 4] = [
    Category::Organisation,
    Category::Instrument,
    Category::Language,
    Category::Topic,
];

fn arb_leaf() -> impl Strategy<Value = Token> {
    (0..LEAF_CATEGORIES.len(), 0..40u32).prop_map(|(idx, n)| {
        let category = LEAF_CATEGORIES[idx];
        // Labels deliberately out of id order.
        Token::entity(
            format!("{category}-{n}"),
            format!("{} {:02}", category.element_name(), (n * 7) % 40),
            category,
        )
    })
}

fn arb_tree() -> impl Strategy<Value = Token> {
    arb_leaf().prop_recursive(4, 64, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..4)
                .prop_map(|children| Token::operator("and", "AND", OperatorKind::And, children)),
            prop::collection::vec(inner.clone(), 2..4)
                .prop_map(|children| Token::operator("or", "OR", OperatorKind::Or, children)),
            inner
                .clone()
                .prop_map(|child| Token::operator("not", "NOT", OperatorKind::Not, vec![child])),
            (0..5u32, prop::collection::vec(inner, 0..4)).prop_map(|(n, children)| {
                Token::group(
                    format!("pf-{n}"),
                    format!("Portfolio {n}"),
                    Category::Portfolio,
                    children,
                )
            }),
        ]
    })
}

fn arb_forest() -> impl Strategy<Value = Vec<Token>> {
    prop::collection::vec(arb_tree(), 0..5)
}

fn arb_strategy() -> impl Strategy<Value = OperatorStrategy> {
    prop_oneof![
        Just(OperatorStrategy::Smart),
        Just(OperatorStrategy::All),
        Just(OperatorStrategy::Any),
    ]
}

/// Walk to every Organisation reachable without entering an Instrument.
fn visible_organisations(token: &Token, out: &mut Vec<String>) {
    match token.category() {
        Some(Category::Organisation) => out.push(token.id().to_string()),
        Some(Category::Instrument) => {}
        _ => {
            for child in token.children() {
                visible_organisations(child, out);
            }
        }
    }
}

fn tag_depth_is_balanced(markup: &str) -> bool {
    let mut depth: i64 = 0;
    let mut rest = markup;
    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            return false;
        };
        let tag = &rest[start..start + len + 1];
        if tag.starts_with("</") {
            depth -= 1;
        } else if !tag.ends_with("/>") {
            depth += 1;
        }
        if depth < 0 {
            return false;
        }
        rest = &rest[start + len + 1..];
    }
    depth == 0
}

fn leaf_ids(token: &Token, out: &mut Vec<String>) {
    if token.children().is_empty() {
        out.push(token.id().to_string());
    }
    for child in token.children() {
        leaf_ids(child, out);
    }
}

proptest! {
    #[test]
    fn compile_after_normalize_is_idempotent(forest in arb_forest(), strategy in arb_strategy()) {
        let normalized = OperatorNormalizer::default().normalize(&forest, strategy).unwrap();
        let compiler = Compiler::default();
        let once = compiler
            .compile(std::slice::from_ref(&normalized), OperatorPriority::Boolean)
            .unwrap()
            .into_root();
        let twice = compiler
            .compile(std::slice::from_ref(&once), OperatorPriority::Boolean)
            .unwrap()
            .into_root();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn smart_normalization_keeps_first_seen_leaf_order(
        leaves in prop::collection::vec(arb_leaf(), 0..10)
    ) {
        let normalized = OperatorNormalizer::default()
            .normalize(&leaves, OperatorStrategy::Smart)
            .unwrap();
        let mut expected: Vec<String> = Vec::new();
        for leaf in &leaves {
            if !expected.iter().any(|id| id == leaf.id()) {
                expected.push(leaf.id().to_string());
            }
        }
        let mut actual = Vec::new();
        if !normalized.is_empty() {
            leaf_ids(&normalized, &mut actual);
        }
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn normalized_trees_are_valid(forest in arb_forest(), strategy in arb_strategy()) {
        let normalized = OperatorNormalizer::default().normalize(&forest, strategy).unwrap();
        prop_assert!(normalized.validate().is_ok());
    }

    #[test]
    fn extraction_is_capped_sorted_and_unique(tree in arb_tree(), cap in 1usize..12) {
        let extractor = EntityExtractor::new(TreeLimits::default(), cap);
        let found = extractor.extract(Category::Organisation, &tree).unwrap();

        prop_assert!(found.len() <= cap);
        prop_assert!(found.windows(2).all(|pair| pair[0].label() <= pair[1].label()));
        let mut ids: Vec<&str> = found.iter().map(Token::id).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), found.len());
    }

    #[test]
    fn extraction_never_looks_inside_instruments(tree in arb_tree()) {
        let found = EntityExtractor::new(TreeLimits::default(), usize::MAX)
            .extract(Category::Organisation, &tree)
            .unwrap();
        let mut visible = Vec::new();
        visible_organisations(&tree, &mut visible);

        for token in &found {
            prop_assert_eq!(token.category(), Some(Category::Organisation));
            prop_assert!(visible.iter().any(|id| id == token.id()));
        }
    }

    #[test]
    fn rendered_markup_is_balanced(tree in arb_tree(), label in "[A-Za-z &<>\"']{0,12}") {
        let tree = Token::operator(
            "root",
            "AND",
            OperatorKind::And,
            vec![tree, Token::entity("x", label, Category::Keyword)],
        );
        let markup = FilterSerializer::default()
            .compile_filter(&tree, "filter", SearchScope::HeadlineOnly, FilterMode::Normal)
            .unwrap();
        prop_assert!(tag_depth_is_balanced(&markup), "unbalanced: {}", markup);
    }

    #[test]
    fn destination_preserves_order(
        repositories in prop::collection::vec(
            prop::sample::select(vec!["NewsWire", "NewsRoom", "WebNews", "Research"]),
            0..6,
        )
    ) {
        let table = DestinationTable::default();
        let value = build_destination_value(&repositories, &table).unwrap();
        let expected: Vec<&str> = repositories
            .iter()
            .map(|repository| table.code(repository).unwrap())
            .collect();
        prop_assert_eq!(&value, &expected.join(","));
        prop_assert_eq!(value, build_destination_value(&repositories, &table).unwrap());
    }
}
