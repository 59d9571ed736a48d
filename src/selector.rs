//! Selection of the organisations and languages a query is about.

use crate::compiler::{Compiler, OperatorPriority};
use crate::config::CompilerConfig;
use crate::error::Result;
use crate::extractor::EntityExtractor;
use crate::normalizer::{OperatorNormalizer, OperatorStrategy};
use crate::token::{Category, Token};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct EntitySelector {
    compiler: Compiler,
    normalizer: OperatorNormalizer,
    extractor: EntityExtractor,
}

impl EntitySelector {
    pub fn new(
        compiler: Compiler,
        normalizer: OperatorNormalizer,
        extractor: EntityExtractor,
    ) -> Self {
        Self {
            compiler,
            normalizer,
            extractor,
        }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        let limits = config.limits.tree();
        Self::new(
            Compiler::new(limits),
            OperatorNormalizer::new(limits),
            EntityExtractor::new(limits, config.limits.max_entities),
        )
    }

    /// Organisations reachable through operators and portfolios, never
    /// through instruments.
    pub fn public_organisations(&self, tokens: &[Token]) -> Result<Vec<Token>> {
        let compiled = self.compiler.compile(tokens, OperatorPriority::Boolean)?;
        self.extractor.extract(Category::Organisation, compiled.root())
    }

    /// Language tokens at the top level of the forest only.
    pub fn languages(tokens: &[Token]) -> Vec<Token> {
        tokens
            .iter()
            .filter(|token| token.category() == Some(Category::Language))
            .cloned()
            .collect()
    }

    /// Organisations followed by languages, deduped by id, normalized with
    /// the smart strategy.
    pub fn public_organisation_and_language_tokens(&self, tokens: &[Token]) -> Result<Token> {
        let organisations = self.public_organisations(tokens)?;
        let languages = Self::languages(tokens);

        let mut seen = HashSet::new();
        let union: Vec<Token> = organisations
            .into_iter()
            .chain(languages)
            .filter(|token| seen.insert(token.id().to_string()))
            .collect();

        self.normalizer.normalize(&union, OperatorStrategy::Smart)
    }
}
