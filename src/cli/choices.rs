use crate::compiler::OperatorPriority;
use crate::filter::{FilterMode, SearchScope};
use crate::normalizer::OperatorStrategy;
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// How top-level tokens are combined before compiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StrategyChoice {
    /// OR within a category, AND across categories
    #[default]
    Smart,
    /// AND everything
    All,
    /// OR everything
    Any,
}

impl From<StrategyChoice> for OperatorStrategy {
    fn from(choice: StrategyChoice) -> Self {
        match choice {
            StrategyChoice::Smart => OperatorStrategy::Smart,
            StrategyChoice::All => OperatorStrategy::All,
            StrategyChoice::Any => OperatorStrategy::Any,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PriorityChoice {
    /// NOT before AND before OR
    #[default]
    Boolean,
    /// Binary operators in reading order
    LeftToRight,
}

impl From<PriorityChoice> for OperatorPriority {
    fn from(choice: PriorityChoice) -> Self {
        match choice {
            PriorityChoice::Boolean => OperatorPriority::Boolean,
            PriorityChoice::LeftToRight => OperatorPriority::LeftToRight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ScopeChoice {
    #[default]
    HeadlineOnly,
    FullText,
}

impl From<ScopeChoice> for SearchScope {
    fn from(choice: ScopeChoice) -> Self {
        match choice {
            ScopeChoice::HeadlineOnly => SearchScope::HeadlineOnly,
            ScopeChoice::FullText => SearchScope::FullText,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModeChoice {
    #[default]
    Normal,
    Significant,
}

impl From<ModeChoice> for FilterMode {
    fn from(choice: ModeChoice) -> Self {
        match choice {
            ModeChoice::Normal => FilterMode::Normal,
            ModeChoice::Significant => FilterMode::Significant,
        }
    }
}
