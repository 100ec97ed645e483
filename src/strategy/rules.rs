//! Declarative strategy rules
//!
//! Rules are the serializable, configuration-side description of a strategy.
//! Building a rule yields a fresh strategy instance, so every job attempt
//! starts with strategies that hold no state from a previous attempt.

use crate::strategy::selector::DEFAULT_COUNT_PATTERN;
use crate::strategy::{
    ExtractionStrategy, NextLinkPagination, PaginationStrategy, SelectorCountExtraction,
    SelectorRegexExtraction, StrategyError,
};
use serde::{Deserialize, Serialize};

fn default_pattern() -> String {
    DEFAULT_COUNT_PATTERN.to_string()
}

/// How to extract a count from a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExtractionRule {
    /// Read a number out of the text of the first element matching `selector`
    SelectorRegex {
        selector: String,
        #[serde(default = "default_pattern")]
        pattern: String,
    },

    /// Count the elements matching `selector`
    SelectorCount { selector: String },
}

impl ExtractionRule {
    pub fn build(&self) -> Result<Box<dyn ExtractionStrategy>, StrategyError> {
        Ok(match self {
            Self::SelectorRegex { selector, pattern } => {
                Box::new(SelectorRegexExtraction::new(selector, pattern)?)
            }
            Self::SelectorCount { selector } => Box::new(SelectorCountExtraction::new(selector)?),
        })
    }
}

/// How to find the next page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PaginationRule {
    /// Follow the `href` of the first element matching `selector`
    NextLink { selector: String },
}

impl PaginationRule {
    pub fn build(&self) -> Result<Box<dyn PaginationStrategy>, StrategyError> {
        Ok(match self {
            Self::NextLink { selector } => Box::new(NextLinkPagination::new(selector)?),
        })
    }
}
