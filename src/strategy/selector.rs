//! CSS-selector based strategies
//!
//! These cover the common cases:
//! - a page states the count somewhere in its text (`SelectorRegexExtraction`)
//! - a page lists one element per counted item (`SelectorCountExtraction`)
//! - a page links to its successor (`NextLinkPagination`)

use crate::fetch::Page;
use crate::strategy::{ExtractionStrategy, PaginationStrategy, StrategyError};
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// Default pattern: the first run of digits
pub const DEFAULT_COUNT_PATTERN: &str = r"(\d+)";

fn parse_selector(selector: &str) -> Result<Selector, StrategyError> {
    Selector::parse(selector).map_err(|e| StrategyError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Takes the text of the first element matching a selector and reads the
/// count from the first capture group of a pattern
#[derive(Debug, Clone)]
pub struct SelectorRegexExtraction {
    selector_src: String,
    selector: Selector,
    pattern: Regex,
}

impl SelectorRegexExtraction {
    pub fn new(selector: &str, pattern: &str) -> Result<Self, StrategyError> {
        let compiled = Regex::new(pattern).map_err(|e| StrategyError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        if compiled.captures_len() < 2 {
            return Err(StrategyError::InvalidPattern {
                pattern: pattern.to_string(),
                message: "pattern needs a capture group".to_string(),
            });
        }

        Ok(Self {
            selector_src: selector.to_string(),
            selector: parse_selector(selector)?,
            pattern: compiled,
        })
    }
}

impl ExtractionStrategy for SelectorRegexExtraction {
    fn extract(&mut self, page: &Page) -> Result<i64, StrategyError> {
        let document = Html::parse_document(&page.body);

        let text = document
            .select(&self.selector)
            .next()
            .map(|element| element.text().collect::<String>())
            .ok_or_else(|| StrategyError::MissingElement(self.selector_src.clone()))?;

        let captured = self
            .pattern
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| StrategyError::NoMatch {
                pattern: self.pattern.as_str().to_string(),
                text: text.trim().to_string(),
            })?;

        captured
            .as_str()
            .trim()
            .parse::<i64>()
            .map_err(|_| StrategyError::NotAnInteger(captured.as_str().to_string()))
    }
}

/// Counts the elements matching a selector
#[derive(Debug, Clone)]
pub struct SelectorCountExtraction {
    selector: Selector,
}

impl SelectorCountExtraction {
    pub fn new(selector: &str) -> Result<Self, StrategyError> {
        Ok(Self {
            selector: parse_selector(selector)?,
        })
    }
}

impl ExtractionStrategy for SelectorCountExtraction {
    fn extract(&mut self, page: &Page) -> Result<i64, StrategyError> {
        let document = Html::parse_document(&page.body);
        let count = document.select(&self.selector).count();
        i64::try_from(count).map_err(|_| StrategyError::NotAnInteger(count.to_string()))
    }
}

/// Follows the `href` of the first element matching a selector
///
/// A missing element or a missing `href` ends the walk. Relative links are
/// resolved against the fetched page's URL.
#[derive(Debug, Clone)]
pub struct NextLinkPagination {
    selector: Selector,
}

impl NextLinkPagination {
    pub fn new(selector: &str) -> Result<Self, StrategyError> {
        Ok(Self {
            selector: parse_selector(selector)?,
        })
    }
}

impl PaginationStrategy for NextLinkPagination {
    fn get_next_url(&mut self, page: &Page, _count: u64) -> Result<Option<String>, StrategyError> {
        let document = Html::parse_document(&page.body);

        let href = match document
            .select(&self.selector)
            .next()
            .and_then(|element| element.value().attr("href"))
        {
            Some(href) => href.trim().to_string(),
            None => return Ok(None),
        };

        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return Ok(None);
        }

        let base = Url::parse(&page.url).map_err(|e| StrategyError::InvalidUrl {
            url: page.url.clone(),
            message: e.to_string(),
        })?;

        let next = base.join(&href).map_err(|e| StrategyError::InvalidUrl {
            url: href.clone(),
            message: e.to_string(),
        })?;

        Ok(Some(next.to_string()))
    }
}
