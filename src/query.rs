//! Search query extraction from model output.
//!
//! [`BulletLineExtractor`] is a best-effort heuristic, not a parser: it
//! relies on the vision model listing garments as `*`-prefixed bullets and
//! makes no claim about the semantic relevance of the line it picks.

use anyhow::{anyhow, Result};

use crate::models::SearchQuery;
use crate::traits::QueryExtractor;

/// Picks the first non-empty `*` bullet line, else a fixed default phrase.
#[derive(Debug, Clone)]
pub struct BulletLineExtractor {
    default_query: SearchQuery,
}

impl BulletLineExtractor {
    /// Fails if `default_query` is blank, since the extractor must never
    /// produce an empty query.
    pub fn new(default_query: &str) -> Result<Self> {
        let default_query = SearchQuery::new(default_query)
            .ok_or_else(|| anyhow!("default search query must not be empty"))?;
        Ok(Self { default_query })
    }
}

impl QueryExtractor for BulletLineExtractor {
    fn extract(&self, description: &str) -> Result<SearchQuery> {
        Ok(first_bullet(description).unwrap_or_else(|| self.default_query.clone()))
    }
}

fn first_bullet(description: &str) -> Option<SearchQuery> {
    description
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('*'))
        .find_map(|line| SearchQuery::new(line.trim_matches(|c: char| c == '*' || c == ' ')))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> String {
        BulletLineExtractor::new("white t-shirt")
            .unwrap()
            .extract(text)
            .unwrap()
            .as_str()
            .to_string()
    }

    #[test]
    fn test_first_bullet_wins() {
        assert_eq!(extract("* red wool sweater\n* blue jeans"), "red wool sweater");
    }

    #[test]
    fn test_bullet_after_prose() {
        let text = "The person is wearing:\n\n  *   grey hoodie  \n* black sneakers";
        assert_eq!(extract(text), "grey hoodie");
    }

    #[test]
    fn test_markdown_bold_asterisks_stripped() {
        assert_eq!(extract("** Denim jacket **"), "Denim jacket");
    }

    #[test]
    fn test_empty_bullets_skipped() {
        assert_eq!(extract("*\n* *\n* linen shirt"), "linen shirt");
    }

    #[test]
    fn test_no_bullets_uses_default() {
        assert_eq!(extract("A casual summer look."), "white t-shirt");
        assert_eq!(extract(""), "white t-shirt");
    }

    #[test]
    fn test_asterisk_mid_line_is_not_a_bullet() {
        assert_eq!(extract("rated 5* by critics"), "white t-shirt");
    }

    #[test]
    fn test_dash_bullets_are_not_recognised() {
        assert_eq!(extract("- green parka"), "white t-shirt");
    }

    #[test]
    fn test_custom_default() {
        let extractor = BulletLineExtractor::new("black jeans").unwrap();
        assert_eq!(extractor.extract("nothing").unwrap().as_str(), "black jeans");
    }

    #[test]
    fn test_blank_default_rejected() {
        assert!(BulletLineExtractor::new("  ").is_err());
    }
}
