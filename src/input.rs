//! Input collection: URL normalization and category selection.
//!
//! Everything here runs before any network traffic. A request that fails
//! validation never reaches the orchestrator.

use crate::models::{Category, Device};
use thiserror::Error;
use url::Url;

/// Validation failures for user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Invalid URL format: '{0}'. Example: https://example.com")]
    InvalidUrl(String),

    #[error("No check categories selected. Select at least one category to analyze")]
    NoCategories,
}

/// Normalize user input into a protocol-qualified URL.
///
/// Whitespace is trimmed and `https://` is prefixed when neither `http://`
/// nor `https://` is present. The result must parse and carry a host.
pub fn normalize_url(input: &str) -> Result<Url, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InputError::InvalidUrl(input.to_string()));
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|_| InputError::InvalidUrl(input.to_string()))?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(InputError::InvalidUrl(input.to_string())),
    }
}

/// Set of enabled categories, kept in selection-form order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySelection {
    categories: Vec<Category>,
}

impl CategorySelection {
    /// Resolve the selection from explicit picks and exclusions.
    ///
    /// `None` picks means "nothing chosen", which enables every category.
    /// An explicit empty pick list, or exclusions that remove everything,
    /// is an error.
    pub fn resolve(picked: Option<&[Category]>, skipped: &[Category]) -> Result<Self, InputError> {
        let base: Vec<Category> = match picked {
            None => Category::ALL.to_vec(),
            Some(list) => Category::ALL
                .into_iter()
                .filter(|c| list.contains(c))
                .collect(),
        };

        let categories: Vec<Category> = base.into_iter().filter(|c| !skipped.contains(c)).collect();

        if categories.is_empty() {
            return Err(InputError::NoCategories);
        }

        Ok(Self { categories })
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }
}

/// A validated analysis request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub url: Url,
    pub categories: CategorySelection,
    pub device: Device,
}

impl AnalysisRequest {
    /// Validate raw input into a request. URL errors take precedence over
    /// selection errors.
    pub fn build(
        raw_url: &str,
        picked: Option<&[Category]>,
        skipped: &[Category],
        device: Device,
    ) -> Result<Self, InputError> {
        let url = normalize_url(raw_url)?;
        let categories = CategorySelection::resolve(picked, skipped)?;
        Ok(Self {
            url,
            categories,
            device,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefixes_https() {
        let url = normalize_url("example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");

        let url = normalize_url("  www.example.com/blog  ").unwrap();
        assert_eq!(url.as_str(), "https://www.example.com/blog");
    }

    #[test]
    fn test_normalize_keeps_existing_scheme() {
        let url = normalize_url("http://example.com/a?b=1").unwrap();
        assert_eq!(url.as_str(), "http://example.com/a?b=1");

        let url = normalize_url(" https://example.com/ ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_normalize_rejects_malformed() {
        for input in ["", "   ", "not a url", "http://", "https://"] {
            assert!(
                matches!(normalize_url(input), Err(InputError::InvalidUrl(_))),
                "expected rejection for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_selection_defaults_to_all() {
        let selection = CategorySelection::resolve(None, &[]).unwrap();
        let order: Vec<_> = selection.iter().collect();
        assert_eq!(order, Category::ALL.to_vec());
        assert_eq!(selection.len(), 6);
    }

    #[test]
    fn test_selection_keeps_form_order() {
        let picked = [Category::Mobile, Category::Performance];
        let selection = CategorySelection::resolve(Some(&picked), &[]).unwrap();
        let order: Vec<_> = selection.iter().collect();
        assert_eq!(order, vec![Category::Performance, Category::Mobile]);
    }

    #[test]
    fn test_selection_empty_is_rejected() {
        assert_eq!(
            CategorySelection::resolve(Some(&[]), &[]),
            Err(InputError::NoCategories)
        );
        assert_eq!(
            CategorySelection::resolve(None, &Category::ALL),
            Err(InputError::NoCategories)
        );
    }

    #[test]
    fn test_skip_removes_category() {
        let selection = CategorySelection::resolve(None, &[Category::Seo]).unwrap();
        assert!(selection.iter().all(|c| c != Category::Seo));
        assert_eq!(selection.len(), 5);
    }

    #[test]
    fn test_build_request_validates_url_first() {
        let err = AnalysisRequest::build("", Some(&[]), &[], Device::Desktop).unwrap_err();
        assert!(matches!(err, InputError::InvalidUrl(_)));

        let req = AnalysisRequest::build("example.com", None, &[], Device::Mobile).unwrap();
        assert_eq!(req.url.as_str(), "https://example.com/");
        assert_eq!(req.device, Device::Mobile);
    }
}
