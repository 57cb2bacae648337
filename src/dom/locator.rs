use crate::dom::{Document, ElementNode, SelectorSet};
use crate::error::{BrowserError, Result};

/// Resolve a SelectorSet against the current document.
///
/// Candidates are tried in priority order; the first candidate with any match
/// returns its first element in document order. Results are never merged
/// across candidates. Invalid candidates are skipped; backend failures are
/// returned as errors.
pub async fn locate(doc: &dyn Document, selectors: &SelectorSet) -> Result<Option<ElementNode>> {
    for candidate in selectors.candidates() {
        match doc.query_first(candidate).await {
            Ok(Some(element)) => {
                log::debug!("Located {} with '{}'", element.describe(), candidate);
                return Ok(Some(element));
            }
            Ok(None) => continue,
            Err(BrowserError::InvalidSelector { selector, reason }) => {
                log::debug!("Skipping invalid selector '{}': {}", selector, reason);
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Every element matched by the first candidate that matches anything
pub async fn locate_all(doc: &dyn Document, selectors: &SelectorSet) -> Result<Vec<ElementNode>> {
    for candidate in selectors.candidates() {
        match doc.query_all(candidate).await {
            Ok(found) if !found.is_empty() => return Ok(found),
            Ok(_) => continue,
            Err(BrowserError::InvalidSelector { selector, reason }) => {
                log::debug!("Skipping invalid selector '{}': {}", selector, reason);
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Vec::new())
}
