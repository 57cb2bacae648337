use crate::dom::element::ElementNode;

/// Rendered text of an optional element, whitespace-collapsed and trimmed.
///
/// Absence is a normal case and yields an empty string.
pub fn normalize_text(element: Option<&ElementNode>) -> String {
    element
        .and_then(|el| el.text_content.as_deref())
        .map(normalize_whitespace)
        .unwrap_or_default()
}

/// Collapse every whitespace run to a single space and trim both ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_element_is_empty() {
        assert_eq!(normalize_text(None), "");
        assert_eq!(normalize_text(Some(&ElementNode::new("div"))), "");
    }

    #[test]
    fn test_collapses_runs() {
        let el = ElementNode::new("div").with_text("  Staff\n\n   Engineer\t(Remote)  ");
        assert_eq!(normalize_text(Some(&el)), "Staff Engineer (Remote)");
    }

    #[test]
    fn test_whitespace_only() {
        assert_eq!(normalize_whitespace(" \n\t \u{a0} "), "");
    }

    #[test]
    fn test_no_adjacent_whitespace_or_padding() {
        let samples = [
            "a  b",
            "\n\nleading",
            "trailing\r\n",
            "mixed \t\u{2003} unicode\u{a0}\u{a0}spaces",
            "single",
            "",
        ];
        for sample in samples {
            let out = normalize_whitespace(sample);
            assert_eq!(out, out.trim(), "padding left in {:?}", out);
            let chars: Vec<char> = out.chars().collect();
            assert!(
                chars.windows(2).all(|w| !(w[0].is_whitespace() && w[1].is_whitespace())),
                "adjacent whitespace in {:?}",
                out
            );
        }
    }
}
