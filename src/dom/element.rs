use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Snapshot of one element located in a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// HTML tag name (e.g., "div", "button", "input")
    pub tag_name: String,

    /// Element attributes (e.g., id, class, aria-label)
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Rendered text of the element and its descendants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    /// Selector that matched this element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Position among all matches of `selector`, in document order
    #[serde(default)]
    pub match_index: usize,

    /// Whether the element is attached and not hidden by styling
    #[serde(default)]
    pub is_visible: bool,

    /// Rendered bounding box, when the backend has layout information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

/// Bounding box coordinates for an element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementNode {
    /// Create a new ElementNode
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: HashMap::new(),
            text_content: None,
            selector: None,
            match_index: 0,
            is_visible: false,
            bounding_box: None,
        }
    }

    /// Builder method: set attributes
    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Builder method: set text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    /// Builder method: record which selector match this snapshot came from
    pub fn with_match(mut self, selector: impl Into<String>, match_index: usize) -> Self {
        self.selector = Some(selector.into());
        self.match_index = match_index;
        self
    }

    /// Builder method: set visibility
    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.is_visible = visible;
        self
    }

    /// Builder method: set bounding box
    pub fn with_bounding_box(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounding_box = Some(BoundingBox { x, y, width, height });
        self
    }

    /// Add a single attribute
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Check if element has a specific class
    pub fn has_class(&self, class_name: &str) -> bool {
        if let Some(classes) = self.attributes.get("class") {
            classes.split_whitespace().any(|c| c == class_name)
        } else {
            false
        }
    }

    /// Get element ID
    pub fn id(&self) -> Option<&String> {
        self.attributes.get("id")
    }

    /// Check if element is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// Whether the element is actually rendered: attached, not hidden, and
    /// with a non-empty box when layout is known.
    pub fn is_rendered(&self) -> bool {
        self.is_visible && self.bounding_box.as_ref().is_none_or(BoundingBox::is_visible)
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        let mut out = format!("<{}", self.tag_name);
        if let Some(id) = self.id() {
            out.push_str(&format!(" id=\"{}\"", id));
        }
        if let Some(class) = self.attributes.get("class") {
            out.push_str(&format!(" class=\"{}\"", class));
        }
        out.push('>');
        if let Some(selector) = &self.selector {
            out.push_str(&format!(" via '{}'[{}]", selector, self.match_index));
        }
        out
    }
}

impl BoundingBox {
    /// Create a new BoundingBox
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Check if the bounding box is visible (has non-zero dimensions)
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}
