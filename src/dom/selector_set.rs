use crate::error::{BrowserError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Priority-ordered selector candidates; the first candidate that matches wins
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SelectorSet(Vec<String>);

impl SelectorSet {
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(selectors.into_iter().map(Into::into).collect())
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Candidates in priority order
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SelectorSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// A named semantic field bound to the selectors that locate it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub selectors: SelectorSet,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, selectors: SelectorSet) -> Self {
        Self { name: name.into(), selectors }
    }
}

/// Ordered set of FieldSpecs with unique names
/// Uses IndexMap to preserve declaration order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "IndexMap<String, SelectorSet>", into = "IndexMap<String, SelectorSet>")]
pub struct FieldSchema {
    fields: IndexMap<String, SelectorSet>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema, rejecting duplicate field names
    pub fn from_specs(specs: impl IntoIterator<Item = FieldSpec>) -> Result<Self> {
        let mut schema = Self::new();
        for spec in specs {
            schema.insert(spec)?;
        }
        Ok(schema)
    }

    /// Add a field; names must be unique
    pub fn insert(&mut self, spec: FieldSpec) -> Result<()> {
        if spec.name.trim().is_empty() {
            return Err(BrowserError::Config("field name must not be empty".to_string()));
        }
        if self.fields.contains_key(&spec.name) {
            return Err(BrowserError::Config(format!("duplicate field '{}'", spec.name)));
        }
        self.fields.insert(spec.name, spec.selectors);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SelectorSet> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over (name, selectors) pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SelectorSet)> {
        self.fields.iter().map(|(name, set)| (name.as_str(), set))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl TryFrom<IndexMap<String, SelectorSet>> for FieldSchema {
    type Error = BrowserError;

    fn try_from(map: IndexMap<String, SelectorSet>) -> Result<Self> {
        Self::from_specs(map.into_iter().map(|(name, selectors)| FieldSpec::new(name, selectors)))
    }
}

impl From<FieldSchema> for IndexMap<String, SelectorSet> {
    fn from(schema: FieldSchema) -> Self {
        schema.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_set_order() {
        let set = SelectorSet::new([".primary", ".fallback", "h1"]);
        let candidates: Vec<_> = set.candidates().collect();
        assert_eq!(candidates, vec![".primary", ".fallback", "h1"]);
        assert_eq!(set.len(), 3);
        assert!(SelectorSet::empty().is_empty());
    }

    #[test]
    fn test_selector_set_serde_is_plain_array() {
        let set: SelectorSet = serde_json::from_str(r##"["#a", ".b"]"##).unwrap();
        assert_eq!(set, SelectorSet::new(["#a", ".b"]));
        assert_eq!(serde_json::to_string(&set).unwrap(), r##"["#a",".b"]"##);
    }

    #[test]
    fn test_schema_preserves_order() {
        let schema = FieldSchema::from_specs([
            FieldSpec::new("title", SelectorSet::new(["h1"])),
            FieldSpec::new("company", SelectorSet::new([".company"])),
            FieldSpec::new("location", SelectorSet::new([".location"])),
        ])
        .unwrap();

        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, vec!["title", "company", "location"]);
        assert_eq!(schema.get("company"), Some(&SelectorSet::new([".company"])));
    }

    #[test]
    fn test_schema_rejects_duplicates() {
        let err = FieldSchema::from_specs([
            FieldSpec::new("title", SelectorSet::new(["h1"])),
            FieldSpec::new("title", SelectorSet::new(["h2"])),
        ])
        .unwrap_err();
        assert!(matches!(err, BrowserError::Config(msg) if msg.contains("duplicate field 'title'")));
    }

    #[test]
    fn test_schema_rejects_blank_name() {
        let mut schema = FieldSchema::new();
        assert!(schema.insert(FieldSpec::new("  ", SelectorSet::empty())).is_err());
        assert!(schema.is_empty());
    }

    #[test]
    fn test_schema_json_roundtrip_keeps_order() {
        let json = r##"{"title": ["h1"], "company": [".co"], "description": ["#desc", "main"]}"##;
        let schema: FieldSchema = serde_json::from_str(json).unwrap();
        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, vec!["title", "company", "description"]);

        let back = serde_json::to_string(&schema).unwrap();
        assert!(back.starts_with(r#"{"title":["h1"]"#));
    }
}
