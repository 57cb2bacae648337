use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Structured extraction result for one posting.
///
/// Serialized flat: every field name becomes a top-level key next to `url`
/// and `timestamp`. Unmatched fields are present with an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    #[serde(flatten)]
    #[schemars(with = "std::collections::BTreeMap<String, String>")]
    fields: IndexMap<String, String>,

    /// Page URL without query string or fragment
    url: String,

    /// Capture time, RFC 3339 in UTC
    #[serde(with = "rfc3339")]
    #[schemars(with = "String")]
    timestamp: DateTime<Utc>,
}

mod rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

impl JobRecord {
    /// Build a record from extracted fields; `url` is canonicalized here
    pub fn new(fields: IndexMap<String, String>, url: &str, timestamp: DateTime<Utc>) -> Self {
        Self { fields, url: canonical_url(url), timestamp }
    }

    /// Extracted value, or `""` when the field is unknown or unmatched
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn title(&self) -> &str {
        self.get("title")
    }
}

/// Strip query string and fragment. Unparseable input is cut at the first `?` or `#`.
pub fn canonical_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}
