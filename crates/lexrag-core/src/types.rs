use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// A single statute provision as loaded from the source corpus.
///
/// Deserialization accepts the field names of the BNS data set
/// (`bns_section`, `extra_data`) as aliases, numeric section labels, and
/// missing fields (which become empty strings).
///
/// # Examples
///
/// ```
/// use lexrag_core::StatuteRecord;
///
/// let record: StatuteRecord = serde_json::from_str(
///     r#"{"bns_section": 69, "subject": "Sexual intercourse by deceitful means", "extra_data": "Whoever ..."}"#,
/// ).unwrap();
/// assert_eq!(record.section, "69");
/// assert_eq!(record.body, "Whoever ...");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatuteRecord {
    /// Section label, e.g. `"69"` or `"3(5)"`.
    #[serde(default, alias = "bns_section", deserialize_with = "string_or_number")]
    pub section: String,
    /// Short title of the provision.
    #[serde(default, alias = "title")]
    pub subject: String,
    /// Full text of the provision.
    #[serde(default, alias = "extra_data", alias = "content")]
    pub body: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number for section, found {other}"
        ))),
    }
}

/// Where a retrieved document came from.
///
/// # Examples
///
/// ```
/// use lexrag_core::HitSource;
///
/// assert_eq!(HitSource::Section.to_string(), "section");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    /// Nearest-neighbour hit from the embedding index.
    Vector,
    /// Exact section match promoted by the lexical fallback.
    Section,
}

impl fmt::Display for HitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitSource::Vector => write!(f, "vector"),
            HitSource::Section => write!(f, "section"),
        }
    }
}

/// A candidate document produced by retrieval, best match first.
///
/// # Examples
///
/// ```
/// use lexrag_core::{HitSource, RetrievedDocument};
///
/// let doc = RetrievedDocument {
///     id: "doc_0".into(),
///     text: "BNS Section: 1\nSubject: Short title\n\nThis Sanhita may be called ...".into(),
///     score: 0.82,
///     source: HitSource::Vector,
/// };
/// assert!(doc.text.contains("Section: 1"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedDocument {
    /// Stable document id (`doc_<n>`).
    pub id: String,
    /// Canonical rendered text of the provision.
    pub text: String,
    /// Cosine similarity to the query; `1.0` for exact section matches.
    pub score: f64,
    /// Which retrieval path produced this document.
    pub source: HitSource,
}

/// Output format for command results.
///
/// # Examples
///
/// ```
/// use lexrag_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text for humans.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
