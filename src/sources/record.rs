use std::fmt;

/// How a record is aligned with a survey node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordKey {
    Identifier(String),
    /// Source schema had no identifier column; only text matching can align it.
    Row(usize),
}

impl RecordKey {
    pub fn identifier(&self) -> Option<&str> {
        match self {
            RecordKey::Identifier(id) => Some(id.as_str()),
            RecordKey::Row(_) => None,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Identifier(id) => f.write_str(id),
            RecordKey::Row(idx) => write!(f, "row #{idx}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationRecord {
    pub key: RecordKey,
    /// Normalized destination language.
    pub language: String,
    /// English text the translation was made from, when the source carries it.
    pub source: Option<String>,
    pub target: String,
}
