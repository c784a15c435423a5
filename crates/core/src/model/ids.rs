use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a Question.
///
/// Opaque to the engine; the question bank hands out UUID strings, but any
/// non-empty value is accepted.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuestionUid(String);

impl QuestionUid {
    /// Creates a new `QuestionUid`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for QuestionUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionUid({})", self.0)
    }
}

impl fmt::Display for QuestionUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QuestionUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ─── FromStr ───────────────────────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for QuestionUid {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError {
                kind: "QuestionUid".to_string(),
            });
        }
        Ok(QuestionUid::new(trimmed))
    }
}

impl TryFrom<String> for QuestionUid {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QuestionUid> for String {
    fn from(id: QuestionUid) -> Self {
        id.0
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_uid_display() {
        let id = QuestionUid::new("q-42");
        assert_eq!(id.to_string(), "q-42");
    }

    #[test]
    fn test_question_uid_from_str_trims() {
        let id: QuestionUid = "  7f3c  ".parse().unwrap();
        assert_eq!(id, QuestionUid::new("7f3c"));
    }

    #[test]
    fn test_question_uid_from_str_rejects_blank() {
        assert!("".parse::<QuestionUid>().is_err());
        assert!("   ".parse::<QuestionUid>().is_err());
    }

    #[test]
    fn test_question_uid_deserializes_from_plain_string() {
        let id: QuestionUid = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }

    #[test]
    fn test_question_uid_deserialize_rejects_blank() {
        assert!(serde_json::from_str::<QuestionUid>("\"\"").is_err());
        assert!(serde_json::from_str::<QuestionUid>("\"  \"").is_err());
    }
}
