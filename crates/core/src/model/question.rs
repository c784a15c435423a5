use serde::{Deserialize, Deserializer, Serialize};

use crate::model::ids::QuestionUid;

//
// ─── OPTION DATA ──────────────────────────────────────────────────────────────
//

/// A single entry of the nested `content.answerOptions` list.
///
/// The question bank is inconsistent here: entries are usually objects with a
/// `content` field, sometimes bare strings, occasionally something else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NestedOption {
    Text(String),
    Entry {
        #[serde(default)]
        content: Option<String>,
    },
    Other(serde_json::Value),
}

impl NestedOption {
    /// HTML body of this option, empty when the entry carries none.
    #[must_use]
    pub fn html(&self) -> &str {
        match self {
            NestedOption::Text(html) => html,
            NestedOption::Entry { content } => content.as_deref().unwrap_or_default(),
            NestedOption::Other(_) => "",
        }
    }
}

/// Structured question body as delivered under the `content` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionContent {
    #[serde(rename = "answerOptions", default, skip_serializing_if = "Option::is_none")]
    pub answer_options: Option<Vec<NestedOption>>,
}

/// Where a question's choices come from, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionSource<'a> {
    /// Flat list of option HTML strings (`answer_options`).
    Flat(&'a [Option<String>]),
    /// Nested option objects (`content.answerOptions`).
    Nested(&'a [NestedOption]),
    /// Neither shape is present or both are empty.
    Missing,
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// A single assessable item as served by the question bank.
///
/// `stem`, `rationale` and option bodies are HTML and are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub uid: QuestionUid,
    #[serde(default, deserialize_with = "nullable_string")]
    pub stem: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub rationale: String,
    #[serde(default, deserialize_with = "answer_keys")]
    pub correct_answers: Vec<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub question_id: Option<String>,
    #[serde(default)]
    pub primary_class_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_options: Option<Vec<Option<String>>>,
    #[serde(
        default,
        deserialize_with = "lenient_content",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<QuestionContent>,
}

impl Question {
    #[must_use]
    pub fn new(uid: QuestionUid, stem: impl Into<String>) -> Self {
        Self {
            uid,
            stem: stem.into(),
            rationale: String::new(),
            correct_answers: Vec::new(),
            program: None,
            module: None,
            difficulty: None,
            question_id: None,
            primary_class_desc: None,
            answer_options: None,
            content: None,
        }
    }

    #[must_use]
    pub fn with_correct_answers<I, S>(mut self, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.correct_answers = answers.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_flat_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.answer_options = Some(options.into_iter().map(|o| Some(o.into())).collect());
        self
    }

    #[must_use]
    pub fn with_nested_options(mut self, options: Vec<NestedOption>) -> Self {
        self.content = Some(QuestionContent {
            answer_options: Some(options),
        });
        self
    }

    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }

    /// Picks the first non-empty option source: flat, then nested.
    #[must_use]
    pub fn option_source(&self) -> OptionSource<'_> {
        if let Some(flat) = self.answer_options.as_deref().filter(|o| !o.is_empty()) {
            return OptionSource::Flat(flat);
        }
        let nested = self
            .content
            .as_ref()
            .and_then(|c| c.answer_options.as_deref())
            .filter(|o| !o.is_empty());
        match nested {
            Some(nested) => OptionSource::Nested(nested),
            None => OptionSource::Missing,
        }
    }

    /// `MATH • HARD` style heading; empty parts are skipped.
    #[must_use]
    pub fn header_line(&self) -> String {
        join_parts([
            self.module.as_deref().map(str::to_uppercase),
            self.difficulty.as_deref().map(str::to_uppercase),
        ])
    }

    /// `QID 1a2b • Algebra` style reference line; empty parts are skipped.
    #[must_use]
    pub fn reference_line(&self) -> String {
        join_parts([
            self.question_id.as_deref().map(|qid| format!("QID {qid}")),
            self.primary_class_desc.clone(),
        ])
    }
}

fn join_parts<const N: usize>(parts: [Option<String>; N]) -> String {
    parts
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" • ")
}

//
// ─── LENIENT DESERIALIZERS ────────────────────────────────────────────────────
//

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// Answer keys are usually letters but some imports store them as numbers.
fn answer_keys<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
        .collect())
}

fn lenient_content<'de, D>(deserializer: D) -> Result<Option<QuestionContent>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_bank_item_with_nulls() {
        let json = r#"{
            "uid": "5d1e",
            "program": "SAT",
            "module": "math",
            "difficulty": null,
            "stem": "<p>2 + 2?</p>",
            "rationale": null,
            "correct_answers": ["b", 3, null],
            "answer_options": ["<p>3</p>", null, "<p>5</p>"],
            "external_id": "ignored"
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();

        assert_eq!(q.uid, QuestionUid::new("5d1e"));
        assert_eq!(q.rationale, "");
        assert_eq!(q.correct_answers, vec!["b".to_string(), "3".to_string()]);
        assert!(matches!(q.option_source(), OptionSource::Flat(opts) if opts.len() == 3));
    }

    #[test]
    fn nested_options_used_when_flat_is_empty() {
        let json = r#"{
            "uid": "n1",
            "stem": "",
            "answer_options": [],
            "content": { "answerOptions": [{"id": "x", "content": "<p>a</p>"}, "<p>b</p>", 7] }
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();

        let OptionSource::Nested(nested) = q.option_source() else {
            panic!("expected nested source");
        };
        let bodies: Vec<_> = nested.iter().map(NestedOption::html).collect();
        assert_eq!(bodies, vec!["<p>a</p>", "<p>b</p>", ""]);
    }

    #[test]
    fn unexpected_content_shape_is_missing() {
        let json = r#"{ "uid": "m1", "stem": "s", "content": "plain text" }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.option_source(), OptionSource::Missing);
    }

    #[test]
    fn blank_uid_fails_to_decode() {
        let json = r#"{ "uid": "  ", "stem": "s" }"#;
        assert!(serde_json::from_str::<Question>(json).is_err());
    }

    #[test]
    fn header_and_reference_lines_skip_missing_parts() {
        let mut q = Question::new(QuestionUid::new("h1"), "")
            .with_module("math")
            .with_difficulty("hard");
        assert_eq!(q.header_line(), "MATH • HARD");
        assert_eq!(q.reference_line(), "");

        q.difficulty = None;
        q.question_id = Some("ab12".into());
        q.primary_class_desc = Some("Algebra".into());
        assert_eq!(q.header_line(), "MATH");
        assert_eq!(q.reference_line(), "QID ab12 • Algebra");
    }
}
