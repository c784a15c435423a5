use serde::Serialize;

use crate::model::question::{OptionSource, Question};

/// Number of blank choices synthesized for a question without option data.
pub const FALLBACK_OPTION_COUNT: usize = 4;

/// A labelled choice ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedOption {
    pub label: char,
    pub content: String,
}

/// Positional label for the option at `index`: `A`, `B`, `C`, ...
#[must_use]
pub fn option_label(index: usize) -> char {
    u32::try_from(index)
        .ok()
        .and_then(|i| i.checked_add(u32::from(b'A')))
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Normalizes a question's option data into a uniform labelled list.
///
/// Labels are always positional. A question with no usable option data gets
/// exactly [`FALLBACK_OPTION_COUNT`] empty options so the choice count stays fixed.
#[must_use]
pub fn resolve_options(question: &Question) -> Vec<ResolvedOption> {
    match question.option_source() {
        OptionSource::Flat(options) => options
            .iter()
            .enumerate()
            .map(|(i, html)| ResolvedOption {
                label: option_label(i),
                content: html.clone().unwrap_or_default(),
            })
            .collect(),
        OptionSource::Nested(options) => options
            .iter()
            .enumerate()
            .map(|(i, option)| ResolvedOption {
                label: option_label(i),
                content: option.html().to_owned(),
            })
            .collect(),
        OptionSource::Missing => (0..FALLBACK_OPTION_COUNT)
            .map(|i| ResolvedOption {
                label: option_label(i),
                content: String::new(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NestedOption, QuestionUid};

    fn labels(options: &[ResolvedOption]) -> String {
        options.iter().map(|o| o.label).collect()
    }

    #[test]
    fn flat_options_are_labelled_in_order() {
        let q = Question::new(QuestionUid::new("q"), "")
            .with_flat_options(["one", "two", "three", "four", "five"]);
        let resolved = resolve_options(&q);

        assert_eq!(labels(&resolved), "ABCDE");
        assert_eq!(resolved[4].content, "five");
    }

    #[test]
    fn nested_options_take_content_field_or_bare_string() {
        let q = Question::new(QuestionUid::new("q"), "").with_nested_options(vec![
            NestedOption::Entry {
                content: Some("<b>x</b>".into()),
            },
            NestedOption::Text("y".into()),
            NestedOption::Entry { content: None },
        ]);
        let resolved = resolve_options(&q);

        assert_eq!(labels(&resolved), "ABC");
        let bodies: Vec<_> = resolved.iter().map(|o| o.content.as_str()).collect();
        assert_eq!(bodies, vec!["<b>x</b>", "y", ""]);
    }

    #[test]
    fn flat_wins_over_nested() {
        let q = Question::new(QuestionUid::new("q"), "")
            .with_nested_options(vec![NestedOption::Text("nested".into())])
            .with_flat_options(["flat-a", "flat-b"]);
        let resolved = resolve_options(&q);

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].content, "flat-a");
    }

    #[test]
    fn missing_options_synthesize_four_blanks() {
        let q = Question::new(QuestionUid::new("q"), "").with_nested_options(Vec::new());
        let resolved = resolve_options(&q);

        assert_eq!(labels(&resolved), "ABCD");
        assert!(resolved.iter().all(|o| o.content.is_empty()));
    }

    #[test]
    fn single_option_is_not_padded() {
        let q = Question::new(QuestionUid::new("q"), "").with_flat_options(["only"]);
        assert_eq!(labels(&resolve_options(&q)), "A");
    }
}
