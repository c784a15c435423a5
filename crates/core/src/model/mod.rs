mod ids;
mod options;
mod question;
mod score;

pub use ids::{ParseIdError, QuestionUid};
pub use options::{FALLBACK_OPTION_COUNT, ResolvedOption, option_label, resolve_options};
pub use question::{NestedOption, OptionSource, Question, QuestionContent};
pub use score::{Score, is_correct, normalize_answer};
