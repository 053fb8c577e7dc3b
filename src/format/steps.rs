use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Text transformations a format task can chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Lowercase,
    TrimTrailingWhitespace,
    EndWithNewline,
}

impl Step {
    pub fn apply(&self, content: &str) -> String {
        match self {
            Step::Lowercase => content.to_lowercase(),
            Step::TrimTrailingWhitespace => {
                let mut result = content
                    .lines()
                    .map(str::trim_end)
                    .collect::<Vec<_>>()
                    .join("\n");
                if content.ends_with('\n') {
                    result.push('\n');
                }
                result
            }
            Step::EndWithNewline => {
                if content.is_empty() {
                    return String::new();
                }
                format!("{}\n", content.trim_end_matches(['\n', '\r']))
            }
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Lowercase => f.write_str("lowercase"),
            Step::TrimTrailingWhitespace => f.write_str("trim_trailing_whitespace"),
            Step::EndWithNewline => f.write_str("end_with_newline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn lowercase() {
        assert_eq!(Step::Lowercase.apply("HELLO WORLD"), "hello world");
    }

    #[test]
    fn trim_trailing_whitespace_keeps_final_newline() {
        assert_eq!(
            Step::TrimTrailingWhitespace.apply("a  \nb\t\n"),
            "a\nb\n"
        );
        assert_eq!(Step::TrimTrailingWhitespace.apply("a  "), "a");
    }

    #[test]
    fn end_with_newline_collapses_trailing_newlines() {
        assert_eq!(Step::EndWithNewline.apply("a"), "a\n");
        assert_eq!(Step::EndWithNewline.apply("a\n\n\n"), "a\n");
        assert_eq!(Step::EndWithNewline.apply(""), "");
    }
}
