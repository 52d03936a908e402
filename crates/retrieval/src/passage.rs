use serde::{Deserialize, Serialize};

/// One retrieved excerpt, ready to be injected into a generation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Cosine similarity for embedding search, term-overlap score for
    /// lexical search. Only comparable within one result set.
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub heading: String,
    pub text: String,
}

/// Cut `text` to at most `max_chars` chars, appending `...` when cut.
#[must_use]
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_with_marker("hello", 10), "hello");
    }

    #[test]
    fn long_text_gets_a_marker() {
        assert_eq!(truncate_with_marker("hello world", 5), "hello...");
    }

    #[test]
    fn cut_is_char_safe_for_cjk() {
        let text = "日本語のテキスト";
        assert_eq!(truncate_with_marker(text, 3), "日本語...");
    }
}
